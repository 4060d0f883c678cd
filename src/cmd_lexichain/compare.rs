use clap::*;
use lexichain::libs::chaining::{BandedOptions, ExtendOptions, Extender};
use lexichain::libs::compare::*;
use lexichain::libs::genome::{Genomes, SeqFetch};
use lexichain::libs::pool::Pool;
use rayon::prelude::*;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("compare")
        .about("Estimates similarity between sequences from chained k-mer anchors")
        .after_help(
            r###"
Indexes each query sequence and compares it against every target sequence.
Anchors are prefix matches of target k-mers against the query k-mers on both
strands; they are cleaned and chained per strand, and the strand with more
aligned bases is reported.

Output is tab-separated, one line per query/target pair with a result:

    query  q_len  target  t_len  strand  chains  matched  aligned
    afrac  pident  q_begin  q_end  t_begin  t_end

* afrac  - percent of the query covered by chains
* pident - matched bases over the longer aligned span, percent
* Query ranges are forward-strand, 0-based, end exclusive

Notes:
* Supports both plain text and gzipped (.gz) files
* The minimum shared prefix is raised for targets of 1 kbp, 10 kbp and 100 kbp or longer
* --extend N grows each envelope into up to N flanking bases with 2-mer seeds
* Queries are processed in parallel with --parallel

Examples:
1. Compare queries against targets:
   lexichain compare tests/compare/query.fa tests/compare/target.fa

2. Report only pairs covering at least half of the query:
   lexichain compare query.fa target.fa --min-aligned-fraction 50

3. Extend the envelopes by up to 200 bases:
   lexichain compare query.fa target.fa --extend 200

"###,
        )
        .arg(
            Arg::new("query")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Query FASTA file"),
        )
        .arg(
            Arg::new("target")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Target FASTA file"),
        )
        .arg(
            Arg::new("kmer")
                .long("kmer")
                .short('k')
                .value_parser(value_parser!(u8).range(1..=32))
                .num_args(1)
                .default_value("32")
                .help("K-mer size of the query index"),
        )
        .arg(
            Arg::new("min_prefix")
                .long("min-prefix")
                .short('m')
                .value_parser(value_parser!(u8).range(1..=32))
                .num_args(1)
                .default_value("15")
                .help("Minimum shared prefix of a k-mer hit"),
        )
        .arg(
            Arg::new("trim_distance")
                .long("trim-distance")
                .value_parser(value_parser!(f64))
                .num_args(1)
                .default_value("100")
                .help("Neighbours closer than this may form a repeat run"),
        )
        .arg(
            Arg::new("min_aligned_fraction")
                .long("min-aligned-fraction")
                .short('f')
                .value_parser(value_parser!(f64))
                .num_args(1)
                .default_value("0")
                .help("Minimum percent of the query covered by chains"),
        )
        .arg(
            Arg::new("min_identity")
                .long("min-identity")
                .short('i')
                .value_parser(value_parser!(f64))
                .num_args(1)
                .default_value("0")
                .help("Minimum percent identity of a reported pair"),
        )
        .arg(
            Arg::new("max_gap")
                .long("max-gap")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .default_value("50")
                .help("Maximum off-diagonal drift between chained anchors"),
        )
        .arg(
            Arg::new("min_score")
                .long("min-score")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .default_value("50")
                .help("Minimum chain score"),
        )
        .arg(
            Arg::new("min_align_len")
                .long("min-align-len")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .default_value("50")
                .help("Minimum query span of a chain"),
        )
        .arg(
            Arg::new("min_chain_identity")
                .long("min-chain-identity")
                .value_parser(value_parser!(f64))
                .num_args(1)
                .default_value("15")
                .help("Minimum identity of a single chain"),
        )
        .arg(
            Arg::new("max_distance")
                .long("max-distance")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .default_value("1000")
                .help("Maximum distance between chained anchors"),
        )
        .arg(
            Arg::new("band_count")
                .long("band-count")
                .value_parser(value_parser!(usize))
                .num_args(1)
                .default_value("100")
                .help("Predecessors inspected per anchor"),
        )
        .arg(
            Arg::new("band_base")
                .long("band-base")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .default_value("200")
                .help("Maximum query distance to a predecessor"),
        )
        .arg(
            Arg::new("extend")
                .long("extend")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .default_value("0")
                .help("Extend envelopes into up to N flanking bases"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .value_parser(value_parser!(usize))
                .num_args(1)
                .default_value("1")
                .help("Number of threads for parallel processing"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let mut writer = lexichain::writer(args.get_one::<String>("outfile").unwrap())?;
    let opt_extend = *args.get_one::<u32>("extend").unwrap();
    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();

    let opt = CompareOptions {
        k: *args.get_one::<u8>("kmer").unwrap(),
        min_prefix: *args.get_one::<u8>("min_prefix").unwrap(),
        chaining: BandedOptions {
            max_gap: *args.get_one::<u32>("max_gap").unwrap(),
            min_score: *args.get_one::<u32>("min_score").unwrap(),
            min_align_len: *args.get_one::<u32>("min_align_len").unwrap(),
            min_identity: *args.get_one::<f64>("min_chain_identity").unwrap(),
            max_distance: *args.get_one::<u32>("max_distance").unwrap(),
            band_count: *args.get_one::<usize>("band_count").unwrap(),
            band_base: *args.get_one::<u32>("band_base").unwrap(),
        },
        trim_distance: *args.get_one::<f64>("trim_distance").unwrap(),
        min_aligned_fraction: *args.get_one::<f64>("min_aligned_fraction").unwrap(),
        min_identity: *args.get_one::<f64>("min_identity").unwrap(),
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(opt_parallel)
        .build_global()?;

    //----------------------------
    // Input
    //----------------------------
    let queries = Genomes::from_fasta(args.get_one::<String>("query").unwrap())?;
    let targets = Genomes::from_fasta(args.get_one::<String>("target").unwrap())?;
    log::info!("{} queries, {} targets", queries.len(), targets.len());

    //----------------------------
    // Ops
    //----------------------------
    let comparators = Pool::new(move || SequenceComparator::new(opt.clone()));
    let extenders = Pool::new(|| Extender::new(ExtendOptions::default()));

    let queries: Vec<(&str, &[u8])> = queries.iter().collect();
    let outputs = queries
        .par_iter()
        .map(|&(name, seq)| {
            let mut cpr = comparators.get();
            let mut extender = extenders.get();
            compare_query(&mut cpr, &mut extender, name, seq, &targets, opt_extend)
        })
        .collect::<anyhow::Result<Vec<String>>>()?;

    //----------------------------
    // Output
    //----------------------------
    for out_string in outputs {
        writer.write_all(out_string.as_ref())?;
    }

    Ok(())
}

fn compare_query(
    cpr: &mut SequenceComparator,
    extender: &mut Extender,
    name: &str,
    seq: &[u8],
    targets: &Genomes,
    flank: u32,
) -> anyhow::Result<String> {
    let mut out_string = String::new();
    let qlen = seq.len();
    if qlen == 0 {
        return Ok(out_string);
    }

    cpr.index(seq);
    for (tname, _) in targets.iter() {
        let tlen = targets.seq_len(tname).unwrap_or_default();
        let tseq = targets.fetch(tname, 0, tlen)?;

        let mut result = match cpr.compare(0, qlen as u32 - 1, tseq, qlen) {
            Some(r) => r,
            None => continue,
        };
        if flank > 0 {
            extend_result(extender, seq, tseq, &mut result, flank);
        }

        let (q_begin, q_end) = result.query_range(qlen as u32);
        log::debug!(
            "{} vs {}: {} chains, {:.2}% aligned",
            name,
            tname,
            result.chains.len(),
            result.aligned_fraction
        );
        out_string += &format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.2}\t{}\t{}\t{}\t{}\n",
            name,
            qlen,
            tname,
            tlen,
            if result.rc { "-" } else { "+" },
            result.chains.len(),
            result.matched_bases,
            result.aligned_bases,
            result.aligned_fraction,
            result.pident,
            q_begin,
            q_end,
            result.t_begin,
            result.t_end,
        );
    }

    Ok(out_string)
}
