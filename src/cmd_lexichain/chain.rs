use anyhow::Context;
use clap::*;
use indexmap::IndexMap;
use itertools::Itertools;
use lexichain::libs::anchor::{clear_substr_pairs, trim_substr_pairs, Anchor};
use lexichain::libs::chaining::*;
use lexichain::libs::pool::Pool;
use rayon::prelude::*;
use std::io::{BufRead, Write};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("chain")
        .about("Chains anchors into collinear, scored alignments")
        .after_help(
            r###"
Reads anchors (shared substrings between a query and a target) and chains them
per query/target pair.

Input is tab-separated, one anchor per line:

    query  target  q_begin  t_begin  len  [mismatch  [q_strand  t_strand]]

Coordinates are 0-based, strands are `+` or `-`. Empty lines and lines starting
with `#` are skipped.

When the strands of an anchor differ, q_begin is taken on the reverse-complemented
query, so target positions increase along a chain on either strand. The banded
mode never links anchors whose target positions run backwards.

Output is tab-separated, one chain per line:

    query  target  chain  score  q_begin  q_end  t_begin  t_end
    anchors  matched  aligned_q  aligned_t  pident

Ends are exclusive. Chains of a pair are numbered from 1.

Modes:
* global - all anchors between a query and a genome; chains by decreasing score
    * defaults: --max-gap 5000, --min-score 20, --max-distance 10000
* banded - anchors already localized to one region; chains by query position
    * defaults: --max-gap 50, --min-score 50, --max-distance 1000

Notes:
* Supports both plain text and gzipped (.gz) files
* Reads from stdin if input file is 'stdin'
* Nested anchors are always removed; --trim also drops repeat runs at both ends

Examples:
1. Chain anchors with the global chainer:
   lexichain chain tests/chain/anchors.tsv

2. Keep only the best chain of each pair:
   lexichain chain tests/chain/anchors.tsv --top-chains 1

3. Banded chaining with 4 threads:
   lexichain chain anchors.tsv --mode banded --parallel 4 -o chains.tsv

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Input anchor file to process"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_parser(["global", "banded"])
                .default_value("global")
                .help("Chaining algorithm"),
        )
        .arg(
            Arg::new("kmer")
                .long("kmer")
                .short('k')
                .value_parser(value_parser!(usize))
                .num_args(1)
                .default_value("32")
                .help("Seed length; the nesting sweep widens to longer anchors"),
        )
        .arg(
            Arg::new("trim")
                .long("trim")
                .action(ArgAction::SetTrue)
                .help("Trim repeat runs at both ends of each anchor list"),
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
            Arg::new("max_gap")
                .long("max-gap")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .help("Maximum off-diagonal drift between chained anchors"),
        )
        .arg(
            Arg::new("min_score")
                .long("min-score")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .help("Minimum chain score"),
        )
        .arg(
            Arg::new("max_distance")
                .long("max-distance")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .help("Maximum distance between chained anchors"),
        )
        .arg(
            Arg::new("top_chains")
                .long("top-chains")
                .value_parser(value_parser!(usize))
                .num_args(1)
                .default_value("0")
                .help("Chains reported per pair in global mode, 0 for all"),
        )
        .arg(
            Arg::new("min_align_len")
                .long("min-align-len")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .default_value("50")
                .help("Minimum query span of a chain in banded mode"),
        )
        .arg(
            Arg::new("min_identity")
                .long("min-identity")
                .value_parser(value_parser!(f64))
                .num_args(1)
                .default_value("15")
                .help("Minimum chain identity in banded mode"),
        )
        .arg(
            Arg::new("band_count")
                .long("band-count")
                .value_parser(value_parser!(usize))
                .num_args(1)
                .default_value("100")
                .help("Predecessors inspected per anchor in banded mode"),
        )
        .arg(
            Arg::new("band_base")
                .long("band-base")
                .value_parser(value_parser!(u32))
                .num_args(1)
                .default_value("200")
                .help("Maximum query distance to a predecessor in banded mode"),
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

enum Mode {
    Global(GlobalOptions),
    Banded(BandedOptions),
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let mut writer = lexichain::writer(args.get_one::<String>("outfile").unwrap())?;

    let opt_k = *args.get_one::<usize>("kmer").unwrap();
    let opt_trim = args.get_flag("trim");
    let opt_trim_distance = *args.get_one::<f64>("trim_distance").unwrap();
    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();

    let mode = match args.get_one::<String>("mode").unwrap().as_str() {
        "banded" => {
            let mut opt = BandedOptions {
                min_align_len: *args.get_one::<u32>("min_align_len").unwrap(),
                min_identity: *args.get_one::<f64>("min_identity").unwrap(),
                band_count: *args.get_one::<usize>("band_count").unwrap(),
                band_base: *args.get_one::<u32>("band_base").unwrap(),
                ..Default::default()
            };
            if let Some(&v) = args.get_one::<u32>("max_gap") {
                opt.max_gap = v;
            }
            if let Some(&v) = args.get_one::<u32>("min_score") {
                opt.min_score = v;
            }
            if let Some(&v) = args.get_one::<u32>("max_distance") {
                opt.max_distance = v;
            }
            Mode::Banded(opt)
        }
        _ => {
            let mut opt = GlobalOptions {
                top_chains: *args.get_one::<usize>("top_chains").unwrap(),
                ..Default::default()
            };
            if let Some(&v) = args.get_one::<u32>("max_gap") {
                opt.max_gap = v;
            }
            if let Some(&v) = args.get_one::<u32>("min_score") {
                opt.min_score = v as f64;
            }
            if let Some(&v) = args.get_one::<u32>("max_distance") {
                opt.max_distance = v;
            }
            Mode::Global(opt)
        }
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(opt_parallel)
        .build_global()?;

    //----------------------------
    // Input
    //----------------------------
    let groups = read_anchors(infile)?;
    let total: usize = groups.values().map(|v| v.len()).sum();
    log::info!("{} anchors in {} query/target pairs", total, groups.len());

    //----------------------------
    // Ops
    //----------------------------
    let groups: Vec<_> = groups.into_iter().collect();
    let outputs: Vec<String> = match &mode {
        Mode::Global(opt) => {
            let opt = opt.clone();
            let pool = Pool::new(move || GlobalChainer::new(opt.clone()));
            groups
                .into_par_iter()
                .map(|((query, target), mut anchors)| {
                    clean(&mut anchors, opt_k, opt_trim, opt_trim_distance);
                    let mut chainer = pool.get();
                    let (chains, _) = chainer.chain(&anchors);
                    format_chains(&query, &target, &chains)
                })
                .collect()
        }
        Mode::Banded(opt) => {
            let opt = opt.clone();
            let pool = Pool::new(move || BandedChainer::new(opt.clone()));
            groups
                .into_par_iter()
                .map(|((query, target), mut anchors)| {
                    clean(&mut anchors, opt_k, opt_trim, opt_trim_distance);
                    let mut chainer = pool.get();

                    // the banded chainer expects one strand at a time
                    let (fwd, rev): (Vec<Anchor>, Vec<Anchor>) =
                        anchors.into_iter().partition(|a| a.q_rc == a.t_rc);
                    let mut chains = chainer.chain(&fwd);
                    chains.extend(chainer.chain(&rev));
                    format_chains(&query, &target, &chains)
                })
                .collect()
        }
    };

    //----------------------------
    // Output
    //----------------------------
    for out_string in outputs {
        writer.write_all(out_string.as_ref())?;
    }

    Ok(())
}

/// Anchors grouped by (query, target), in first-seen order.
fn read_anchors(infile: &str) -> anyhow::Result<IndexMap<(String, String), Vec<Anchor>>> {
    let reader = lexichain::reader(infile)?;
    let mut groups: IndexMap<(String, String), Vec<Anchor>> = IndexMap::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.splitn(3, '\t');
        let query = fields.next().unwrap_or_default();
        let target = fields.next().unwrap_or_default();
        let rest = fields
            .next()
            .with_context(|| format!("{}:{}: too few fields", infile, i + 1))?;
        let anchor: Anchor = rest
            .parse()
            .with_context(|| format!("{}:{}: invalid anchor", infile, i + 1))?;

        groups
            .entry((query.to_string(), target.to_string()))
            .or_default()
            .push(anchor);
    }

    Ok(groups)
}

fn clean(anchors: &mut Vec<Anchor>, k: usize, trim: bool, trim_distance: f64) {
    let n = anchors.len();
    clear_substr_pairs(anchors, k);
    if trim {
        trim_substr_pairs(anchors, k, trim_distance);
    }
    log::debug!("cleanup kept {} of {} anchors", anchors.len(), n);
}

fn format_chains(query: &str, target: &str, chains: &[Chain]) -> String {
    let mut out_string = String::new();
    for (i, c) in chains.iter().enumerate() {
        let fields = [
            query.to_string(),
            target.to_string(),
            (i + 1).to_string(),
            format!("{:.1}", c.score),
            c.q_begin.to_string(),
            c.q_end.to_string(),
            c.t_begin.to_string(),
            c.t_end.to_string(),
            c.len().to_string(),
            c.matched_bases.to_string(),
            c.aligned_bases_q.to_string(),
            c.aligned_bases_t.to_string(),
            format!("{:.2}", c.pident),
        ];
        out_string += &format!("{}\n", fields.iter().join("\t"));
    }
    out_string
}
