extern crate clap;
use clap::*;

mod cmd_lexichain;

fn main() -> anyhow::Result<()> {
    let app = Command::new("lexichain")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`lexichain` - Anchor chaining and approximate sequence similarity")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Logging verbosity: -v for info, -vv for debug"),
        )
        .subcommand(cmd_lexichain::chain::make_subcommand())
        .subcommand(cmd_lexichain::compare::make_subcommand())
        .after_help(
            r###"Subcommands:

* chain   - Chain anchors from a TSV file, per query/target pair
* compare - Pseudo-align query sequences against target sequences

Logs go to stderr.

"###,
        );

    let matches = app.get_matches();
    init_logger(matches.get_count("verbose"));

    match matches.subcommand() {
        Some(("chain", sub_matches)) => cmd_lexichain::chain::execute(sub_matches),
        Some(("compare", sub_matches)) => cmd_lexichain::compare::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}

fn init_logger(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp(None)
        .format_target(false)
        .init();
}
