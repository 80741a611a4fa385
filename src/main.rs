mod cli;

use std::path::PathBuf;

use clap::ArgMatches;
use log::{LevelFilter, info};
use taskify::{Config, Error, PragmaRecords};

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn config(matches: &ArgMatches) -> Config {
    let mut config = Config::default();
    config.entry_function = if matches.get_flag("no-entry") {
        None
    } else {
        matches.get_one::<String>("entry").cloned()
    };
    if let Some(&tile) = matches.get_one::<i64>("tile") {
        config.loop_tile = tile;
    }
    if let Some(header) = matches.get_one::<String>("runtime-header") {
        config.runtime.header = header.clone();
    }
    config
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let config = config(matches);

    let mut records = PragmaRecords::default();
    for path in matches.get_many::<PathBuf>("metadata").into_iter().flatten() {
        info!("reading directive records from {}", path.display());
        records.merge(PragmaRecords::parse(&std::fs::read_to_string(path)?)?)?;
    }

    let input = matches
        .get_one::<PathBuf>("INPUT")
        .ok_or_else(|| Error::ParseError("no input file".to_string()))?;
    let source = std::fs::read_to_string(input)?;
    let output = taskify::translate_with_records(&source, &config, records)?;

    match matches.get_one::<PathBuf>("output") {
        Some(path) => {
            std::fs::write(path, output)?;
            info!("wrote {}", path.display());
        }
        None => print!("{output}"),
    }
    Ok(())
}

fn main() {
    let matches = cli::cli();
    init_logger(matches.get_count("verbose"));

    if let Err(e) = run(&matches) {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}
