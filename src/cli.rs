use std::path::PathBuf;

use clap::{ArgAction, ArgMatches, arg, command, value_parser};

pub(crate) fn cli() -> ArgMatches {
    command!()
        .about("Translate OpenMP-annotated C into task-parallel runtime calls")
        .arg(arg!(<INPUT> "C source file to translate").value_parser(value_parser!(PathBuf)))
        .arg(
            arg!(-o --output <OUTPUT> "Write the translation here instead of stdout")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-m --metadata <FILE> "Directive record file, may be repeated")
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Append),
        )
        .arg(arg!(--entry <NAME> "Function whose body is launched by the runtime").default_value("main"))
        .arg(
            arg!(--"no-entry" "Do not wrap any entry function")
                .conflicts_with("entry")
                .action(ArgAction::SetTrue),
        )
        .arg(
            arg!(--tile <N> "Tile size of generated loop domains")
                .value_parser(value_parser!(i64))
                .allow_negative_numbers(true)
                .default_value("-1"),
        )
        .arg(arg!(--"runtime-header" <HEADER> "Runtime header to include").default_value("hclib.h"))
        .arg(arg!(-v --verbose "Increase log verbosity").action(ArgAction::Count))
        .get_matches()
}
