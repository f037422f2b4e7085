use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn checkpoint_arg() -> clap::Arg {
    arg!(-c --"checkpoint" <PATH>)
        .required(false)
        .help("Checkpoint database (default: ~/.config/harvester/harvest.db)")
}

fn config_arg() -> clap::Arg {
    arg!(--"config" <PATH>)
        .required(false)
        .help("JSON config file; command line flags override its values")
        .value_parser(clap::value_parser!(PathBuf))
}

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Output format: text, json, csv, markdown")
}

fn output_arg() -> clap::Arg {
    arg!(-o --"output" <PATH>)
        .required(false)
        .help("Write the output to a file (or harvest.<ext> in a directory) instead of stdout")
        .value_parser(clap::value_parser!(PathBuf))
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("harvester")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("harvester")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Walk the root listing, its groups and their items, collecting every \
                info-table into the checkpointed dataset. Resumes an existing checkpoint.",
                )
                .arg(
                    arg!(-u --"root-url" <URL>)
                        .required(false)
                        .help("Root listing page")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(checkpoint_arg())
                .arg(config_arg())
                .arg(
                    arg!(--"delay-ms" <MS>)
                        .required(false)
                        .help("Minimum delay between requests in milliseconds (default: 3000)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-t --"timeout" <SECS>)
                        .required(false)
                        .help("Per-attempt timeout in seconds (default: 10)")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    arg!(--"attempts" <N>)
                        .required(false)
                        .help("Attempts per request when it times out (default: 3)")
                        .value_parser(clap::value_parser!(u32).range(1..)),
                )
                .arg(
                    arg!(--"user-agent" <UA>)
                        .required(false)
                        .help("User-Agent header sent with every request"),
                )
                .arg(
                    arg!(--"fresh")
                        .help("Discard the existing checkpoint and start over")
                        .required(false),
                )
                .arg(
                    arg!(--"retry-failed")
                        .help("Queue groups that failed in a previous run again")
                        .required(false)
                        .conflicts_with("fresh"),
                )
                .arg(
                    arg!(--"log-file" <PATH>)
                        .required(false)
                        .help("Append-only log file (default: harvester.log next to the checkpoint)"),
                )
                .arg(output_arg())
                .arg(format_arg()),
        )
        .subcommand(
            command!("export")
                .about("Render the checkpointed dataset")
                .arg(checkpoint_arg())
                .arg(config_arg())
                .arg(format_arg().default_value("text"))
                .arg(output_arg()),
        )
        .subcommand(
            command!("status")
                .about("Show checkpoint progress and recorded failures")
                .arg(checkpoint_arg())
                .arg(config_arg())
                .arg(
                    arg!(--"json")
                        .help("Print the status as JSON")
                        .required(false),
                ),
        )
}
