use colored::Colorize;
use harvester::command_argument_builder;
use harvester::handlers::{handle_crawl, handle_export, handle_status};

fn print_banner() {
    println!(
        "{}",
        r#"
  _
 | |__   __ _ _ ____   _____  ___| |_ ___ _ __
 | '_ \ / _` | '__\ \ / / _ \/ __| __/ _ \ '__|
 | | | | (_| | |   \ V /  __/\__ \ ||  __/ |
 |_| |_|\__,_|_|    \_/ \___||___/\__\___|_|
"#
        .bright_yellow()
    );
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "polite, resumable info-table crawler".bright_black()
    );
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("export", primary_command)) => handle_export(primary_command),
        Some(("status", primary_command)) => handle_status(primary_command),
        None => {}
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
