use crate::logging::init_logging;
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use harvester_core::accumulator::Accumulator;
use harvester_core::config::HarvestConfig;
use harvester_core::crawl::{HarvestProgressCallback, HarvestSummary, Harvester};
use harvester_core::data::CheckpointStore;
use harvester_core::report::{
    ReportFormat, gather_report_data, generate_report, generate_status_report, save_report,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Value of `id` if this subcommand defines it and it was given.
fn opt<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, id: &str) -> Option<&'a T> {
    args.try_get_one::<T>(id).ok().flatten()
}

fn flag(args: &ArgMatches, id: &str) -> bool {
    args.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}

fn print_divider() {
    println!("{}", "─".repeat(60).bright_black());
}

/// Defaults, then the `--config` file, then command line flags.
pub fn load_config(args: &ArgMatches) -> Result<HarvestConfig> {
    let mut config = match opt::<PathBuf>(args, "config") {
        Some(path) => HarvestConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HarvestConfig::default(),
    };
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

pub fn apply_overrides(config: &mut HarvestConfig, args: &ArgMatches) {
    if let Some(url) = opt::<Url>(args, "root-url") {
        config.root_url = url.to_string();
    }
    if let Some(path) = opt::<String>(args, "checkpoint") {
        config.checkpoint_path = path.clone();
    }
    if let Some(delay) = opt::<u64>(args, "delay-ms") {
        config.request_delay_ms = *delay;
    }
    if let Some(timeout) = opt::<u64>(args, "timeout") {
        config.timeout_secs = *timeout;
    }
    if let Some(attempts) = opt::<u32>(args, "attempts") {
        config.max_attempts = *attempts;
    }
    if let Some(user_agent) = opt::<String>(args, "user-agent") {
        config.user_agent = user_agent.clone();
    }
    if let Some(log_file) = opt::<String>(args, "log-file") {
        config.log_file = Some(log_file.clone());
    }
}

pub fn parse_format(value: &str) -> Result<ReportFormat> {
    ReportFormat::from_str(value).ok_or_else(|| {
        anyhow!(
            "unknown format '{}' (expected text, json, csv or markdown)",
            value
        )
    })
}

/// File an export is saved to: `output` itself, or `harvest.<ext>` inside it
/// when it names a directory.
pub fn output_path(output: &Path, format: ReportFormat) -> PathBuf {
    if output.is_dir() {
        output.join(format!("harvest.{}", format.extension()))
    } else {
        output.to_path_buf()
    }
}

/// Print to stdout, or save when an output path is given.
pub fn write_output(content: &str, output: Option<&PathBuf>, format: ReportFormat) -> Result<()> {
    match output {
        Some(output) => {
            let path = output_path(output, format);
            save_report(content, &path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{} Saved to {}", "✓".green(), path.display().to_string().bright_white());
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Render the checkpoint at `checkpoint` in `format`.
pub fn render_export(config: &HarvestConfig, checkpoint: &Path, format: ReportFormat) -> Result<String> {
    if !CheckpointStore::exists(checkpoint) {
        return Err(anyhow!("no checkpoint at {}", checkpoint.display()));
    }
    let store = CheckpointStore::open(checkpoint)?;
    let data = gather_report_data(&store, &config.canonical_schema()?)?;
    Ok(generate_report(&data, format)?)
}

pub async fn handle_crawl(args: &ArgMatches) {
    if let Err(e) = run_crawl(args).await {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
}

async fn run_crawl(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let checkpoint = config.checkpoint_path();
    let export_format = opt::<String>(args, "format")
        .map(|f| parse_format(f))
        .transpose()?;
    let output = opt::<PathBuf>(args, "output");

    if flag(args, "fresh") {
        CheckpointStore::drop(&checkpoint)
            .with_context(|| format!("removing checkpoint {}", checkpoint.display()))?;
    }

    let _guard = init_logging(&config.log_file_path())?;
    info!(
        root = %config.root_url,
        checkpoint = %checkpoint.display(),
        delay_ms = config.request_delay_ms,
        "Starting harvest"
    );

    println!("\n🌾 Harvesting from {}", config.root_url.bright_white());
    println!("Checkpoint:  {}", checkpoint.display());
    println!("Log file:    {}", config.log_file_path().display());
    println!(
        "Politeness:  {} ms between requests, {} s timeout, {} attempt(s)",
        config.request_delay_ms, config.timeout_secs, config.max_attempts
    );
    print_divider();

    let store = CheckpointStore::open(&checkpoint)?;
    let mut acc = Accumulator::open(store, config.canonical_schema()?)?;

    if flag(args, "retry-failed") {
        let reset = acc.reset_failed()?;
        println!("Re-queued {} failed group(s)", reset);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Starting harvest...");

    let spinner_clone = spinner.clone();
    let progress: HarvestProgressCallback = Arc::new(move |msg: String| {
        spinner_clone.set_message(msg);
    });

    let harvester = Harvester::from_config(&config)?.with_progress_callback(progress);
    let result = harvester.run(&config.root_url, &mut acc).await;
    spinner.finish_and_clear();
    let summary = result?;

    print_summary(&summary);
    drop(acc);

    if export_format.is_some() || output.is_some() {
        let format = export_format.unwrap_or(ReportFormat::Text);
        let content = render_export(&config, &checkpoint, format)?;
        write_output(&content, output, format)?;
    }

    Ok(())
}

fn print_summary(summary: &HarvestSummary) {
    println!("\n{} Harvest complete!\n", "✓".green());
    if summary.resumed {
        println!(
            "  Resumed:          {} of {} groups were already done",
            summary.groups_already_done, summary.groups_total
        );
    }
    println!("  Groups completed: {}", summary.groups_completed.to_string().green());
    println!("  Groups failed:    {}", summary.groups_failed.to_string().red());
    println!("  Rows appended:    {}", summary.items_appended);
    println!("  Items skipped:    {}", summary.items_skipped.to_string().yellow());
    println!("  Rows in dataset:  {}", summary.rows_total.to_string().bright_white());

    if !summary.skipped.is_empty() {
        println!();
        print_divider();
        for unit in &summary.skipped {
            println!(
                "  {} [{}] {} {}",
                "⚠".yellow(),
                unit.kind.as_str(),
                unit.label,
                unit.reason.bright_black()
            );
        }
    }
}

pub fn handle_export(args: &ArgMatches) {
    if let Err(e) = run_export(args) {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
}

fn run_export(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let format = parse_format(opt::<String>(args, "format").map(String::as_str).unwrap_or("text"))?;
    let content = render_export(&config, &config.checkpoint_path(), format)?;
    write_output(&content, opt::<PathBuf>(args, "output"), format)
}

pub fn handle_status(args: &ArgMatches) {
    if let Err(e) = run_status(args) {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
}

/// Status of the checkpoint as plain text, or JSON with `--json`.
pub fn render_status(args: &ArgMatches) -> Result<String> {
    let config = load_config(args)?;
    let checkpoint = config.checkpoint_path();
    if !CheckpointStore::exists(&checkpoint) {
        return Err(anyhow!("no checkpoint at {}", checkpoint.display()));
    }

    let status = CheckpointStore::open(&checkpoint)?.status()?;
    if flag(args, "json") {
        Ok(serde_json::to_string_pretty(&status)? + "\n")
    } else {
        Ok(generate_status_report(&status))
    }
}

fn run_status(args: &ArgMatches) -> Result<()> {
    let report = render_status(args)?;
    print!("{}", report);
    Ok(())
}
