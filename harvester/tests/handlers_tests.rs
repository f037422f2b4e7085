use harvester::handlers::*;
use harvester::command_argument_builder;
use harvester_core::data::CheckpointStore;
use harvester_core::model::{CanonicalSchema, GroupNode, GroupStatus};
use harvester_core::report::ReportFormat;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

fn matches_for(argv: &[&str]) -> clap::ArgMatches {
    let mut full = vec!["harvester"];
    full.extend_from_slice(argv);
    let matches = command_argument_builder().try_get_matches_from(full).unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    sub.clone()
}

fn seed_checkpoint(path: &Path) {
    let mut store = CheckpointStore::open(path).unwrap();
    let schema = CanonicalSchema::default();
    store
        .initialize(
            "http://example.com/root",
            &schema,
            &[
                GroupNode::new("A", "http://example.com/a"),
                GroupNode::new("B", "http://example.com/b"),
            ],
        )
        .unwrap();

    let mut raw = BTreeMap::new();
    raw.insert("Name".to_string(), "Acme".to_string());
    raw.insert("Revenue".to_string(), "US$ 5 million".to_string());
    store
        .commit_group(0, GroupStatus::Completed, None, &[schema.project(&raw)], &[])
        .unwrap();
}

#[test]
fn test_crawl_flags_override_defaults() {
    let args = matches_for(&[
        "crawl",
        "--root-url",
        "https://example.org/wiki/Root",
        "--delay-ms",
        "250",
        "--timeout",
        "4",
        "--attempts",
        "5",
        "--user-agent",
        "test-agent",
        "--checkpoint",
        "/tmp/harvest-test.db",
    ]);

    let config = load_config(&args).unwrap();
    assert_eq!(config.root_url, "https://example.org/wiki/Root");
    assert_eq!(config.request_delay_ms, 250);
    assert_eq!(config.timeout_secs, 4);
    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.user_agent, "test-agent");
    assert_eq!(config.checkpoint_path, "/tmp/harvest-test.db");
}

#[test]
fn test_zero_attempts_rejected_by_parser() {
    let result = command_argument_builder().try_get_matches_from(["harvester", "crawl", "--attempts", "0"]);
    assert!(result.is_err());
}

#[test]
fn test_fresh_conflicts_with_retry_failed() {
    let result = command_argument_builder().try_get_matches_from([
        "harvester",
        "crawl",
        "--fresh",
        "--retry-failed",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_config_file_then_flags() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, r#"{{"request_delay_ms": 1000, "max_attempts": 2}}"#)?;
    let path = file.path().to_str().unwrap().to_string();

    let args = matches_for(&["crawl", "--config", &path, "--attempts", "4"]);
    let config = load_config(&args)?;

    assert_eq!(config.request_delay_ms, 1000);
    assert_eq!(config.max_attempts, 4);
    Ok(())
}

#[test]
fn test_invalid_config_file_is_reported() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"site": {{"items_marker": "("}}}}"#).unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let args = matches_for(&["crawl", "--config", &path]);
    assert!(load_config(&args).is_err());
}

#[test]
fn test_parse_format() {
    assert_eq!(parse_format("csv").unwrap(), ReportFormat::Csv);
    assert_eq!(parse_format("MD").unwrap(), ReportFormat::Markdown);
    assert!(parse_format("xml").is_err());
}

#[test]
fn test_render_export_csv() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    seed_checkpoint(&db_path);

    let args = matches_for(&["export", "--checkpoint", db_path.to_str().unwrap(), "-f", "csv"]);
    let config = load_config(&args).unwrap();
    let csv = render_export(&config, &config.checkpoint_path(), ReportFormat::Csv).unwrap();

    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("Name,Group,Type"));
    assert!(lines.next().unwrap().starts_with("Acme,,"));
    assert!(lines.next().is_none());
}

#[test]
fn test_render_export_missing_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("absent.db");

    let args = matches_for(&["export", "--checkpoint", db_path.to_str().unwrap()]);
    let config = load_config(&args).unwrap();
    assert!(render_export(&config, &config.checkpoint_path(), ReportFormat::Text).is_err());
    assert!(!db_path.exists());
}

#[test]
fn test_render_status_text_and_json() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    seed_checkpoint(&db_path);

    let args = matches_for(&["status", "--checkpoint", db_path.to_str().unwrap()]);
    let text = render_status(&args).unwrap();
    assert!(text.contains("Rows:       1"));
    assert!(text.contains("Pending:    1"));

    let args = matches_for(&["status", "--checkpoint", db_path.to_str().unwrap(), "--json"]);
    let json: serde_json::Value = serde_json::from_str(&render_status(&args).unwrap()).unwrap();
    assert_eq!(json["completed"], 1);
    assert_eq!(json["columns"].as_array().unwrap().len(), 12);
}

#[test]
fn test_write_output_to_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("out.md");

    write_output("# Harvest Report\n", Some(&path), ReportFormat::Markdown).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Harvest Report\n");
}

#[test]
fn test_write_output_into_directory() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().to_path_buf();

    write_output("Name\nAcme\n", Some(&dir), ReportFormat::Csv).unwrap();
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("harvest.csv")).unwrap(),
        "Name\nAcme\n"
    );
    assert_eq!(
        output_path(temp_dir.path(), ReportFormat::Text),
        temp_dir.path().join("harvest.txt")
    );
}
