// Report generation from the checkpoint

use crate::data::{CheckpointStatus, CheckpointStore};
use crate::error::{HarvestError, Result};
use crate::model::CanonicalSchema;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Markdown => "md",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub status: CheckpointStatus,
    pub columns: Vec<String>,
    /// `None` is an absent value
    pub rows: Vec<Vec<Option<String>>>,
}

pub fn gather_report_data(store: &CheckpointStore, schema: &CanonicalSchema) -> Result<ReportData> {
    let checkpoint = store.load(schema)?;
    let status = store.status()?;

    Ok(ReportData {
        status,
        columns: schema.names(),
        rows: checkpoint
            .records
            .iter()
            .map(|row| row.values().to_vec())
            .collect(),
    })
}

pub fn generate_report(data: &ReportData, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => Ok(generate_json_report(data)?),
        ReportFormat::Csv => generate_csv_report(data),
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(DIVIDER);
    report.push('\n');
    report.push_str("                            HARVEST REPORT\n");
    report.push_str(DIVIDER);
    report.push_str("\n\n");

    report.push_str(&format!(
        "Root:         {}\n",
        data.status.root_url.as_deref().unwrap_or("(not started)")
    ));
    if let Some(ref updated) = data.status.updated_at {
        report.push_str(&format!("Updated:      {}\n", updated));
    }
    report.push_str(&format!("Rows:         {}\n", data.rows.len()));
    report.push_str(&format!("Columns:      {}\n", data.columns.len()));
    report.push_str(&format!(
        "Groups:       {} completed, {} failed, {} pending\n",
        data.status.completed, data.status.failed, data.status.pending
    ));
    report.push_str(&format!("Skipped:      {}\n\n", data.status.failures.len()));

    if data.rows.is_empty() {
        report.push_str("No rows harvested yet.\n");
        return report;
    }

    let label_width = data.columns.iter().map(|c| c.len()).max().unwrap_or(0);

    report.push_str(DIVIDER);
    report.push_str("\nROWS\n");
    report.push_str(DIVIDER);
    report.push_str("\n\n");

    for (index, row) in data.rows.iter().enumerate() {
        report.push_str(&format!("[{}]\n", index + 1));
        for (column, value) in data.columns.iter().zip(row) {
            if let Some(value) = value {
                report.push_str(&format!(
                    "  {:<width$}  {}\n",
                    column,
                    value,
                    width = label_width
                ));
            }
        }
        report.push('\n');
    }

    report
}

pub fn generate_json_report(data: &ReportData) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Harvester",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "checkpoint": {
                "root_url": data.status.root_url,
                "created_at": data.status.created_at,
                "updated_at": data.status.updated_at,
                "groups": {
                    "completed": data.status.completed,
                    "failed": data.status.failed,
                    "pending": data.status.pending
                }
            },
            "columns": data.columns,
            "rows": data.rows,
            "skipped": data.status.failures
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// Header row is the schema; absent values are empty cells.
pub fn generate_csv_report(data: &ReportData) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&data.columns)?;
    for row in &data.rows {
        writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| HarvestError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str("# Harvest Report\n\n");
    if let Some(ref root) = data.status.root_url {
        report.push_str(&format!("- **Root:** {}\n", root));
    }
    report.push_str(&format!("- **Rows:** {}\n", data.rows.len()));
    report.push_str(&format!(
        "- **Groups:** {} completed, {} failed, {} pending\n\n",
        data.status.completed, data.status.failed, data.status.pending
    ));

    let header: Vec<String> = data.columns.iter().map(|c| escape_markdown(c)).collect();
    report.push_str(&format!("| {} |\n", header.join(" | ")));
    report.push_str(&format!(
        "|{}\n",
        data.columns.iter().map(|_| " --- |").collect::<String>()
    ));
    for row in &data.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| v.as_deref().map(escape_markdown).unwrap_or_default())
            .collect();
        report.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    if !data.status.failures.is_empty() {
        report.push_str("\n## Skipped\n\n");
        for failure in &data.status.failures {
            report.push_str(&format!(
                "- {} **{}** ({}): {}\n",
                failure.kind.as_str(),
                escape_markdown(&failure.label),
                failure.url,
                escape_markdown(&failure.reason)
            ));
        }
    }

    report
}

/// Plain-text rendering of `harvester status`.
pub fn generate_status_report(status: &CheckpointStatus) -> String {
    let mut report = String::new();

    report.push_str(&format!(
        "Root:       {}\n",
        status.root_url.as_deref().unwrap_or("(not started)")
    ));
    if let Some(ref created) = status.created_at {
        report.push_str(&format!("Started:    {}\n", created));
    }
    if let Some(ref updated) = status.updated_at {
        report.push_str(&format!("Updated:    {}\n", updated));
    }
    report.push_str(&format!("Rows:       {}\n", status.rows));
    report.push_str(&format!("Columns:    {}\n", status.columns.len()));
    report.push_str(&format!("Completed:  {}\n", status.completed));
    report.push_str(&format!("Failed:     {}\n", status.failed));
    report.push_str(&format!("Pending:    {}\n", status.pending));

    if !status.failures.is_empty() {
        report.push_str(&format!("\nSkipped units ({}):\n", status.failures.len()));
        for failure in &status.failures {
            report.push_str(&format!(
                "  [{}] {} <{}>\n      {}\n",
                failure.kind.as_str(),
                failure.label,
                failure.url,
                failure.reason
            ));
        }
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
