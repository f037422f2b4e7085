//! Key/value info-table extraction.
//!
//! An info-table is laid out one field per row: a name cell followed by a
//! value cell. Transposing it gives a name row and a value row, which is
//! what [`extract_infobox`] returns as a [`RawRecord`].

use crate::error::{ExtractionError, Result};
use crate::parser::{ParsedDocument, closest, element_text};
use regex::Regex;
use scraper::ElementRef;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

pub const DEFAULT_INFOBOX_SELECTOR: &str = "table.infobox";

/// Field name to raw value, exactly as the page declares them.
pub type RawRecord = BTreeMap<String, String>;

static CITATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*(?:\d+|[a-z]|note \d+|citation needed)\s*\]").unwrap()
});

/// Extract the first table matching `selector` as a [`RawRecord`].
pub fn extract_infobox(doc: &ParsedDocument, selector: &str) -> Result<RawRecord> {
    let table = doc.select_first(selector)?.ok_or_else(|| {
        ExtractionError::TableNotFound(format!("no element matches '{}'", selector))
    })?;

    let rows = table_rows(table);
    let record = transpose(&rows)?;
    debug!(fields = record.len(), "Extracted info-table");
    Ok(record)
}

/// Cell texts of the table's own rows (nested tables excluded). Rows that
/// are empty in every column are dropped.
pub fn table_rows(table: ElementRef<'_>) -> Vec<Vec<String>> {
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "tr")
        .filter(|row| closest(*row, "table").is_some_and(|t| t.id() == table.id()))
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "th" | "td"))
                .map(cell_text)
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    let text = element_text(cell);
    let stripped = CITATION_MARKER.replace_all(&text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Column 0 becomes the field names; each name takes the first non-empty
/// cell to its right as value. Names without a value are missing cells and
/// are left out; a repeated name keeps its first value.
fn transpose(rows: &[Vec<String>]) -> Result<RawRecord> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width < 2 {
        return Err(ExtractionError::InsufficientRows(format!(
            "{} row(s) after transposition, need a name row and a value row",
            width
        )));
    }

    let mut record = RawRecord::new();
    for row in rows {
        let Some((name, values)) = row.split_first() else {
            continue;
        };
        let Some(value) = values.iter().find(|v| !v.is_empty()) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        record.entry(name.clone()).or_insert_with(|| value.clone());
    }

    if record.is_empty() {
        return Err(ExtractionError::InsufficientRows(
            "no row pairs a field name with a value".to_string(),
        ));
    }

    Ok(record)
}
