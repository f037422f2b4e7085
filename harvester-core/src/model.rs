use harvester_scanner::RawRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const NAME_COLUMN: &str = "Name";
pub const GROUP_COLUMN: &str = "Group";

/// First-level node of the hierarchy, e.g. one country listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupNode {
    pub label: String,
    pub url: String,
}

impl GroupNode {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Second-level node: one entity whose detail page holds the info-table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemNode<'g> {
    pub label: String,
    pub url: String,
    pub group: &'g GroupNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    Pending,
    Completed,
    Failed,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Pending => "pending",
            GroupStatus::Completed => "completed",
            GroupStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(GroupStatus::Pending),
            "completed" => Some(GroupStatus::Completed),
            "failed" => Some(GroupStatus::Failed),
            _ => None,
        }
    }
}

/// A group as tracked by the checkpoint: its place in the root listing and
/// how far it got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub position: usize,
    pub node: GroupNode,
    pub status: GroupStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    Group,
    Item,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Group => "group",
            UnitKind::Item => "item",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "group" => Some(UnitKind::Group),
            "item" => Some(UnitKind::Item),
            _ => None,
        }
    }
}

/// A group or item that was attempted and skipped, with enough context to
/// re-run it by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedUnit {
    pub kind: UnitKind,
    pub label: String,
    pub url: String,
    pub reason: String,
}

/// Output column and the info-table field names that feed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub sources: Vec<String>,
}

impl Column {
    pub fn new(name: &str, sources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub fn default_columns() -> Vec<Column> {
    vec![
        Column::new(NAME_COLUMN, &[NAME_COLUMN]),
        Column::new(GROUP_COLUMN, &[GROUP_COLUMN]),
        Column::new("Type", &["Type"]),
        Column::new("Industry", &["Industry"]),
        Column::new("Website", &["Website"]),
        Column::new("URL", &["URL"]),
        Column::new("Employees", &["Number of employees"]),
        Column::new("Revenue", &["Revenue"]),
        Column::new("NetIncome", &["Net income"]),
        Column::new("ID", &["ISIN"]),
        Column::new("HQAddress", &["Headquarters"]),
        Column::new("HQLocation", &["Headquarters location"]),
    ]
}

fn field_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The fixed, ordered output columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSchema {
    columns: Vec<Column>,
}

impl CanonicalSchema {
    /// Build a schema, rejecting empty, blank or duplicated column names.
    pub fn new(columns: Vec<Column>) -> Result<Self, String> {
        if columns.is_empty() {
            return Err("schema has no columns".to_string());
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if column.name.trim().is_empty() {
                return Err("schema column with empty name".to_string());
            }
            if !seen.insert(column.name.as_str()) {
                return Err(format!("duplicate schema column '{}'", column.name));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Project a raw record onto the schema. Fields no column asks for are
    /// dropped; columns with no matching field are absent (`None`).
    pub fn project(&self, raw: &RawRecord) -> CanonicalRecord {
        let mut by_key: HashMap<String, &str> = HashMap::with_capacity(raw.len());
        for (name, value) in raw {
            by_key.entry(field_key(name)).or_insert(value.as_str());
        }

        let values = self
            .columns
            .iter()
            .map(|column| {
                column
                    .sources
                    .iter()
                    .find_map(|source| by_key.get(&field_key(source)))
                    .map(|value| value.to_string())
            })
            .collect();

        CanonicalRecord { values }
    }

    /// Rebuild a record read back from storage, checking its width.
    pub fn record_from_values(&self, values: Vec<Option<String>>) -> Result<CanonicalRecord, String> {
        if values.len() != self.width() {
            return Err(format!(
                "stored row has {} values, schema has {} columns",
                values.len(),
                self.width()
            ));
        }
        Ok(CanonicalRecord { values })
    }
}

impl Default for CanonicalSchema {
    fn default() -> Self {
        Self {
            columns: default_columns(),
        }
    }
}

/// One output row. Always exactly as wide as the schema that built it;
/// `None` marks an absent value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    values: Vec<Option<String>>,
}

impl CanonicalRecord {
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// `None` when `index` is outside the row, `Some(None)` when absent.
    pub fn get(&self, index: usize) -> Option<Option<&str>> {
        self.values.get(index).map(|v| v.as_deref())
    }
}

/// Append-only, ordered collection of canonical rows.
#[derive(Debug, Clone)]
pub struct MasterDataset {
    schema: CanonicalSchema,
    rows: Vec<CanonicalRecord>,
}

impl MasterDataset {
    pub fn new(schema: CanonicalSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &CanonicalSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[CanonicalRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn push(&mut self, record: CanonicalRecord) {
        debug_assert_eq!(record.width(), self.schema.width());
        self.rows.push(record);
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.rows.reserve(additional);
    }

    /// Value of `column` in row `row`: `None` if either does not exist,
    /// `Some(None)` if the cell is absent.
    pub fn get(&self, row: usize, column: &str) -> Option<Option<&str>> {
        let index = self.schema.position(column)?;
        self.rows.get(row)?.get(index)
    }
}
