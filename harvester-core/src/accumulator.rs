//! Sole owner of the master dataset and the checkpoint store.
//!
//! Rows are appended in memory as items succeed and reach disk when their
//! group is checkpointed. A crash in between loses only the rows of the
//! group in progress; everything committed before stays.

use crate::data::CheckpointStore;
use crate::error::{HarvestError, Result};
use crate::model::{
    CanonicalRecord, CanonicalSchema, GroupEntry, GroupNode, GroupStatus, MasterDataset,
    SkippedUnit,
};
use harvester_scanner::RawRecord;
use tracing::{debug, info};

pub struct Accumulator {
    dataset: MasterDataset,
    groups: Vec<GroupEntry>,
    root_url: Option<String>,
    store: CheckpointStore,
    committed: usize,
}

impl Accumulator {
    /// Load whatever the store already holds and continue from there.
    pub fn open(store: CheckpointStore, schema: CanonicalSchema) -> Result<Self> {
        let checkpoint = store.load(&schema)?;

        let mut dataset = MasterDataset::new(schema);
        dataset.reserve(checkpoint.records.len());
        for record in checkpoint.records {
            dataset.push(record);
        }
        let committed = dataset.len();

        if !checkpoint.groups.is_empty() {
            info!(
                rows = committed,
                groups = checkpoint.groups.len(),
                remaining = checkpoint
                    .groups
                    .iter()
                    .filter(|g| g.status == GroupStatus::Pending)
                    .count(),
                "Loaded checkpoint"
            );
        }

        Ok(Self {
            dataset,
            groups: checkpoint.groups,
            root_url: checkpoint.root_url,
            store,
            committed,
        })
    }

    pub fn schema(&self) -> &CanonicalSchema {
        self.dataset.schema()
    }

    pub fn dataset(&self) -> &MasterDataset {
        &self.dataset
    }

    pub fn root_url(&self) -> Option<&str> {
        self.root_url.as_deref()
    }

    /// Whether a group list has been recorded, i.e. whether this is a resume.
    pub fn is_initialized(&self) -> bool {
        !self.groups.is_empty()
    }

    pub fn groups(&self) -> &[GroupEntry] {
        &self.groups
    }

    pub fn remaining(&self) -> Vec<GroupEntry> {
        self.groups
            .iter()
            .filter(|g| g.status == GroupStatus::Pending)
            .cloned()
            .collect()
    }

    /// Rows appended since the last checkpoint.
    pub fn uncommitted(&self) -> usize {
        self.dataset.len() - self.committed
    }

    /// Record the group list of a fresh run.
    pub fn initialize(&mut self, root_url: &str, groups: Vec<GroupNode>) -> Result<()> {
        if self.committed > 0 {
            return Err(HarvestError::CorruptCheckpoint(
                "refusing to re-initialize a checkpoint that already holds rows".to_string(),
            ));
        }

        self.store
            .initialize(root_url, self.dataset.schema(), &groups)?;

        self.groups = groups
            .into_iter()
            .enumerate()
            .map(|(position, node)| GroupEntry {
                position,
                node,
                status: GroupStatus::Pending,
                reason: None,
            })
            .collect();
        self.root_url = Some(root_url.to_string());
        Ok(())
    }

    pub fn canonicalize(&self, raw: &RawRecord) -> CanonicalRecord {
        self.dataset.schema().project(raw)
    }

    /// Append one row. The only way rows enter the dataset.
    pub fn append(&mut self, record: CanonicalRecord) -> Result<()> {
        let width = self.dataset.schema().width();
        if record.width() != width {
            return Err(HarvestError::SchemaMismatch(format!(
                "row has {} values, schema has {} columns",
                record.width(),
                width
            )));
        }
        self.dataset.push(record);
        Ok(())
    }

    /// Persist the outcome of the group at `position` together with the
    /// rows appended since the previous checkpoint. The in-memory status
    /// only changes once the write has committed.
    pub fn checkpoint(
        &mut self,
        position: usize,
        status: GroupStatus,
        reason: Option<&str>,
        failures: &[SkippedUnit],
    ) -> Result<()> {
        let rows = &self.dataset.rows()[self.committed..];
        self.store
            .commit_group(position, status, reason, rows, failures)?;

        debug!(
            position,
            status = status.as_str(),
            rows = rows.len(),
            "Checkpoint committed"
        );
        self.committed = self.dataset.len();

        if let Some(entry) = self.groups.iter_mut().find(|g| g.position == position) {
            entry.status = status;
            entry.reason = reason.map(str::to_string);
        }
        Ok(())
    }

    /// Queue previously failed groups again.
    pub fn reset_failed(&mut self) -> Result<usize> {
        let reset = self.store.reset_failed()?;
        for entry in self
            .groups
            .iter_mut()
            .filter(|g| g.status == GroupStatus::Failed)
        {
            entry.status = GroupStatus::Pending;
            entry.reason = None;
        }
        Ok(reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UnitKind;
    use tempfile::TempDir;

    fn open_accumulator(dir: &TempDir) -> Accumulator {
        let store = CheckpointStore::open(&dir.path().join("harvest.db")).unwrap();
        Accumulator::open(store, CanonicalSchema::default()).unwrap()
    }

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_uncheckpointed_rows_are_lost_on_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut acc = open_accumulator(&dir);
            acc.initialize(
                "http://example.com/root",
                vec![GroupNode::new("A", "http://example.com/a"), GroupNode::new("B", "http://example.com/b")],
            )
            .unwrap();

            let record = acc.canonicalize(&raw(&[("Name", "Acme")]));
            acc.append(record).unwrap();
            acc.checkpoint(0, GroupStatus::Completed, None, &[]).unwrap();

            let record = acc.canonicalize(&raw(&[("Name", "Globex")]));
            acc.append(record).unwrap();
            assert_eq!(acc.uncommitted(), 1);
        }

        let acc = open_accumulator(&dir);
        assert_eq!(acc.dataset().len(), 1);
        assert_eq!(acc.dataset().get(0, "Name"), Some(Some("Acme")));
        let remaining: Vec<_> = acc.remaining().into_iter().map(|g| g.node.label).collect();
        assert_eq!(remaining, vec!["B".to_string()]);
    }

    #[test]
    fn test_failed_group_is_recorded_and_can_be_reset() {
        let dir = TempDir::new().unwrap();
        let mut acc = open_accumulator(&dir);
        acc.initialize("http://example.com/root", vec![GroupNode::new("A", "http://example.com/a")])
            .unwrap();

        let failure = SkippedUnit {
            kind: UnitKind::Group,
            label: "A".to_string(),
            url: "http://example.com/a".to_string(),
            reason: "items table not found".to_string(),
        };
        acc.checkpoint(0, GroupStatus::Failed, Some("items table not found"), &[failure])
            .unwrap();
        assert!(acc.remaining().is_empty());

        assert_eq!(acc.reset_failed().unwrap(), 1);
        assert_eq!(acc.remaining().len(), 1);
    }

    #[test]
    fn test_append_rejects_foreign_width() {
        let dir = TempDir::new().unwrap();
        let mut acc = open_accumulator(&dir);

        let narrow = CanonicalSchema::new(vec![crate::model::Column::new("Only", &["Only"])]).unwrap();
        let record = narrow.project(&raw(&[("Only", "x")]));
        assert!(matches!(acc.append(record), Err(HarvestError::SchemaMismatch(_))));
        assert!(acc.dataset().is_empty());
    }
}
