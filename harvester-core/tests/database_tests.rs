// Tests for the checkpoint store

use harvester_core::data::CheckpointStore;
use harvester_core::error::HarvestError;
use harvester_core::model::{CanonicalSchema, Column, GroupNode, GroupStatus, SkippedUnit, UnitKind};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn create_test_store() -> (TempDir, CheckpointStore) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let store = CheckpointStore::open(&db_path).unwrap();
    (temp_dir, store)
}

fn groups(labels: &[&str]) -> Vec<GroupNode> {
    labels
        .iter()
        .map(|l| GroupNode::new(*l, format!("http://example.com/{}", l)))
        .collect()
}

fn record(schema: &CanonicalSchema, name: &str) -> harvester_core::CanonicalRecord {
    let mut raw = BTreeMap::new();
    raw.insert("Name".to_string(), name.to_string());
    schema.project(&raw)
}

// ============================================================================
// Store Creation Tests
// ============================================================================

#[test]
fn test_store_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("test.db");

    let store = CheckpointStore::open(&db_path);
    assert!(store.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_store_exists() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!CheckpointStore::exists(&db_path));

    let _store = CheckpointStore::open(&db_path).unwrap();
    assert!(CheckpointStore::exists(&db_path));
}

#[test]
fn test_store_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let _store = CheckpointStore::open(&db_path).unwrap();
    }
    assert!(CheckpointStore::exists(&db_path));

    CheckpointStore::drop(&db_path).unwrap();
    assert!(!CheckpointStore::exists(&db_path));

    // Dropping a missing checkpoint is not an error
    assert!(CheckpointStore::drop(&db_path).is_ok());
}

// ============================================================================
// Load / Commit Tests
// ============================================================================

#[test]
fn test_empty_store_loads_uninitialized() {
    let (_temp_dir, store) = create_test_store();

    let checkpoint = store.load(&CanonicalSchema::default()).unwrap();
    assert!(!checkpoint.is_initialized());
    assert!(checkpoint.records.is_empty());
    assert!(checkpoint.root_url.is_none());
}

#[test]
fn test_initialize_records_groups_in_order() {
    let (_temp_dir, mut store) = create_test_store();
    let schema = CanonicalSchema::default();

    store
        .initialize("http://example.com/root", &schema, &groups(&["A", "B", "C"]))
        .unwrap();

    let checkpoint = store.load(&schema).unwrap();
    assert_eq!(checkpoint.root_url.as_deref(), Some("http://example.com/root"));
    let labels: Vec<_> = checkpoint.groups.iter().map(|g| g.node.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "B", "C"]);
    assert!(checkpoint.groups.iter().all(|g| g.status == GroupStatus::Pending));
    assert_eq!(checkpoint.remaining().count(), 3);
}

#[test]
fn test_commit_group_appends_rows_and_marks_complete() {
    let (_temp_dir, mut store) = create_test_store();
    let schema = CanonicalSchema::default();
    store
        .initialize("http://example.com/root", &schema, &groups(&["A", "B"]))
        .unwrap();

    store
        .commit_group(
            0,
            GroupStatus::Completed,
            None,
            &[record(&schema, "Acme"), record(&schema, "Globex")],
            &[],
        )
        .unwrap();
    store
        .commit_group(1, GroupStatus::Completed, None, &[record(&schema, "Initech")], &[])
        .unwrap();

    let checkpoint = store.load(&schema).unwrap();
    let name = schema.position("Name").unwrap();
    let names: Vec<_> = checkpoint
        .records
        .iter()
        .map(|r| r.get(name).flatten().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Acme", "Globex", "Initech"]);
    assert_eq!(checkpoint.remaining().count(), 0);
}

#[test]
fn test_commit_unknown_group_rolls_back() {
    let (_temp_dir, mut store) = create_test_store();
    let schema = CanonicalSchema::default();
    store
        .initialize("http://example.com/root", &schema, &groups(&["A"]))
        .unwrap();

    let result = store.commit_group(7, GroupStatus::Completed, None, &[record(&schema, "Ghost")], &[]);
    assert!(matches!(result, Err(HarvestError::CorruptCheckpoint(_))));

    let checkpoint = store.load(&schema).unwrap();
    assert!(checkpoint.records.is_empty());
}

#[test]
fn test_absent_values_survive_reload() {
    let (_temp_dir, mut store) = create_test_store();
    let schema = CanonicalSchema::default();
    store
        .initialize("http://example.com/root", &schema, &groups(&["A"]))
        .unwrap();
    store
        .commit_group(0, GroupStatus::Completed, None, &[record(&schema, "Acme")], &[])
        .unwrap();

    let checkpoint = store.load(&schema).unwrap();
    let row = &checkpoint.records[0];
    assert_eq!(row.width(), schema.width());
    assert_eq!(row.get(schema.position("Revenue").unwrap()), Some(None));
}

#[test]
fn test_schema_mismatch_is_rejected() {
    let (_temp_dir, mut store) = create_test_store();
    store
        .initialize("http://example.com/root", &CanonicalSchema::default(), &groups(&["A"]))
        .unwrap();

    let other = CanonicalSchema::new(vec![Column::new("Name", &["Name"])]).unwrap();
    assert!(matches!(store.load(&other), Err(HarvestError::SchemaMismatch(_))));
}

#[test]
fn test_initialize_replaces_previous_run() {
    let (_temp_dir, mut store) = create_test_store();
    let schema = CanonicalSchema::default();
    store
        .initialize("http://example.com/old", &schema, &groups(&["A"]))
        .unwrap();
    store
        .commit_group(0, GroupStatus::Completed, None, &[record(&schema, "Acme")], &[])
        .unwrap();

    store
        .initialize("http://example.com/new", &schema, &groups(&["X", "Y"]))
        .unwrap();

    let checkpoint = store.load(&schema).unwrap();
    assert_eq!(checkpoint.root_url.as_deref(), Some("http://example.com/new"));
    assert_eq!(checkpoint.groups.len(), 2);
    assert!(checkpoint.records.is_empty());
}

// ============================================================================
// Status / Failure Tests
// ============================================================================

#[test]
fn test_status_counts_groups_and_failures() {
    let (_temp_dir, mut store) = create_test_store();
    let schema = CanonicalSchema::default();
    store
        .initialize("http://example.com/root", &schema, &groups(&["A", "B", "C"]))
        .unwrap();

    let skipped_item = SkippedUnit {
        kind: UnitKind::Item,
        label: "Broken Co".to_string(),
        url: "http://example.com/broken".to_string(),
        reason: "Table not found: no element matches 'table.infobox'".to_string(),
    };
    store
        .commit_group(
            0,
            GroupStatus::Completed,
            None,
            &[record(&schema, "Acme")],
            &[skipped_item.clone()],
        )
        .unwrap();

    let skipped_group = SkippedUnit {
        kind: UnitKind::Group,
        label: "B".to_string(),
        url: "http://example.com/B".to_string(),
        reason: "HTTP status 404".to_string(),
    };
    store
        .commit_group(1, GroupStatus::Failed, Some("HTTP status 404"), &[], &[skipped_group.clone()])
        .unwrap();

    let status = store.status().unwrap();
    assert_eq!(status.rows, 1);
    assert_eq!(status.columns.len(), 12);
    assert_eq!(status.completed, 1);
    assert_eq!(status.failed, 1);
    assert_eq!(status.pending, 1);
    assert_eq!(status.failures, vec![skipped_item, skipped_group]);
    assert!(status.created_at.is_some());
}

#[test]
fn test_reset_failed_requeues_groups() {
    let (_temp_dir, mut store) = create_test_store();
    let schema = CanonicalSchema::default();
    store
        .initialize("http://example.com/root", &schema, &groups(&["A", "B"]))
        .unwrap();
    store
        .commit_group(0, GroupStatus::Failed, Some("timeout"), &[], &[])
        .unwrap();
    store
        .commit_group(1, GroupStatus::Completed, None, &[], &[])
        .unwrap();

    assert_eq!(store.reset_failed().unwrap(), 1);

    let checkpoint = store.load(&schema).unwrap();
    let remaining: Vec<_> = checkpoint.remaining().map(|g| g.node.label.clone()).collect();
    assert_eq!(remaining, vec!["A".to_string()]);
    assert!(checkpoint.groups[0].reason.is_none());
}

#[test]
fn test_reset_failed_forgets_failures_of_requeued_groups() {
    let (_temp_dir, mut store) = create_test_store();
    let schema = CanonicalSchema::default();
    store
        .initialize("http://example.com/root", &schema, &groups(&["A", "B"]))
        .unwrap();

    let group_failure = SkippedUnit {
        kind: UnitKind::Group,
        label: "A".to_string(),
        url: "http://example.com/A".to_string(),
        reason: "HTTP status 503".to_string(),
    };
    let item_failure = SkippedUnit {
        kind: UnitKind::Item,
        label: "Broken Co".to_string(),
        url: "http://example.com/broken".to_string(),
        reason: "Table not found".to_string(),
    };
    store
        .commit_group(0, GroupStatus::Failed, Some("HTTP status 503"), &[], &[group_failure.clone()])
        .unwrap();
    store
        .commit_group(1, GroupStatus::Completed, None, &[], &[item_failure.clone()])
        .unwrap();

    store.reset_failed().unwrap();
    assert_eq!(store.status().unwrap().failures, vec![item_failure.clone()]);

    // Failing again records the failure once
    store
        .commit_group(0, GroupStatus::Failed, Some("HTTP status 503"), &[], &[group_failure.clone()])
        .unwrap();
    assert_eq!(store.status().unwrap().failures, vec![item_failure, group_failure]);
}
