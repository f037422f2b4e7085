// Durable checkpoint store backed by SQLite

use crate::error::{HarvestError, Result};
use crate::model::{
    CanonicalRecord, CanonicalSchema, GroupEntry, GroupNode, GroupStatus, SkippedUnit, UnitKind,
};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

pub struct CheckpointStore {
    conn: Connection,
}

/// Everything a resumed run needs: the group list with statuses and the
/// rows committed so far, in append order.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub root_url: Option<String>,
    pub groups: Vec<GroupEntry>,
    pub records: Vec<CanonicalRecord>,
}

impl Checkpoint {
    pub fn is_initialized(&self) -> bool {
        !self.groups.is_empty()
    }

    pub fn remaining(&self) -> impl Iterator<Item = &GroupEntry> {
        self.groups
            .iter()
            .filter(|g| g.status == GroupStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointStatus {
    pub root_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub columns: Vec<String>,
    pub rows: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub failures: Vec<SkippedUnit>,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn corrupt(message: impl Into<String>) -> HarvestError {
    HarvestError::CorruptCheckpoint(message.into())
}

impl CheckpointStore {
    /// Remove a checkpoint file and its WAL side files.
    pub fn drop(path: &Path) -> io::Result<()> {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.as_os_str().to_owned();
            file.push(suffix);
            match fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = CheckpointStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Groups in root listing order
            CREATE TABLE IF NOT EXISTS groups (
                position INTEGER PRIMARY KEY,
                label TEXT NOT NULL,
                url TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('pending', 'completed', 'failed')),
                reason TEXT
            );

            -- Canonical rows in append order; values_json is a JSON array
            -- as wide as the schema stored in meta.columns
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL,
                values_json TEXT NOT NULL,
                FOREIGN KEY(position) REFERENCES groups(position)
            );

            -- Skipped units, keyed by the group whose commit recorded them
            CREATE TABLE IF NOT EXISTS failures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL,
                kind TEXT NOT NULL CHECK(kind IN ('group', 'item')),
                label TEXT NOT NULL,
                url TEXT NOT NULL,
                reason TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                FOREIGN KEY(position) REFERENCES groups(position)
            );

            CREATE INDEX IF NOT EXISTS idx_groups_status ON groups(status);
            ",
        )?;
        Ok(())
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn stored_columns(&self) -> Result<Option<Vec<String>>> {
        match self.meta("columns")? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Record the group list of a fresh run, every group pending.
    pub fn initialize(
        &mut self,
        root_url: &str,
        schema: &CanonicalSchema,
        groups: &[GroupNode],
    ) -> Result<()> {
        let columns = serde_json::to_string(&schema.names())?;
        let now = current_timestamp();

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM records", [])?;
        tx.execute("DELETE FROM failures", [])?;
        tx.execute("DELETE FROM groups", [])?;
        tx.execute("DELETE FROM meta", [])?;

        for (key, value) in [
            ("root_url", root_url),
            ("columns", columns.as_str()),
            ("created_at", now.as_str()),
            ("updated_at", now.as_str()),
        ] {
            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }

        for (position, group) in groups.iter().enumerate() {
            tx.execute(
                "INSERT INTO groups (position, label, url, status) VALUES (?1, ?2, ?3, ?4)",
                params![
                    position as i64,
                    &group.label,
                    &group.url,
                    GroupStatus::Pending.as_str()
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Read the checkpoint back. Rows are rebuilt against `schema`, which
    /// must match the columns the checkpoint was started with.
    pub fn load(&self, schema: &CanonicalSchema) -> Result<Checkpoint> {
        if let Some(columns) = self.stored_columns()?
            && columns != schema.names()
        {
            return Err(HarvestError::SchemaMismatch(format!(
                "checkpoint columns {:?} differ from configured columns {:?}",
                columns,
                schema.names()
            )));
        }

        let root_url = self.meta("root_url")?;

        let mut stmt = self.conn.prepare(
            "SELECT position, label, url, status, reason FROM groups ORDER BY position",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut groups = Vec::with_capacity(rows.len());
        for (position, label, url, status, reason) in rows {
            let status = GroupStatus::from_str(&status)
                .ok_or_else(|| corrupt(format!("unknown group status '{}'", status)))?;
            groups.push(GroupEntry {
                position: position as usize,
                node: GroupNode::new(label, url),
                status,
                reason,
            });
        }

        let mut stmt = self
            .conn
            .prepare("SELECT values_json FROM records ORDER BY id")?;
        let stored = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = Vec::with_capacity(stored.len());
        for json in stored {
            let values: Vec<Option<String>> = serde_json::from_str(&json)?;
            records.push(schema.record_from_values(values).map_err(corrupt)?);
        }

        Ok(Checkpoint {
            root_url,
            groups,
            records,
        })
    }

    /// Commit one group's outcome in a single transaction: its rows, its
    /// skipped units and its new status. Either all of it lands or none.
    pub fn commit_group(
        &mut self,
        position: usize,
        status: GroupStatus,
        reason: Option<&str>,
        rows: &[CanonicalRecord],
        failures: &[SkippedUnit],
    ) -> Result<()> {
        let now = current_timestamp();
        let tx = self.conn.transaction()?;

        {
            let mut insert_row =
                tx.prepare("INSERT INTO records (position, values_json) VALUES (?1, ?2)")?;
            for row in rows {
                let json = serde_json::to_string(row.values())?;
                insert_row.execute(params![position as i64, json])?;
            }

            let mut insert_failure = tx.prepare(
                "INSERT INTO failures (position, kind, label, url, reason, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for failure in failures {
                insert_failure.execute(params![
                    position as i64,
                    failure.kind.as_str(),
                    &failure.label,
                    &failure.url,
                    &failure.reason,
                    &now
                ])?;
            }
        }

        let updated = tx.execute(
            "UPDATE groups SET status = ?1, reason = ?2 WHERE position = ?3",
            params![status.as_str(), reason, position as i64],
        )?;
        if updated != 1 {
            return Err(corrupt(format!("no group at position {}", position)));
        }

        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('updated_at', ?1)",
            params![now],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Put failed groups back in the queue and forget their recorded
    /// failures. Returns how many were reset.
    pub fn reset_failed(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM failures
             WHERE position IN (SELECT position FROM groups WHERE status = 'failed')",
            [],
        )?;
        let reset = tx.execute(
            "UPDATE groups SET status = 'pending', reason = NULL WHERE status = 'failed'",
            [],
        )?;
        tx.commit()?;
        Ok(reset)
    }

    pub fn status(&self) -> Result<CheckpointStatus> {
        let mut status = CheckpointStatus {
            root_url: self.meta("root_url")?,
            created_at: self.meta("created_at")?,
            updated_at: self.meta("updated_at")?,
            columns: self.stored_columns()?.unwrap_or_default(),
            rows: 0,
            pending: 0,
            completed: 0,
            failed: 0,
            failures: Vec::new(),
        };

        let rows: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        status.rows = rows as usize;

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM groups GROUP BY status")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (group_status, count) in counts {
            match GroupStatus::from_str(&group_status) {
                Some(GroupStatus::Pending) => status.pending = count as usize,
                Some(GroupStatus::Completed) => status.completed = count as usize,
                Some(GroupStatus::Failed) => status.failed = count as usize,
                None => return Err(corrupt(format!("unknown group status '{}'", group_status))),
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT kind, label, url, reason FROM failures ORDER BY id")?;
        let failures = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (kind, label, url, reason) in failures {
            let kind = UnitKind::from_str(&kind)
                .ok_or_else(|| corrupt(format!("unknown unit kind '{}'", kind)))?;
            status.failures.push(SkippedUnit {
                kind,
                label,
                url,
                reason,
            });
        }

        Ok(status)
    }
}
