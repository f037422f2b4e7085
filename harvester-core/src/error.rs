use harvester_scanner::TransportError;
use thiserror::Error;

/// Failures that end a run. Per-group and per-item failures never surface
/// here; they are logged and recorded as skipped units instead.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Root page failed: {0}")]
    Root(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] rusqlite::Error),

    #[error("Corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
