pub mod accumulator;
pub mod config;
pub mod crawl;
pub mod data;
pub mod error;
pub mod model;
pub mod report;
pub mod site;

pub use accumulator::Accumulator;
pub use config::HarvestConfig;
pub use crawl::{HarvestProgressCallback, HarvestSummary, Harvester};
pub use data::{Checkpoint, CheckpointStatus, CheckpointStore};
pub use error::{HarvestError, Result};
pub use model::{CanonicalRecord, CanonicalSchema, Column, GroupNode, GroupStatus, MasterDataset};
pub use report::ReportFormat;
pub use site::{Site, SiteProfile};
