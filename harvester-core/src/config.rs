//! Run configuration: defaults, an optional JSON file, then CLI overrides.

use crate::error::{HarvestError, Result};
use crate::model::{CanonicalSchema, Column, default_columns};
use crate::site::{Site, SiteProfile};
use harvester_scanner::FetchPolicy;
use harvester_scanner::fetcher::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_DELAY, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ROOT_URL: &str =
    "https://en.wikipedia.org/wiki/Category:Lists_of_companies_by_country";
pub const DEFAULT_CHECKPOINT_PATH: &str = "~/.config/harvester/harvest.db";
pub const DEFAULT_LOG_FILE_NAME: &str = "harvester.log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub root_url: String,
    pub user_agent: String,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub checkpoint_path: String,
    /// Defaults to `harvester.log` beside the checkpoint.
    pub log_file: Option<String>,
    pub site: SiteProfile,
    pub schema: Vec<Column>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            root_url: DEFAULT_ROOT_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_delay_ms: DEFAULT_REQUEST_DELAY.as_millis() as u64,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            checkpoint_path: DEFAULT_CHECKPOINT_PATH.to_string(),
            log_file: None,
            site: SiteProfile::default(),
            schema: default_columns(),
        }
    }
}

impl HarvestConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: HarvestConfig = serde_json::from_str(&content).map_err(|e| {
            HarvestError::Config(format!("{}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.root_url.trim().is_empty() {
            return Err(HarvestError::Config("root_url is empty".to_string()));
        }
        url::Url::parse(self.root_url.trim())
            .map_err(|e| HarvestError::Config(format!("root_url '{}': {}", self.root_url, e)))?;
        if self.max_attempts == 0 {
            return Err(HarvestError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(HarvestError::Config(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        self.canonical_schema()?;
        Site::from_profile(self.site.clone())?;
        Ok(())
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            user_agent: self.user_agent.clone(),
            request_delay: Duration::from_millis(self.request_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
        }
    }

    pub fn canonical_schema(&self) -> Result<CanonicalSchema> {
        CanonicalSchema::new(self.schema.clone()).map_err(HarvestError::Config)
    }

    pub fn site(&self) -> Result<Site> {
        Site::from_profile(self.site.clone())
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        expand(&self.checkpoint_path)
    }

    pub fn log_file_path(&self) -> PathBuf {
        match &self.log_file {
            Some(path) => expand(path),
            None => {
                let checkpoint = self.checkpoint_path();
                match checkpoint.parent() {
                    Some(dir) => dir.join(DEFAULT_LOG_FILE_NAME),
                    None => PathBuf::from(DEFAULT_LOG_FILE_NAME),
                }
            }
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarvestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_delay_ms, 3000);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.canonical_schema().unwrap().width(), 12);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"request_delay_ms": 500, "site": {{"items_marker": "Major firms"}}}}"#
        )
        .unwrap();

        let config = HarvestConfig::load(file.path()).unwrap();
        assert_eq!(config.request_delay_ms, 500);
        assert_eq!(config.site.items_marker, "Major firms");
        assert_eq!(config.site.group_list_index, 1);
        assert_eq!(config.root_url, DEFAULT_ROOT_URL);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            HarvestConfig::load(file.path()),
            Err(HarvestError::Config(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let config = HarvestConfig {
            max_attempts: 0,
            ..HarvestConfig::default()
        };
        assert!(matches!(config.validate(), Err(HarvestError::Config(_))));
    }

    #[test]
    fn test_validation_rejects_bad_regex() {
        let mut config = HarvestConfig::default();
        config.site.group_name_pattern = "[unclosed".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_file_defaults_beside_checkpoint() {
        let config = HarvestConfig {
            checkpoint_path: "/tmp/harvest/run.db".to_string(),
            ..HarvestConfig::default()
        };
        assert_eq!(config.log_file_path(), PathBuf::from("/tmp/harvest/harvester.log"));
    }
}
