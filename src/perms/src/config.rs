//! Engine configuration loading and validation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PermsError, Result};

/// Permission engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PermsConfig {
    /// Directory holding the data files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Seconds between autosave checks; 0 disables autosave
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,

    /// Skip autosave writes when nothing changed
    #[serde(default = "default_true")]
    pub skip_clean_saves: bool,

    /// Default log filter for the host binary
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_data_dir() -> PathBuf { PathBuf::from("simpleperms") }
fn default_autosave_interval() -> u64 { 300 }
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }

impl Default for PermsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            autosave_interval_secs: default_autosave_interval(),
            skip_clean_saves: default_true(),
            log_level: default_log_level(),
        }
    }
}

impl PermsConfig {
    /// Config rooted at `data_dir`, everything else default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PermsError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| PermsError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(PermsError::Config("data_dir must not be empty".to_string()));
        }
        if self.log_level.trim().is_empty() {
            return Err(PermsError::Config("log_level must not be empty".to_string()));
        }
        Ok(())
    }

    /// Get absolute data directory path
    pub fn data_dir(&self) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.data_dir)
        }
    }

    /// Autosave period, `None` when disabled
    pub fn autosave_interval(&self) -> Option<Duration> {
        match self.autosave_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
