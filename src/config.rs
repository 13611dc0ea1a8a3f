//! Configuration Management
//!
//! Handles persistent configuration storage for cfbackup.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Snapshot file name inside the backup directory
pub const BACKUP_FILE_NAME: &str = "cf-backup.json";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Last used API endpoint, consulted after flags, env and the cf CLI
    #[serde(default)]
    pub api: Option<String>,
    /// Directory holding the snapshot file
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    #[serde(default)]
    pub include_security_groups: bool,
    #[serde(default)]
    pub include_quota_definitions: bool,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cfbackup").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Snapshot file (CLI > `<backup dir>/cf-backup.json`)
    pub fn backup_file(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| {
            self.backup_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(BACKUP_FILE_NAME)
        })
    }

    /// Remember the endpoint and save
    pub fn set_api(&mut self, api: &str) -> Result<()> {
        if self.api.as_deref() == Some(api) {
            return Ok(());
        }
        self.api = Some(api.to_string());
        self.save()
    }
}
