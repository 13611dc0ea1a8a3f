//! Snapshot document

use crate::error::{BackupError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Top-level persisted snapshot
///
/// Each field holds a serialized resource tree; missing keys read as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupEnvelope {
    #[serde(default)]
    pub org_quota_definitions: Value,
    #[serde(default)]
    pub organizations: Value,
    #[serde(default)]
    pub shared_domains: Value,
    #[serde(default)]
    pub security_groups: Value,
    #[serde(default)]
    pub feature_flags: Value,
}

/// Feature flag as listed by `/v2/config/feature_flags`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub url: String,
    /// Keys not modelled above, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BackupEnvelope {
    /// Indented JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn feature_flags(&self) -> Result<Vec<FeatureFlag>> {
        if self.feature_flags.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(self.feature_flags.clone())?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| BackupError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| BackupError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = std::fs::read(path).map_err(|source| BackupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }
}
