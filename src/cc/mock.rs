//! # Mock adapter
//!
//! Scripted in-memory [`CcApi`]/[`CcWriteApi`] for exercising the engine
//! without a network.
//!
//! GET responses are looked up by exact path. Every call is counted so tests
//! can assert how often a path was fetched. Writes are recorded and answered
//! from a per-`(method, path)` script, falling back to a generic success body.
//!
//! # Example
//! ```ignore
//! let api = MockCcApi::new()
//!     .with_get("/v2/organizations", r#"{"total_results": 0, "resources": []}"#);
//! let envelope = snapshot(&api, &SnapshotConfig::default()).await?;
//! assert_eq!(api.calls("/v2/organizations"), 1);
//! ```

use super::{CcApi, CcWriteApi, WriteMethod};
use crate::error::{BackupError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// A write request seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub method: WriteMethod,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
pub struct MockCcApi {
    gets: HashMap<String, String>,
    writes: HashMap<(String, String), String>,
    calls: Mutex<HashMap<String, usize>>,
    recorded: Mutex<Vec<RecordedWrite>>,
}

impl MockCcApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_get(mut self, path: &str, body: impl Into<String>) -> Self {
        self.gets.insert(path.to_string(), body.into());
        self
    }

    pub fn with_get_json(self, path: &str, body: &Value) -> Self {
        self.with_get(path, body.to_string())
    }

    pub fn with_write(mut self, method: WriteMethod, path: &str, body: &Value) -> Self {
        self.writes
            .insert((method.to_string(), path.to_string()), body.to_string());
        self
    }

    /// Number of GETs issued for `path`
    pub fn calls(&self, path: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total number of GETs issued
    pub fn total_calls(&self) -> usize {
        self.calls.lock().map(|c| c.values().sum()).unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.recorded.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl CcApi for MockCcApi {
    async fn invoke_get(&self, path: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(path.to_string()).or_insert(0) += 1;
        }
        self.gets
            .get(path)
            .cloned()
            .ok_or_else(|| BackupError::transport(path, "CC URL not found"))
    }
}

impl CcWriteApi for MockCcApi {
    async fn invoke_write(
        &self,
        method: WriteMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String> {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(RecordedWrite {
                method,
                path: path.to_string(),
                body: body.cloned(),
            });
        }
        Ok(self
            .writes
            .get(&(method.to_string(), path.to_string()))
            .cloned()
            .unwrap_or_else(|| "{}".to_string()))
    }
}
