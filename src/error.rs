//! Error types for the snapshot/restore engine.
//!
//! Reads are fail-fast: a [`BackupError::Transport`] or [`BackupError::Parse`]
//! aborts the whole snapshot. Restore treats every error as local to the
//! resource being written and keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while walking the API or replaying a snapshot.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The adapter call failed (network, TLS, non-success status).
    #[error("Transport error on {path}: {message}")]
    Transport { path: String, message: String },

    /// A response body matched neither the collection nor the resource shape.
    #[error("Unexpected response from {path}: {message}")]
    Parse { path: String, message: String },

    /// A created resource came back different from what was requested,
    /// or the target API answered with an error code.
    #[error("Could not restore {resource}: {message}")]
    ReplayMismatch { resource: String, message: String },

    /// The snapshot document could not be encoded or decoded.
    #[error("Snapshot document error: {0}")]
    Envelope(#[from] serde_json::Error),

    /// Reading or writing the snapshot file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    pub fn transport(path: &str, message: impl Into<String>) -> Self {
        BackupError::Transport {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn parse(path: &str, message: impl Into<String>) -> Self {
        BackupError::Parse {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn mismatch(resource: impl Into<String>, message: impl Into<String>) -> Self {
        BackupError::ReplayMismatch {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort a snapshot traversal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BackupError::ReplayMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
