//! Snapshot and restore of a Cloud Foundry v2 metadata graph.

pub mod backup;
pub mod cc;
pub mod config;
pub mod error;
pub mod resource;

/// Version injected at compile time via CFBACKUP_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("CFBACKUP_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
