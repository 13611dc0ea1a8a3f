//! Snapshot and restore
//!
//! # Module Structure
//!
//! - [`snapshot`] - Walks every root and builds the envelope
//! - [`envelope`] - The persisted document
//! - [`replay`] - Rebuilds a shared graph from a document
//! - [`plan`] - Dependency order for restore
//! - [`restore`] - Best-effort driver with guid substitution
//! - [`creator`] - HTTP implementation of [`ResourceCreator`]
//! - [`info`] - Outline of a snapshot

pub mod creator;
pub mod envelope;
pub mod info;
pub mod plan;
pub mod replay;
pub mod restore;
pub mod snapshot;

pub use creator::{check_result, CcCreator};
pub use envelope::{BackupEnvelope, FeatureFlag};
pub use info::summarize;
pub use plan::{ResourceKind, RestoreOptions, RestorePlan, RestoreStep};
pub use replay::Replay;
pub use restore::{restore, GuidMap, ResolvedEntity, ResourceCreator, RestoreReport};
pub use snapshot::{snapshot, RootSpec, SnapshotConfig};
