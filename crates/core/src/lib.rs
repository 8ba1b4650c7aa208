//! Core types and traits for the hotswap reload engine
//!
//! This crate defines the foundational types used throughout the system:
//! - `ArtifactPath`, `ArtifactKind`, `ContentHash`, `CascadeId`: artifact identity
//! - `SemVersion`, `VersionFlags`: semantic version value type
//! - `compat`: version transition classification
//! - `VersionRegistry`: registered version history per artifact family
//! - `HotswapError`: error type hierarchy
//! - `EngineLimits`: bounded-resource configuration
//! - Traits: collaborator seams (`ArtifactBuilder`, `SnapshotBacking`,
//!   `EventSink`, `MigrationTarget`)
//! - `CancelToken`/`Deadline`: cancellable waits
//! - `ReloadEvent`: outcome records for the event sink

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod compat;
pub mod error;
pub mod event;
pub mod limits;
pub mod registry;
pub mod traits;
pub mod types;
pub mod version;

// Re-export commonly used types at the crate root
pub use cancel::{CancelToken, Deadline};
pub use compat::{ApiRange, CompatReport, Compatibility, RecommendedActions};
pub use error::{HotswapError, Result};
pub use event::{CascadeStats, ReloadEvent, ReloadOutcome};
pub use limits::EngineLimits;
pub use registry::VersionRegistry;
pub use traits::{ArtifactBuilder, BuildFailure, BuildOutput, EventSink, MigrationTarget, SnapshotBacking};
pub use types::{ArtifactKind, ArtifactPath, CascadeId, ContentHash};
pub use version::{SemVersion, VersionFlags};
