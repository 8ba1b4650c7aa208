//! Hotswap: dependency and version consistency engine for hot-module reload
//!
//! When a source artifact changes, hotswap determines which dependent
//! artifacts must be rebuilt and reloaded, in what order, whether each new
//! version is safe to adopt in place of the running one, and how to recover
//! (retry, fallback, or rollback) when a reload attempt fails.
//!
//! # Quick start
//!
//! ```ignore
//! use hotswap::{ArtifactPath, EngineConfig, ReloadOrchestrator};
//! use std::sync::Arc;
//!
//! // `builder` is your compiler integration implementing ArtifactBuilder
//! let engine = ReloadOrchestrator::builder(Arc::new(builder))
//!     .config(EngineConfig::load_or_create(data_dir)?)
//!     .build()?;
//!
//! engine.graph().add_dependency(
//!     &ArtifactPath::new("shaders/water.metal"),
//!     &ArtifactPath::new("shaders/common.metal"),
//!     false,
//! )?;
//!
//! // Wire your file watcher to this entry point
//! let report = engine.on_artifact_changed(&ArtifactPath::new("shaders/common.metal"))?;
//! ```
//!
//! # Architecture
//!
//! The engine is an explicitly constructed instance, with no process-wide
//! registries. A change event flows through the [`DependencyGraph`] to
//! produce a reload set, each member is version-checked and migrated by the
//! migration controller (snapshotting through the rollback store first), and
//! failures are classified and handled by the recovery policy. Outcome
//! records are published to the configured event sink.

// Re-export the public API
pub use hotswap_core::{
    compat, ApiRange, ArtifactBuilder, ArtifactKind, ArtifactPath, BuildFailure, BuildOutput,
    CancelToken, CascadeId, CascadeStats, CompatReport, Compatibility, ContentHash, Deadline,
    EngineLimits, EventSink, HotswapError, MigrationTarget, RecommendedActions, ReloadEvent,
    ReloadOutcome, Result, SemVersion, SnapshotBacking, VersionFlags, VersionRegistry,
};
pub use hotswap_engine::{
    CascadeReport, EngineConfig, MemoryBacking, MemorySink, NullSink, OrchestratorBuilder,
    ReloadOrchestrator, CONFIG_FILE_NAME,
};
pub use hotswap_graph::{
    CascadeOrder, CycleReport, DependencyGraph, GraphStats, IntegrityViolation, NodeView,
};
pub use hotswap_migrate::{
    MigrationConfig, MigrationController, MigrationState, MigrationStrategy, RollbackStore,
    SnapshotHandle,
};
pub use hotswap_recovery::{
    BuildDiagnostic, DiagnosticParser, RecoveryConfig, RecoveryOutcome, RecoveryPolicy,
    RecoveryStats, RecoveryStrategy, Severity,
};
