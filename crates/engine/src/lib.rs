//! Hotswap engine: reload orchestration over the dependency graph
//!
//! Ties the pieces together: the [`ReloadOrchestrator`] receives change
//! events, asks the dependency graph for the affected set and order, runs
//! each affected artifact through compatibility checking and migration, and
//! routes failures through the recovery policy. Configuration comes from
//! `hotswap.toml`.
//!
//! # Quick start
//!
//! ```ignore
//! use hotswap_engine::{ReloadOrchestrator, EngineConfig};
//! use hotswap_core::ArtifactPath;
//! use std::sync::Arc;
//!
//! let orchestrator = ReloadOrchestrator::builder(Arc::new(my_builder))
//!     .config(EngineConfig::load_or_create(data_dir)?)
//!     .build()?;
//!
//! let graph = orchestrator.graph();
//! graph.add_dependency(
//!     &ArtifactPath::new("mods/traffic.so"),
//!     &ArtifactPath::new("mods/pathfind.so"),
//!     true,
//! )?;
//!
//! let report = orchestrator.on_artifact_changed(&ArtifactPath::new("mods/pathfind.so"))?;
//! println!("{} affected, {} committed", report.stats.affected, report.stats.succeeded);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod inmemory;
mod orchestrator;

pub use config::{
    EngineConfig, MigrationSection, RecoverySection, RollbackSection, CONFIG_FILE_NAME,
};
pub use inmemory::{MemoryBacking, MemorySink, NullSink};
pub use orchestrator::{CascadeReport, OrchestratorBuilder, ReloadOrchestrator};
