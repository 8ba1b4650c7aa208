//! Live dependency graph for hot-reload cascades
//!
//! Tracks which artifacts depend on which, detects dependency cycles, and
//! computes the order in which dependents must be reconsidered when an
//! artifact changes. The graph is the single shared structure of the reload
//! engine; see [`DependencyGraph`] for the locking discipline.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod graph;
mod node;

pub use graph::DependencyGraph;
pub use node::{
    CascadeOrder, CycleReport, EdgeDirection, GraphStats, IntegrityViolation, NodeView,
};
