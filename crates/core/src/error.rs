//! Error types for the reload engine
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Propagation policy: structural/graph errors are returned to the caller of
//! the mutating call and never abort unrelated cascades. Per-artifact
//! migration and build errors are contained to that artifact's branch of a
//! cascade and surfaced as outcome records, not as faults that unwind the
//! orchestrator.

use crate::version::SemVersion;
use std::io;
use thiserror::Error;

/// Result type alias for reload-engine operations
pub type Result<T> = std::result::Result<T, HotswapError>;

/// Error types for the reload engine
#[derive(Debug, Error)]
pub enum HotswapError {
    /// A bounded store (graph nodes, cascade queue) is full.
    /// Recoverable: the caller may grow the limit or reject the artifact.
    #[error("capacity exceeded: {what} limit of {limit} reached")]
    CapacityExceeded {
        /// Which bounded resource was exhausted
        what: &'static str,
        /// The configured bound
        limit: usize,
    },

    /// An unknown artifact, edge, or snapshot was referenced
    #[error("not found: {0}")]
    NotFound(String),

    /// The dependency relation contains a cycle; reload order is undefined
    #[error(
        "dependency cycle detected involving {involving}{}",
        if *.depth_exceeded { " (depth cutoff reached, conservatively treated as a cycle)" } else { "" }
    )]
    CycleDetected {
        /// An artifact participating in (or at the cutoff of) the cycle
        involving: String,
        /// True when the traversal hit the depth safety cutoff rather than
        /// an exact back-edge
        depth_exceeded: bool,
    },

    /// Asymmetric forward/reverse edges detected in the graph
    #[error("graph integrity violation: {0}")]
    IntegrityViolation(String),

    /// Version jump too large to migrate across
    #[error("breaking version change for {artifact}: {from} -> {to}")]
    CompatibilityBreaking {
        /// Artifact whose version jumped
        artifact: String,
        /// Currently loaded version
        from: SemVersion,
        /// Newly built version
        to: SemVersion,
    },

    /// Migration exhausted its retry budget and was rolled back
    #[error("migration failed for {artifact} after {attempts} attempt(s): {reason}")]
    MigrationFailed {
        /// Artifact that failed to migrate
        artifact: String,
        /// Attempts consumed, including the first try
        attempts: u32,
        /// Last failure reason observed
        reason: String,
    },

    /// The artifact builder reported a failure
    #[error("build failed: {0}")]
    BuildFailed(String),

    /// A migration is already in flight for this artifact
    #[error("artifact busy: migration already in flight for {0}")]
    Busy(String),

    /// The operation was cancelled or its deadline expired
    #[error("operation cancelled")]
    Cancelled,

    /// A rollback snapshot was pruned or never taken
    #[error("snapshot missing: {0}")]
    SnapshotMissing(String),

    /// Invalid argument or configuration value
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Snapshot encode/decode error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (config file, snapshot backing)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HotswapError {
    /// Convenience constructor for `InvalidInput`
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        HotswapError::InvalidInput(msg.into())
    }

    /// Convenience constructor for `NotFound`
    pub fn not_found(msg: impl Into<String>) -> Self {
        HotswapError::NotFound(msg.into())
    }
}

impl From<bincode::Error> for HotswapError {
    fn from(e: bincode::Error) -> Self {
        HotswapError::Serialization(e.to_string())
    }
}
