//! Capacity limits for the reload engine
//!
//! Bounded resources are explicit: graph node capacity, traversal depth,
//! cascade queue length, and history depths. Exceeding a bound returns
//! `CapacityExceeded` rather than silently truncating.

/// Engine-wide capacity limits.
#[derive(Debug, Clone)]
pub struct EngineLimits {
    /// Maximum number of dependency graph nodes (default: 4096)
    pub max_nodes: usize,

    /// Traversal depth safety cutoff for cycle detection (default: 16).
    /// Paths deeper than this are conservatively reported as cycles with a
    /// distinct diagnostic.
    pub max_depth: usize,

    /// Maximum cascade BFS frontier size (default: 1024). Overflow is
    /// surfaced as `CapacityExceeded`, never silently dropped.
    pub max_cascade_queue: usize,

    /// Rollback snapshots retained per artifact (default: 8)
    pub rollback_history: usize,

    /// Registered versions retained per artifact family (default: 128)
    pub version_history: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        EngineLimits {
            max_nodes: 4096,
            max_depth: 16,
            max_cascade_queue: 1024,
            rollback_history: 8,
            version_history: 128,
        }
    }
}

impl EngineLimits {
    /// Limits small enough to exercise every bound from a unit test
    pub fn with_small_limits() -> Self {
        EngineLimits {
            max_nodes: 8,
            max_depth: 4,
            max_cascade_queue: 4,
            rollback_history: 2,
            version_history: 3,
        }
    }
}
