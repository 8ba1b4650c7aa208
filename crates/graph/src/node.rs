//! Dependency graph node storage types
//!
//! Nodes live inside the graph's own storage and are addressed by small
//! integer handles; the public API deals exclusively in artifact paths.

use hotswap_core::{ArtifactKind, ArtifactPath, ContentHash, SemVersion};
use smallvec::SmallVec;
use std::fmt;

/// Index-based handle to a node inside the graph's storage.
///
/// Handles are never reused within a graph's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(pub(crate) u32);

/// Adjacency list; most artifacts have a handful of edges.
pub(crate) type EdgeList = SmallVec<[NodeId; 4]>;

/// One artifact in the dependency graph.
#[derive(Debug, Clone)]
pub(crate) struct DependencyNode {
    pub(crate) path: ArtifactPath,
    pub(crate) kind: ArtifactKind,
    pub(crate) content_hash: ContentHash,
    pub(crate) current_version: SemVersion,
    /// Artifacts this node depends on, in insertion order
    pub(crate) dependencies: EdgeList,
    /// Artifacts depending on this node, in insertion order
    pub(crate) dependents: EdgeList,
    pub(crate) needs_reload: bool,
    pub(crate) is_reloading: bool,
    pub(crate) reload_order: u32,
    pub(crate) is_critical: bool,
    /// False while the node exists only as an edge endpoint; true once the
    /// artifact itself has been registered
    pub(crate) resolved: bool,
}

impl DependencyNode {
    pub(crate) fn placeholder(path: ArtifactPath) -> Self {
        DependencyNode {
            path,
            kind: ArtifactKind::Unknown,
            content_hash: ContentHash::default(),
            current_version: SemVersion::new(0, 0, 0),
            dependencies: EdgeList::new(),
            dependents: EdgeList::new(),
            needs_reload: false,
            is_reloading: false,
            reload_order: 0,
            is_critical: false,
            resolved: false,
        }
    }
}

/// Read-only snapshot of a node's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    /// Artifact key
    pub path: ArtifactPath,
    /// Artifact kind, `Unknown` until registered
    pub kind: ArtifactKind,
    /// Current content hash
    pub content_hash: ContentHash,
    /// Currently loaded version
    pub current_version: SemVersion,
    /// Flagged for reload by a cascade
    pub needs_reload: bool,
    /// Currently being reloaded
    pub is_reloading: bool,
    /// Level assigned by the most recent cascade that touched this node
    pub reload_order: u32,
    /// A failure on this artifact halts a cascade
    pub is_critical: bool,
    /// Whether the artifact has been registered (vs. only referenced)
    pub resolved: bool,
    /// Number of artifacts this node depends on
    pub dependency_count: usize,
    /// Number of artifacts depending on this node
    pub dependent_count: usize,
}

impl From<&DependencyNode> for NodeView {
    fn from(node: &DependencyNode) -> Self {
        NodeView {
            path: node.path.clone(),
            kind: node.kind,
            content_hash: node.content_hash,
            current_version: node.current_version,
            needs_reload: node.needs_reload,
            is_reloading: node.is_reloading,
            reload_order: node.reload_order,
            is_critical: node.is_critical,
            resolved: node.resolved,
            dependency_count: node.dependencies.len(),
            dependent_count: node.dependents.len(),
        }
    }
}

/// Which direction of a bidirectional edge pair is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// `artifact` lists `counterpart` as a dependency, but the reverse
    /// dependent entry is missing
    Reverse,
    /// `artifact` lists `counterpart` as a dependent, but the forward
    /// dependency entry is missing
    Forward,
}

/// One asymmetric edge found by the integrity audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    /// Node holding the one-sided edge
    pub artifact: ArtifactPath,
    /// The other endpoint
    pub counterpart: ArtifactPath,
    /// Which direction is missing
    pub missing: EdgeDirection,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.missing {
            EdgeDirection::Reverse => write!(
                f,
                "missing reverse dependent edge: {} -> {}",
                self.artifact, self.counterpart
            ),
            EdgeDirection::Forward => write!(
                f,
                "missing forward dependency edge: {} -> {}",
                self.counterpart, self.artifact
            ),
        }
    }
}

/// Result of a cycle scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// An artifact on the detected cycle (or at the depth cutoff)
    pub involving: ArtifactPath,
    /// True when the scan hit the depth safety cutoff instead of an exact
    /// back-edge; deep-but-acyclic graphs are reported conservatively
    pub depth_exceeded: bool,
}

/// Reload set computed for one change event, in strict BFS level order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOrder {
    /// The changed artifact first, then dependents level by level
    pub paths: Vec<ArtifactPath>,
    /// True when `max_count` cut the list short
    pub truncated: bool,
}

impl CascadeOrder {
    /// Number of artifacts in the reload set
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the set is empty (never true for a successful computation)
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterate the reload set in order
    pub fn iter(&self) -> impl Iterator<Item = &ArtifactPath> {
        self.paths.iter()
    }
}

/// Counters describing the graph, for dashboards and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Nodes currently in the graph
    pub nodes: usize,
    /// Forward edges currently in the graph
    pub edges: usize,
    /// Cascade orders computed since construction
    pub cascades_triggered: u64,
    /// Whether the most recent cycle scan found a cycle
    pub has_circular: bool,
}
