//! Live dependency graph
//!
//! Owns every node and edge behind a single `parking_lot::RwLock`. Any
//! operation that both reads and could write (the common case: the cascade
//! computation marks reload flags while traversing) takes the write lock, so
//! traversals always observe a consistent graph; a scan never interleaves
//! with an edge mutation.
//!
//! Invariants:
//! - Edges are bidirectional: if A depends on B then B's dependents contain
//!   A. `validate_integrity` audits this without mutating.
//! - The dependency relation is acyclic. Callers re-check after structural
//!   edits via `find_cycle`, which is exact (visited-set DFS); the depth
//!   bound is only a safety cutoff reported with a distinct flag.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

use hotswap_core::{
    ArtifactKind, ArtifactPath, ContentHash, EngineLimits, HotswapError, Result, SemVersion,
};

use crate::node::{
    CascadeOrder, CycleReport, DependencyNode, EdgeDirection, GraphStats, IntegrityViolation,
    NodeId, NodeView,
};

struct GraphInner {
    nodes: FxHashMap<NodeId, DependencyNode>,
    by_path: FxHashMap<ArtifactPath, NodeId>,
    next_id: u32,
    cascades_triggered: u64,
}

impl GraphInner {
    /// Node ids in creation order, for deterministic whole-graph scans
    fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Exact DFS cycle scan with a depth safety cutoff.
    fn scan_cycle(&self, max_depth: usize) -> Option<CycleReport> {
        let mut done: FxHashSet<NodeId> = FxHashSet::default();
        for start in self.sorted_ids() {
            if done.contains(&start) {
                continue;
            }
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
            let mut on_path: FxHashSet<NodeId> = FxHashSet::default();
            on_path.insert(start);
            while let Some(frame) = stack.last_mut() {
                let id = frame.0;
                let child_idx = frame.1;
                let next = self
                    .nodes
                    .get(&id)
                    .and_then(|n| n.dependencies.get(child_idx).copied());
                match next {
                    Some(next) => {
                        frame.1 += 1;
                        if on_path.contains(&next) {
                            return Some(CycleReport {
                                involving: self.path_of(next),
                                depth_exceeded: false,
                            });
                        }
                        if done.contains(&next) {
                            continue;
                        }
                        if stack.len() >= max_depth {
                            return Some(CycleReport {
                                involving: self.path_of(next),
                                depth_exceeded: true,
                            });
                        }
                        stack.push((next, 0));
                        on_path.insert(next);
                    }
                    None => {
                        on_path.remove(&id);
                        done.insert(id);
                        stack.pop();
                    }
                }
            }
        }
        None
    }

    fn path_of(&self, id: NodeId) -> ArtifactPath {
        self.nodes
            .get(&id)
            .map(|n| n.path.clone())
            .unwrap_or_else(|| ArtifactPath::new("<unknown>"))
    }
}

/// The shared dependency graph.
///
/// Thread-safe through a graph-wide `RwLock`; per-node locking is not
/// needed for correctness and is not attempted.
pub struct DependencyGraph {
    inner: RwLock<GraphInner>,
    limits: EngineLimits,
    /// Result of the most recent cycle scan, for `stats`
    circular: AtomicBool,
}

impl DependencyGraph {
    /// Create an empty graph bounded by `limits`
    pub fn new(limits: EngineLimits) -> Self {
        DependencyGraph {
            inner: RwLock::new(GraphInner {
                nodes: FxHashMap::default(),
                by_path: FxHashMap::default(),
                next_id: 0,
                cascades_triggered: 0,
            }),
            limits,
            circular: AtomicBool::new(false),
        }
    }

    fn ensure_node(&self, inner: &mut GraphInner, path: &ArtifactPath) -> Result<NodeId> {
        if let Some(id) = inner.by_path.get(path) {
            return Ok(*id);
        }
        if inner.nodes.len() >= self.limits.max_nodes {
            return Err(HotswapError::CapacityExceeded {
                what: "graph nodes",
                limit: self.limits.max_nodes,
            });
        }
        let id = NodeId(inner.next_id);
        inner.next_id += 1;
        inner.nodes.insert(id, DependencyNode::placeholder(path.clone()));
        inner.by_path.insert(path.clone(), id);
        debug!(target: "hotswap::graph", artifact = %path, "created node");
        Ok(id)
    }

    /// Ensure a node exists for `path`, creating an unresolved placeholder
    /// if needed.
    pub fn touch(&self, path: &ArtifactPath) -> Result<()> {
        let mut inner = self.inner.write();
        self.ensure_node(&mut inner, path).map(|_| ())
    }

    /// Whether a node exists for `path`
    pub fn contains(&self, path: &ArtifactPath) -> bool {
        self.inner.read().by_path.contains_key(path)
    }

    /// Record that `artifact` depends on `depends_on`.
    ///
    /// Missing nodes are created implicitly; re-adding an existing edge is a
    /// no-op. Both edge directions are added together or not at all: the
    /// capacity check happens before any node is created.
    pub fn add_dependency(
        &self,
        artifact: &ArtifactPath,
        depends_on: &ArtifactPath,
        is_critical: bool,
    ) -> Result<()> {
        if artifact == depends_on {
            return Err(HotswapError::invalid_input(format!(
                "artifact {} cannot depend on itself",
                artifact
            )));
        }
        let mut inner = self.inner.write();

        let missing = [artifact, depends_on]
            .iter()
            .filter(|p| !inner.by_path.contains_key(**p))
            .count();
        if inner.nodes.len() + missing > self.limits.max_nodes {
            return Err(HotswapError::CapacityExceeded {
                what: "graph nodes",
                limit: self.limits.max_nodes,
            });
        }

        let artifact_id = self.ensure_node(&mut inner, artifact)?;
        let dep_id = self.ensure_node(&mut inner, depends_on)?;

        let already = inner
            .nodes
            .get(&artifact_id)
            .is_some_and(|n| n.dependencies.contains(&dep_id));
        if already {
            return Ok(());
        }

        if let Some(node) = inner.nodes.get_mut(&artifact_id) {
            node.dependencies.push(dep_id);
        }
        if let Some(dep) = inner.nodes.get_mut(&dep_id) {
            dep.dependents.push(artifact_id);
            if is_critical {
                dep.is_critical = true;
            }
        }
        debug!(
            target: "hotswap::graph",
            artifact = %artifact,
            depends_on = %depends_on,
            is_critical,
            "added dependency"
        );
        Ok(())
    }

    /// Remove the `artifact -> depends_on` edge, symmetrically.
    pub fn remove_dependency(
        &self,
        artifact: &ArtifactPath,
        depends_on: &ArtifactPath,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let artifact_id = *inner
            .by_path
            .get(artifact)
            .ok_or_else(|| HotswapError::not_found(format!("artifact '{}'", artifact)))?;
        let dep_id = *inner
            .by_path
            .get(depends_on)
            .ok_or_else(|| HotswapError::not_found(format!("artifact '{}'", depends_on)))?;

        let forward_pos = inner
            .nodes
            .get(&artifact_id)
            .and_then(|n| n.dependencies.iter().position(|d| *d == dep_id));
        let Some(forward_pos) = forward_pos else {
            return Err(HotswapError::not_found(format!(
                "dependency {} -> {}",
                artifact, depends_on
            )));
        };

        if let Some(node) = inner.nodes.get_mut(&artifact_id) {
            node.dependencies.remove(forward_pos);
        }
        if let Some(dep) = inner.nodes.get_mut(&dep_id) {
            if let Some(pos) = dep.dependents.iter().position(|d| *d == artifact_id) {
                dep.dependents.remove(pos);
            }
        }
        debug!(
            target: "hotswap::graph",
            artifact = %artifact,
            depends_on = %depends_on,
            "removed dependency"
        );
        Ok(())
    }

    /// Register (or re-register) the artifact behind a node, resolving it.
    pub fn register_artifact(
        &self,
        path: &ArtifactPath,
        kind: ArtifactKind,
        version: SemVersion,
        content_hash: ContentHash,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let id = self.ensure_node(&mut inner, path)?;
        if let Some(node) = inner.nodes.get_mut(&id) {
            node.kind = kind;
            node.current_version = version;
            node.content_hash = content_hash;
            node.resolved = true;
        }
        info!(target: "hotswap::graph", artifact = %path, %version, "registered artifact");
        Ok(())
    }

    /// Remove a node entirely. Only permitted when nothing depends on it.
    pub fn unregister_artifact(&self, path: &ArtifactPath) -> Result<()> {
        let mut inner = self.inner.write();
        let id = *inner
            .by_path
            .get(path)
            .ok_or_else(|| HotswapError::not_found(format!("artifact '{}'", path)))?;
        let dependents = inner
            .nodes
            .get(&id)
            .map(|n| n.dependents.len())
            .unwrap_or(0);
        if dependents > 0 {
            return Err(HotswapError::invalid_input(format!(
                "cannot unregister {}: {} artifact(s) still depend on it",
                path, dependents
            )));
        }
        let dependencies = inner
            .nodes
            .get(&id)
            .map(|n| n.dependencies.clone())
            .unwrap_or_default();
        for dep_id in dependencies {
            if let Some(dep) = inner.nodes.get_mut(&dep_id) {
                if let Some(pos) = dep.dependents.iter().position(|d| *d == id) {
                    dep.dependents.remove(pos);
                }
            }
        }
        inner.nodes.remove(&id);
        inner.by_path.remove(path);
        info!(target: "hotswap::graph", artifact = %path, "unregistered artifact");
        Ok(())
    }

    /// Exact cycle scan over the whole graph.
    ///
    /// Returns `None` for an acyclic graph. A report with `depth_exceeded`
    /// set means the scan hit the depth safety cutoff and is conservative.
    pub fn find_cycle(&self) -> Option<CycleReport> {
        let inner = self.inner.read();
        let report = inner.scan_cycle(self.limits.max_depth);
        self.circular.store(report.is_some(), Ordering::Relaxed);
        report
    }

    /// Whether the graph currently contains a cycle (or exceeds the depth
    /// cutoff). O(V+E); callers should re-check after structural edits, not
    /// on every query.
    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Compute the reload set for a change to `changed`, in BFS level order
    /// over the dependents relation.
    ///
    /// The changed artifact is always first. Nodes in the returned prefix
    /// are flagged `needs_reload` with their level recorded; a frontier
    /// larger than the configured cascade queue bound is surfaced as
    /// `CapacityExceeded` with no flags applied.
    pub fn compute_cascade_order(
        &self,
        changed: &ArtifactPath,
        max_count: usize,
    ) -> Result<CascadeOrder> {
        if max_count == 0 {
            return Err(HotswapError::invalid_input(
                "cascade max_count must be at least 1",
            ));
        }
        let mut inner = self.inner.write();
        let changed_id = *inner
            .by_path
            .get(changed)
            .ok_or_else(|| HotswapError::not_found(format!("artifact '{}'", changed)))?;

        // Traverse into local buffers first so an overflow leaves no flags
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        visited.insert(changed_id);
        let mut queue: VecDeque<(NodeId, u32)> = VecDeque::new();
        queue.push_back((changed_id, 0));
        let mut enqueued = 1usize;
        let mut ordered: Vec<(NodeId, u32)> = Vec::new();

        while let Some((id, level)) = queue.pop_front() {
            ordered.push((id, level));
            let dependents = inner
                .nodes
                .get(&id)
                .map(|n| n.dependents.clone())
                .unwrap_or_default();
            for dep in dependents {
                if visited.insert(dep) {
                    if enqueued >= self.limits.max_cascade_queue {
                        return Err(HotswapError::CapacityExceeded {
                            what: "cascade queue",
                            limit: self.limits.max_cascade_queue,
                        });
                    }
                    queue.push_back((dep, level + 1));
                    enqueued += 1;
                }
            }
        }

        let truncated = ordered.len() > max_count;
        ordered.truncate(max_count);

        let mut paths = Vec::with_capacity(ordered.len());
        for (id, level) in &ordered {
            if let Some(node) = inner.nodes.get_mut(id) {
                node.needs_reload = true;
                node.reload_order = *level;
                paths.push(node.path.clone());
            }
        }
        inner.cascades_triggered += 1;
        debug!(
            target: "hotswap::graph",
            changed = %changed,
            affected = paths.len(),
            truncated,
            "computed cascade order"
        );
        Ok(CascadeOrder { paths, truncated })
    }

    /// Audit the bidirectional-edge invariant without mutating.
    ///
    /// An empty result means the graph is consistent. Violations indicate a
    /// bug in the graph itself and are logged loudly.
    pub fn validate_integrity(&self) -> Vec<IntegrityViolation> {
        let inner = self.inner.read();
        let mut violations = Vec::new();
        for id in inner.sorted_ids() {
            let Some(node) = inner.nodes.get(&id) else {
                continue;
            };
            for dep_id in &node.dependencies {
                let has_reverse = inner
                    .nodes
                    .get(dep_id)
                    .is_some_and(|d| d.dependents.contains(&id));
                if !has_reverse {
                    violations.push(IntegrityViolation {
                        artifact: node.path.clone(),
                        counterpart: inner.path_of(*dep_id),
                        missing: EdgeDirection::Reverse,
                    });
                }
            }
            for dependent_id in &node.dependents {
                let has_forward = inner
                    .nodes
                    .get(dependent_id)
                    .is_some_and(|d| d.dependencies.contains(&id));
                if !has_forward {
                    violations.push(IntegrityViolation {
                        artifact: node.path.clone(),
                        counterpart: inner.path_of(*dependent_id),
                        missing: EdgeDirection::Forward,
                    });
                }
            }
        }
        if !violations.is_empty() {
            error!(
                target: "hotswap::graph",
                count = violations.len(),
                "graph integrity violations detected"
            );
        }
        violations
    }

    /// Snapshot a node's metadata
    pub fn node(&self, path: &ArtifactPath) -> Option<NodeView> {
        let inner = self.inner.read();
        inner
            .by_path
            .get(path)
            .and_then(|id| inner.nodes.get(id))
            .map(NodeView::from)
    }

    /// Flag or unflag a node as currently reloading
    pub fn set_reloading(&self, path: &ArtifactPath, reloading: bool) -> Result<()> {
        let mut inner = self.inner.write();
        let id = *inner
            .by_path
            .get(path)
            .ok_or_else(|| HotswapError::not_found(format!("artifact '{}'", path)))?;
        if let Some(node) = inner.nodes.get_mut(&id) {
            node.is_reloading = reloading;
        }
        Ok(())
    }

    /// Record a committed version swap: updates version and hash, clears
    /// the reload flags.
    pub fn commit_version(
        &self,
        path: &ArtifactPath,
        version: SemVersion,
        content_hash: ContentHash,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let id = *inner
            .by_path
            .get(path)
            .ok_or_else(|| HotswapError::not_found(format!("artifact '{}'", path)))?;
        if let Some(node) = inner.nodes.get_mut(&id) {
            node.current_version = version;
            node.content_hash = content_hash;
            node.resolved = true;
            node.needs_reload = false;
            node.is_reloading = false;
        }
        Ok(())
    }

    /// Clear the reload flags on a node without changing its version
    pub fn mark_reloaded(&self, path: &ArtifactPath) -> Result<()> {
        let mut inner = self.inner.write();
        let id = *inner
            .by_path
            .get(path)
            .ok_or_else(|| HotswapError::not_found(format!("artifact '{}'", path)))?;
        if let Some(node) = inner.nodes.get_mut(&id) {
            node.needs_reload = false;
            node.is_reloading = false;
        }
        Ok(())
    }

    /// Graph counters for dashboards and tests
    pub fn stats(&self) -> GraphStats {
        let inner = self.inner.read();
        GraphStats {
            nodes: inner.nodes.len(),
            edges: inner.nodes.values().map(|n| n.dependencies.len()).sum(),
            cascades_triggered: inner.cascades_triggered,
            has_circular: self.circular.load(Ordering::Relaxed),
        }
    }

    /// Drop one reverse edge, breaking the bidirectional invariant, so the
    /// integrity audit has something to find.
    #[cfg(test)]
    pub(crate) fn corrupt_drop_reverse_edge(
        &self,
        artifact: &ArtifactPath,
        depends_on: &ArtifactPath,
    ) {
        let mut inner = self.inner.write();
        let artifact_id = *inner.by_path.get(artifact).unwrap();
        let dep_id = *inner.by_path.get(depends_on).unwrap();
        if let Some(dep) = inner.nodes.get_mut(&dep_id) {
            dep.dependents.retain(|d| *d != artifact_id);
        }
    }
}
