//! Reload orchestration
//!
//! The entry point of the engine. A change event flows through the
//! dependency graph to produce an ordered reload set; each member is
//! rebuilt, compatibility-checked, and migrated in turn; failures anywhere
//! in the chain go through the recovery policy. Outcome records are
//! published per artifact, plus aggregate cascade statistics.
//!
//! Ordering guarantee: artifacts are processed strictly in the BFS level
//! order computed by the graph; no artifact is swapped in before every
//! artifact at a lower level has reached a terminal state.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use hotswap_core::{
    compat, ArtifactBuilder, ArtifactPath, BuildOutput, CancelToken, CascadeId, CascadeStats,
    Compatibility, Deadline, EventSink, HotswapError, MigrationTarget, ReloadEvent, ReloadOutcome,
    Result, SemVersion, SnapshotBacking, VersionRegistry,
};
use hotswap_graph::{DependencyGraph, GraphStats};
use hotswap_migrate::{MigrationConfig, MigrationController, RollbackStore};
use hotswap_recovery::{RecoveryOutcome, RecoveryPolicy, RecoveryStats};

use crate::config::EngineConfig;
use crate::inmemory::NullSink;

/// What one cascade did, artifact by artifact.
#[derive(Debug, Clone)]
pub struct CascadeReport {
    /// Identifier shared by every event this cascade emitted
    pub cascade_id: CascadeId,
    /// Per-artifact outcomes in processing order
    pub outcomes: Vec<(ArtifactPath, ReloadOutcome)>,
    /// Aggregate counts
    pub stats: CascadeStats,
    /// True when a breaking version jump (or `max_count`) cut the chain
    pub truncated: bool,
    /// True when a critical failure or cancellation stopped processing
    pub halted: bool,
}

/// The live, loaded state of one artifact as the engine sees it
struct LoadedState {
    version: SemVersion,
    payload: Vec<u8>,
}

/// Migration target that swaps the freshly built binary over the loaded
/// state. Mutations stay local until the orchestrator writes them back
/// after a committed migration.
struct SwapTarget {
    version: SemVersion,
    payload: Vec<u8>,
    incoming: Vec<u8>,
}

impl MigrationTarget for SwapTarget {
    fn version(&self) -> SemVersion {
        self.version
    }

    fn snapshot_state(&self) -> Vec<u8> {
        self.payload.clone()
    }

    fn apply(&mut self, to: SemVersion, token: &CancelToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(HotswapError::Cancelled);
        }
        self.payload = self.incoming.clone();
        self.version = to;
        Ok(())
    }

    fn restore(&mut self, version: SemVersion, state: &[u8]) -> Result<()> {
        self.version = version;
        self.payload = state.to_vec();
        Ok(())
    }
}

struct ProcessResult {
    outcome: ReloadOutcome,
    version: Option<SemVersion>,
    /// Stop the cascade (critical failure or cancellation)
    halt: bool,
    /// Breaking version jump: leave the rest of the chain stale
    truncate: bool,
}

/// Constructs a [`ReloadOrchestrator`] with explicit collaborators.
pub struct OrchestratorBuilder {
    config: EngineConfig,
    artifact_builder: Arc<dyn ArtifactBuilder>,
    sink: Arc<dyn EventSink>,
    backing: Option<Arc<dyn SnapshotBacking>>,
}

impl OrchestratorBuilder {
    /// Start building an orchestrator around an artifact builder
    pub fn new(artifact_builder: Arc<dyn ArtifactBuilder>) -> Self {
        OrchestratorBuilder {
            config: EngineConfig::default(),
            artifact_builder,
            sink: Arc::new(NullSink),
            backing: None,
        }
    }

    /// Use this configuration instead of the defaults
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish outcome records to this sink
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Write rollback snapshots through to this backing
    pub fn snapshot_backing(mut self, backing: Arc<dyn SnapshotBacking>) -> Self {
        self.backing = Some(backing);
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid (e.g. an unknown
    /// migration strategy string).
    pub fn build(self) -> Result<ReloadOrchestrator> {
        let migration = self.config.migration_config()?;
        let limits = self.config.limits();
        let store = match self.backing {
            Some(backing) => RollbackStore::with_backing(limits.rollback_history, backing),
            None => RollbackStore::new(limits.rollback_history),
        };
        Ok(ReloadOrchestrator {
            graph: Arc::new(DependencyGraph::new(limits.clone())),
            registry: Arc::new(VersionRegistry::new(limits.version_history)),
            controller: MigrationController::new(Arc::new(store)),
            policy: RecoveryPolicy::new(self.config.recovery_config()),
            builder: self.artifact_builder,
            sink: self.sink,
            loaded: DashMap::new(),
            migration,
            config: self.config,
        })
    }
}

/// Coordinates graph traversal, version checking, migration, and recovery
/// for change events.
///
/// One change event is processed end-to-end by the calling thread; change
/// events on disjoint graph regions may be processed concurrently from
/// multiple threads, serialized per artifact by the migration controller.
pub struct ReloadOrchestrator {
    config: EngineConfig,
    migration: MigrationConfig,
    graph: Arc<DependencyGraph>,
    registry: Arc<VersionRegistry>,
    controller: MigrationController,
    policy: RecoveryPolicy,
    builder: Arc<dyn ArtifactBuilder>,
    sink: Arc<dyn EventSink>,
    loaded: DashMap<ArtifactPath, LoadedState>,
}

impl ReloadOrchestrator {
    /// Builder entry point
    pub fn builder(artifact_builder: Arc<dyn ArtifactBuilder>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(artifact_builder)
    }

    /// The shared dependency graph (declare dependencies through this)
    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    /// The version registry fed by committed reloads
    pub fn registry(&self) -> &Arc<VersionRegistry> {
        &self.registry
    }

    /// The recovery policy (breaker reset, disabled-artifact queries)
    pub fn recovery(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// The rollback snapshot store
    pub fn rollback_store(&self) -> &Arc<RollbackStore> {
        self.controller.store()
    }

    /// Graph counters
    pub fn graph_stats(&self) -> GraphStats {
        self.graph.stats()
    }

    /// Recovery counters
    pub fn recovery_stats(&self) -> RecoveryStats {
        self.policy.stats()
    }

    /// Process a change event with no overall deadline.
    pub fn on_artifact_changed(&self, path: &ArtifactPath) -> Result<CascadeReport> {
        self.on_artifact_changed_with(path, Deadline::never(), &CancelToken::new())
    }

    /// Process a change event under an overall cascade deadline and
    /// cancellation token.
    ///
    /// A cycle in the graph aborts the whole change with `CycleDetected`
    /// before anything reloads. Per-artifact failures are contained: they
    /// appear as outcome records, not errors.
    pub fn on_artifact_changed_with(
        &self,
        path: &ArtifactPath,
        deadline: Deadline,
        token: &CancelToken,
    ) -> Result<CascadeReport> {
        let cascade_id = CascadeId::new();
        self.graph.touch(path)?;

        // Reloading inside a cycle has no well-defined order; abort loudly
        if let Some(cycle) = self.graph.find_cycle() {
            error!(
                target: "hotswap::engine",
                changed = %path,
                involving = %cycle.involving,
                depth_exceeded = cycle.depth_exceeded,
                "cycle detected; aborting cascade"
            );
            return Err(HotswapError::CycleDetected {
                involving: cycle.involving.to_string(),
                depth_exceeded: cycle.depth_exceeded,
            });
        }

        let order = self
            .graph
            .compute_cascade_order(path, self.config.max_cascade_queue)?;
        info!(
            target: "hotswap::engine",
            changed = %path,
            cascade = %cascade_id,
            affected = order.len(),
            "cascade started"
        );

        let mut outcomes = Vec::with_capacity(order.len());
        let mut stats = CascadeStats {
            affected: order.len(),
            ..CascadeStats::default()
        };
        let mut truncated = order.truncated;
        let mut halted = false;
        let mut stale_rest = false;
        let mut skip_rest = false;

        for artifact in order.iter() {
            if stale_rest {
                self.emit(cascade_id, artifact, ReloadOutcome::Stale, None);
                outcomes.push((artifact.clone(), ReloadOutcome::Stale));
                continue;
            }
            if skip_rest || token.is_cancelled() || deadline.expired() {
                skip_rest = true;
                self.emit(cascade_id, artifact, ReloadOutcome::Skipped, None);
                outcomes.push((artifact.clone(), ReloadOutcome::Skipped));
                continue;
            }
            if self.policy.is_disabled(artifact) {
                self.emit(cascade_id, artifact, ReloadOutcome::Skipped, None);
                outcomes.push((artifact.clone(), ReloadOutcome::Skipped));
                continue;
            }

            let result = self.process_one(artifact, token, &deadline);
            self.emit(cascade_id, artifact, result.outcome, result.version);
            outcomes.push((artifact.clone(), result.outcome));
            match result.outcome {
                ReloadOutcome::Committed => stats.succeeded += 1,
                ReloadOutcome::RolledBack
                | ReloadOutcome::Fallback
                | ReloadOutcome::Disabled => stats.failed += 1,
                ReloadOutcome::Stale | ReloadOutcome::Skipped => {}
            }
            if result.truncate {
                truncated = true;
                stale_rest = true;
            }
            if result.halt {
                halted = true;
                skip_rest = true;
            }
        }

        info!(
            target: "hotswap::engine",
            cascade = %cascade_id,
            affected = stats.affected,
            succeeded = stats.succeeded,
            failed = stats.failed,
            truncated,
            halted,
            "cascade finished"
        );
        Ok(CascadeReport {
            cascade_id,
            outcomes,
            stats,
            truncated,
            halted,
        })
    }

    fn emit(
        &self,
        cascade: CascadeId,
        artifact: &ArtifactPath,
        outcome: ReloadOutcome,
        version: Option<SemVersion>,
    ) {
        self.sink.emit(ReloadEvent {
            artifact: artifact.clone(),
            outcome,
            version,
            cascade,
            timestamp: Utc::now(),
        });
    }

    /// Rebuild, version-check, and migrate one artifact.
    fn process_one(
        &self,
        artifact: &ArtifactPath,
        token: &CancelToken,
        deadline: &Deadline,
    ) -> ProcessResult {
        let is_critical = self
            .graph
            .node(artifact)
            .map(|n| n.is_critical)
            .unwrap_or(false);
        let _ = self.graph.set_reloading(artifact, true);

        let build = match self.builder.build(artifact) {
            Ok(output) => output,
            Err(failure) => {
                let resolution = self.policy.handle_failure(
                    artifact,
                    &failure.diagnostic_text,
                    self.builder.as_ref(),
                    token,
                );
                match resolution.outcome {
                    RecoveryOutcome::Recovered(output) => output,
                    other => return self.settle_failure(artifact, &other, is_critical),
                }
            }
        };

        // Compatibility gate against the currently loaded version
        let current = self
            .loaded
            .get(artifact)
            .map(|s| s.version)
            .or_else(|| {
                self.graph
                    .node(artifact)
                    .filter(|n| n.resolved)
                    .map(|n| n.current_version)
            });
        let Some(current) = current else {
            // First sighting of this artifact: nothing live to migrate
            self.adopt(artifact, &build);
            return ProcessResult {
                outcome: ReloadOutcome::Committed,
                version: Some(build.version),
                halt: false,
                truncate: false,
            };
        };

        let report = compat::check(current, build.version);
        if report.classification == Compatibility::MajorBreaking && !self.migration.allow_breaking
        {
            warn!(
                target: "hotswap::engine",
                artifact = %artifact,
                from = %current,
                to = %build.version,
                "breaking version jump; truncating cascade here"
            );
            // Still flagged needs_reload (it is stale), but no longer in
            // active reload
            let _ = self.graph.set_reloading(artifact, false);
            return ProcessResult {
                outcome: ReloadOutcome::Stale,
                version: Some(current),
                halt: false,
                truncate: true,
            };
        }

        // Clamp the migration budget to the remaining cascade deadline
        let mut migration = self.migration.clone();
        if let Some(remaining) = deadline.remaining() {
            migration.timeout_ms = migration.timeout_ms.min(remaining.as_millis() as u64);
        }

        let payload = self
            .loaded
            .get(artifact)
            .map(|s| s.payload.clone())
            .unwrap_or_default();
        let mut target = SwapTarget {
            version: current,
            payload,
            incoming: build.binary.clone(),
        };
        let mut pending = build;
        let mut recovery_spent = false;
        loop {
            match self
                .controller
                .migrate(artifact, &mut target, pending.version, &migration, token)
            {
                Ok(_) => {
                    self.adopt(artifact, &pending);
                    return ProcessResult {
                        outcome: ReloadOutcome::Committed,
                        version: Some(pending.version),
                        halt: false,
                        truncate: false,
                    };
                }
                Err(HotswapError::Busy(_)) => {
                    // Another cascade is migrating this artifact; leave it
                    // flagged and move on
                    warn!(
                        target: "hotswap::engine",
                        artifact = %artifact,
                        "migration in flight elsewhere; skipping"
                    );
                    return ProcessResult {
                        outcome: ReloadOutcome::Skipped,
                        version: None,
                        halt: false,
                        truncate: false,
                    };
                }
                Err(HotswapError::Cancelled) => {
                    let _ = self.graph.mark_reloaded(artifact);
                    return ProcessResult {
                        outcome: ReloadOutcome::RolledBack,
                        version: Some(current),
                        halt: true,
                        truncate: false,
                    };
                }
                Err(e) => {
                    if recovery_spent {
                        let _ = self.graph.mark_reloaded(artifact);
                        return ProcessResult {
                            outcome: ReloadOutcome::RolledBack,
                            version: Some(current),
                            halt: is_critical,
                            truncate: false,
                        };
                    }
                    recovery_spent = true;
                    let resolution = self.policy.handle_failure(
                        artifact,
                        &format!("error: {}", e),
                        self.builder.as_ref(),
                        token,
                    );
                    match resolution.outcome {
                        RecoveryOutcome::Recovered(output) => {
                            target.incoming = output.binary.clone();
                            pending = output;
                        }
                        other => return self.settle_failure(artifact, &other, is_critical),
                    }
                }
            }
        }
    }

    /// Write back a committed build: live state, graph, registry, breaker.
    fn adopt(&self, artifact: &ArtifactPath, build: &BuildOutput) {
        self.loaded.insert(
            artifact.clone(),
            LoadedState {
                version: build.version,
                payload: build.binary.clone(),
            },
        );
        let _ = self
            .graph
            .commit_version(artifact, build.version, build.content_hash);
        self.registry.register(artifact.as_str(), build.version);
        self.policy.reset_breaker(artifact);
    }

    fn settle_failure(
        &self,
        artifact: &ArtifactPath,
        outcome: &RecoveryOutcome,
        is_critical: bool,
    ) -> ProcessResult {
        let mapped = match outcome {
            RecoveryOutcome::FallbackActive => ReloadOutcome::Fallback,
            RecoveryOutcome::Disabled => ReloadOutcome::Disabled,
            RecoveryOutcome::NotNeeded => ReloadOutcome::Skipped,
            RecoveryOutcome::Recovered(_)
            | RecoveryOutcome::RetriesExhausted
            | RecoveryOutcome::PermanentlyFailed
            | RecoveryOutcome::Unsupported => ReloadOutcome::RolledBack,
        };
        if mapped == ReloadOutcome::Skipped {
            let _ = self.graph.set_reloading(artifact, false);
        } else {
            let _ = self.graph.mark_reloaded(artifact);
        }
        ProcessResult {
            outcome: mapped,
            version: None,
            halt: is_critical,
            truncate: false,
        }
    }
}
