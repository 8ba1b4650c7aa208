//! Migration state machine
//!
//! Drives one artifact through `Idle -> Validating -> Migrating ->
//! {Committed, RolledBack, Failed}`:
//!
//! - `Validating` runs the compatibility check; a breaking jump with no
//!   manual override aborts without touching artifact state.
//! - `Migrating` snapshots the artifact before the first mutation, then
//!   applies the transition under the configured timeout and retry budget.
//!   Every retry restores from the same snapshot first. Exhausted retries
//!   restore the snapshot and report failure; the post-rollback state is
//!   byte-identical to the pre-migration snapshot.
//!
//! Migrations are serialized per artifact path: a second request while one
//! is in flight is rejected with `Busy` rather than interleaved. Migrations
//! for unrelated artifacts proceed fully in parallel.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use hotswap_core::{
    compat, ArtifactPath, CancelToken, Compatibility, Deadline, HotswapError, MigrationTarget,
    Result, SemVersion,
};

use crate::rollback::RollbackStore;

/// How a migration is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStrategy {
    /// The controller applies the transition without operator involvement
    Automatic,
    /// An operator confirmed this migration (required for breaking jumps)
    Manual,
}

impl std::str::FromStr for MigrationStrategy {
    type Err = HotswapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "automatic" => Ok(MigrationStrategy::Automatic),
            "manual" => Ok(MigrationStrategy::Manual),
            other => Err(HotswapError::invalid_input(format!(
                "invalid migration strategy '{}': expected \"automatic\" or \"manual\"",
                other
            ))),
        }
    }
}

/// Per-migration budget and policy
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Driving strategy
    pub strategy: MigrationStrategy,
    /// Wall-clock budget for the whole `Migrating` phase
    pub timeout_ms: u64,
    /// Additional attempts after the first failure
    pub retry_count: u32,
    /// Wait between attempts; clamped to the remaining timeout
    pub backoff_ms: u64,
    /// Manual override permitting a breaking version jump
    pub allow_breaking: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            strategy: MigrationStrategy::Automatic,
            timeout_ms: 30_000,
            retry_count: 3,
            backoff_ms: 100,
            allow_breaking: false,
        }
    }
}

/// States of the per-artifact migration machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// No migration attempted yet (or previous one fully settled)
    Idle,
    /// Compatibility check in progress
    Validating,
    /// Transition being applied under the retry/timeout budget
    Migrating,
    /// New version is live
    Committed,
    /// Failed and restored to the pre-migration snapshot
    RolledBack,
    /// Aborted before mutating (validation failure or internal error)
    Failed,
}

impl MigrationState {
    fn in_flight(self) -> bool {
        matches!(self, MigrationState::Validating | MigrationState::Migrating)
    }
}

/// Outcome of a successful migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    /// Attempts consumed, including the successful one
    pub attempts: u32,
}

/// Serializes migrations per artifact and owns the rollback discipline.
pub struct MigrationController {
    store: Arc<RollbackStore>,
    states: DashMap<ArtifactPath, MigrationState>,
}

/// Writes the terminal state on every exit path, including panics inside
/// `MigrationTarget::apply`.
struct StateGuard<'a> {
    states: &'a DashMap<ArtifactPath, MigrationState>,
    artifact: &'a ArtifactPath,
    settled: bool,
}

impl<'a> StateGuard<'a> {
    fn set(&self, state: MigrationState) {
        self.states.insert(self.artifact.clone(), state);
    }

    fn finish(mut self, state: MigrationState) {
        self.set(state);
        self.settled = true;
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.set(MigrationState::Failed);
        }
    }
}

impl MigrationController {
    /// Create a controller backed by `store`
    pub fn new(store: Arc<RollbackStore>) -> Self {
        MigrationController {
            store,
            states: DashMap::new(),
        }
    }

    /// The snapshot store this controller rolls back through
    pub fn store(&self) -> &Arc<RollbackStore> {
        &self.store
    }

    /// Last observed state for an artifact (`Idle` if never migrated)
    pub fn state(&self, artifact: &ArtifactPath) -> MigrationState {
        self.states
            .get(artifact)
            .map(|s| *s)
            .unwrap_or(MigrationState::Idle)
    }

    /// Run one migration attempt to `to` for `artifact`.
    ///
    /// Returns `Busy` if a migration for the same artifact is in flight,
    /// `CompatibilityBreaking` if validation rejects the jump, `Cancelled`
    /// if the token fired mid-flight (after rolling back), and
    /// `MigrationFailed` after the retry budget is exhausted (after rolling
    /// back). On any rollback path the artifact's observable state is
    /// restored byte-identically from the pre-migration snapshot.
    pub fn migrate(
        &self,
        artifact: &ArtifactPath,
        target: &mut dyn MigrationTarget,
        to: SemVersion,
        config: &MigrationConfig,
        token: &CancelToken,
    ) -> Result<MigrationReport> {
        // Busy gate and transition to Validating, atomically per artifact
        match self.states.entry(artifact.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if entry.get().in_flight() {
                    return Err(HotswapError::Busy(artifact.to_string()));
                }
                entry.insert(MigrationState::Validating);
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(MigrationState::Validating);
            }
        }
        let guard = StateGuard {
            states: &self.states,
            artifact,
            settled: false,
        };

        let from = target.version();
        let report = compat::check(from, to);
        debug!(
            target: "hotswap::migrate",
            artifact = %artifact,
            %from,
            %to,
            classification = %report,
            "validating migration"
        );
        if report.classification == Compatibility::MajorBreaking && !config.allow_breaking {
            guard.finish(MigrationState::Failed);
            return Err(HotswapError::CompatibilityBreaking {
                artifact: artifact.to_string(),
                from,
                to,
            });
        }

        // Snapshot before the first mutation; every retry and the final
        // rollback restore from this exact point
        let pre_state = target.snapshot_state();
        self.store.save(artifact, from, &pre_state)?;
        guard.set(MigrationState::Migrating);

        let deadline = Deadline::within(Duration::from_millis(config.timeout_ms));
        let backoff = Duration::from_millis(config.backoff_ms);
        let mut attempts = 0u32;
        let mut last_reason = String::from("no attempt executed");
        let mut cancelled = false;

        while attempts <= config.retry_count {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }
            if deadline.expired() {
                last_reason = format!("timed out after {}ms", config.timeout_ms);
                break;
            }
            if attempts > 0 {
                target.restore(from, &pre_state)?;
                if token.wait_for(deadline.clamp(backoff)) {
                    cancelled = true;
                    break;
                }
            }
            attempts += 1;
            match target.apply(to, token) {
                Ok(()) => {
                    guard.finish(MigrationState::Committed);
                    info!(
                        target: "hotswap::migrate",
                        artifact = %artifact,
                        %from,
                        %to,
                        attempts,
                        "migration committed"
                    );
                    return Ok(MigrationReport { attempts });
                }
                Err(e) => {
                    debug!(
                        target: "hotswap::migrate",
                        artifact = %artifact,
                        attempt = attempts,
                        error = %e,
                        "migration attempt failed"
                    );
                    last_reason = e.to_string();
                }
            }
        }

        target.restore(from, &pre_state)?;
        guard.finish(MigrationState::RolledBack);
        warn!(
            target: "hotswap::migrate",
            artifact = %artifact,
            %from,
            %to,
            attempts,
            reason = %last_reason,
            cancelled,
            "migration rolled back"
        );
        if cancelled {
            return Err(HotswapError::Cancelled);
        }
        Err(HotswapError::MigrationFailed {
            artifact: artifact.to_string(),
            attempts,
            reason: last_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    fn path(s: &str) -> ArtifactPath {
        ArtifactPath::new(s)
    }

    fn controller() -> MigrationController {
        MigrationController::new(Arc::new(RollbackStore::new(4)))
    }

    fn fast_config(retries: u32) -> MigrationConfig {
        MigrationConfig {
            retry_count: retries,
            backoff_ms: 1,
            timeout_ms: 5_000,
            ..MigrationConfig::default()
        }
    }

    /// Test double: applies transitions by rewriting its payload, failing
    /// the first `fail_first` attempts.
    struct FakeModule {
        version: SemVersion,
        payload: Vec<u8>,
        fail_first: u32,
        applies: AtomicU32,
        apply_delay: Duration,
    }

    impl FakeModule {
        fn new(version: SemVersion, payload: &[u8]) -> Self {
            FakeModule {
                version,
                payload: payload.to_vec(),
                fail_first: 0,
                applies: AtomicU32::new(0),
                apply_delay: Duration::ZERO,
            }
        }

        fn failing(mut self, count: u32) -> Self {
            self.fail_first = count;
            self
        }
    }

    impl MigrationTarget for FakeModule {
        fn version(&self) -> SemVersion {
            self.version
        }

        fn snapshot_state(&self) -> Vec<u8> {
            self.payload.clone()
        }

        fn apply(&mut self, to: SemVersion, _token: &CancelToken) -> Result<()> {
            if !self.apply_delay.is_zero() {
                thread::sleep(self.apply_delay);
            }
            let attempt = self.applies.fetch_add(1, Ordering::SeqCst);
            // Partial mutation happens even on failing attempts; rollback
            // must erase it
            self.payload = format!("migrating to {to}").into_bytes();
            if attempt < self.fail_first {
                return Err(HotswapError::invalid_input("induced failure"));
            }
            self.version = to;
            self.payload = format!("state at {to}").into_bytes();
            Ok(())
        }

        fn restore(&mut self, version: SemVersion, state: &[u8]) -> Result<()> {
            self.version = version;
            self.payload = state.to_vec();
            Ok(())
        }
    }

    #[test]
    fn test_clean_migration_commits() {
        let ctl = controller();
        let mut module = FakeModule::new(SemVersion::new(1, 0, 0), b"state at 1.0.0");
        let report = ctl
            .migrate(
                &path("mods/ai.so"),
                &mut module,
                SemVersion::new(1, 1, 0),
                &fast_config(3),
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(module.version, SemVersion::new(1, 1, 0));
        assert_eq!(ctl.state(&path("mods/ai.so")), MigrationState::Committed);
    }

    #[test]
    fn test_retries_then_commits() {
        let ctl = controller();
        let mut module =
            FakeModule::new(SemVersion::new(1, 0, 0), b"original").failing(2);
        let report = ctl
            .migrate(
                &path("a"),
                &mut module,
                SemVersion::new(1, 1, 0),
                &fast_config(3),
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(module.payload, b"state at 1.1.0");
    }

    #[test]
    fn test_exhausted_retries_roll_back_byte_identically() {
        for retry_count in 0..3u32 {
            let ctl = controller();
            let mut module =
                FakeModule::new(SemVersion::new(2, 3, 0), b"pristine state").failing(u32::MAX);
            let err = ctl
                .migrate(
                    &path("a"),
                    &mut module,
                    SemVersion::new(2, 4, 0),
                    &fast_config(retry_count),
                    &CancelToken::new(),
                )
                .unwrap_err();
            assert!(matches!(
                err,
                HotswapError::MigrationFailed { attempts, .. } if attempts == retry_count + 1
            ));
            assert_eq!(ctl.state(&path("a")), MigrationState::RolledBack);
            assert_eq!(module.payload, b"pristine state");
            assert_eq!(module.version, SemVersion::new(2, 3, 0));
        }
    }

    #[test]
    fn test_breaking_jump_fails_without_touching_state() {
        let ctl = controller();
        let mut module = FakeModule::new(SemVersion::new(1, 1, 0), b"untouched");
        let err = ctl
            .migrate(
                &path("a"),
                &mut module,
                SemVersion::new(2, 0, 0),
                &fast_config(3),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, HotswapError::CompatibilityBreaking { .. }));
        assert_eq!(ctl.state(&path("a")), MigrationState::Failed);
        assert_eq!(module.payload, b"untouched");
        assert_eq!(module.applies.load(Ordering::SeqCst), 0);
        // No snapshot was taken for an aborted validation
        assert!(ctl.store().latest(&path("a")).is_none());
    }

    #[test]
    fn test_breaking_jump_with_override_proceeds() {
        let ctl = controller();
        let mut module = FakeModule::new(SemVersion::new(1, 1, 0), b"old");
        let config = MigrationConfig {
            strategy: MigrationStrategy::Manual,
            allow_breaking: true,
            ..fast_config(0)
        };
        ctl.migrate(
            &path("a"),
            &mut module,
            SemVersion::new(2, 0, 0),
            &config,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(module.version, SemVersion::new(2, 0, 0));
    }

    #[test]
    fn test_cancellation_rolls_back() {
        let ctl = controller();
        let mut module =
            FakeModule::new(SemVersion::new(1, 0, 0), b"before cancel").failing(u32::MAX);
        let token = CancelToken::new();
        token.cancel();
        // Pre-cancelled token: no attempt runs, state rolls back cleanly
        let err = ctl
            .migrate(
                &path("a"),
                &mut module,
                SemVersion::new(1, 1, 0),
                &fast_config(5),
                &token,
            )
            .unwrap_err();
        assert!(matches!(err, HotswapError::Cancelled));
        assert_eq!(ctl.state(&path("a")), MigrationState::RolledBack);
        assert_eq!(module.payload, b"before cancel");
    }

    #[test]
    fn test_timeout_stops_retries() {
        let ctl = controller();
        let mut module =
            FakeModule::new(SemVersion::new(1, 0, 0), b"slow state").failing(u32::MAX);
        module.apply_delay = Duration::from_millis(30);
        let config = MigrationConfig {
            timeout_ms: 20,
            retry_count: 100,
            backoff_ms: 1,
            ..MigrationConfig::default()
        };
        let err = ctl
            .migrate(
                &path("a"),
                &mut module,
                SemVersion::new(1, 1, 0),
                &config,
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, HotswapError::MigrationFailed { .. }));
        // Far fewer than the nominal retry budget ran
        assert!(module.applies.load(Ordering::SeqCst) < 10);
        assert_eq!(module.payload, b"slow state");
    }

    #[test]
    fn test_concurrent_migrations_same_artifact_one_gets_busy() {
        let ctl = Arc::new(controller());
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let ctl = Arc::clone(&ctl);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                let mut module = FakeModule::new(SemVersion::new(1, 0, 0), b"shared");
                module.apply_delay = Duration::from_millis(100);
                barrier.wait();
                ctl.migrate(
                    &path("contended"),
                    &mut module,
                    SemVersion::new(1, 1, 0),
                    &fast_config(0),
                    &CancelToken::new(),
                )
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let busy = results
            .iter()
            .filter(|r| matches!(r, Err(HotswapError::Busy(_))))
            .count();
        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1);
        assert_eq!(busy, 1);
    }

    #[test]
    fn test_unrelated_artifacts_migrate_in_parallel() {
        let ctl = Arc::new(controller());
        let mut handles = Vec::new();
        for i in 0..4 {
            let ctl = Arc::clone(&ctl);
            handles.push(thread::spawn(move || {
                let mut module = FakeModule::new(SemVersion::new(1, 0, 0), b"independent");
                ctl.migrate(
                    &path(&format!("mods/{i}.so")),
                    &mut module,
                    SemVersion::new(1, 1, 0),
                    &fast_config(0),
                    &CancelToken::new(),
                )
            }));
        }
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "automatic".parse::<MigrationStrategy>().unwrap(),
            MigrationStrategy::Automatic
        );
        assert_eq!(
            "manual".parse::<MigrationStrategy>().unwrap(),
            MigrationStrategy::Manual
        );
        assert!("aggressive".parse::<MigrationStrategy>().is_err());
    }
}
