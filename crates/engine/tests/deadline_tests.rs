//! Cascade deadlines, cancellation, and migration failure containment

mod common;

use common::{fast_config, harness, harness_with, path, TestBuilder};
use hotswap_core::{CancelToken, Deadline, ReloadOutcome, SemVersion, SnapshotBacking};
use hotswap_engine::{EngineConfig, MemoryBacking, ReloadOrchestrator};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_cancelled_token_skips_whole_cascade() {
    let h = harness();
    h.chain(false);
    h.preload_chain();

    let token = CancelToken::new();
    token.cancel();
    let report = h
        .orchestrator
        .on_artifact_changed_with(&path("c"), Deadline::never(), &token)
        .unwrap();
    assert!(report
        .outcomes
        .iter()
        .all(|(_, o)| *o == ReloadOutcome::Skipped));
    assert_eq!(report.stats.succeeded, 0);
}

#[test]
fn test_expired_deadline_skips_whole_cascade() {
    let h = harness();
    h.chain(false);
    h.preload_chain();

    let report = h
        .orchestrator
        .on_artifact_changed_with(
            &path("c"),
            Deadline::within(Duration::ZERO),
            &CancelToken::new(),
        )
        .unwrap();
    assert!(report
        .outcomes
        .iter()
        .all(|(_, o)| *o == ReloadOutcome::Skipped));
}

#[test]
fn test_migration_timeout_rolls_back_and_is_contained() {
    // A zero migration budget makes every migration fail after rollback;
    // the cascade itself still completes and reports per-artifact outcomes
    let config = EngineConfig::from_toml(
        r#"
        [migration]
        timeout_ms = 0
        retry_count = 0
        backoff_ms = 1

        [recovery]
        max_retries = 1
        backoff_ms = 1
        "#,
    )
    .unwrap();
    let h = harness_with(config);
    h.chain(false);
    h.preload_chain();

    h.builder.set_version("c", SemVersion::new(1, 0, 1));
    let report = h.orchestrator.on_artifact_changed(&path("c")).unwrap();

    // Migration cannot run inside a zero budget: rolled back, not crashed
    assert_eq!(report.outcomes[0], (path("c"), ReloadOutcome::RolledBack));
    assert_eq!(report.stats.failed, report.stats.affected);
    // The live version is unchanged after rollback
    assert_eq!(
        h.orchestrator.graph().node(&path("c")).unwrap().current_version,
        SemVersion::new(1, 0, 0)
    );
}

#[test]
fn test_snapshot_backing_receives_write_through() {
    let builder = Arc::new(TestBuilder::new());
    let backing = Arc::new(MemoryBacking::new());
    let orchestrator = ReloadOrchestrator::builder(builder.clone())
        .config(fast_config())
        .snapshot_backing(backing.clone())
        .build()
        .unwrap();

    // First sighting adopts directly; no snapshot yet
    orchestrator.on_artifact_changed(&path("m")).unwrap();
    assert!(backing.is_empty());

    // The migration to 1.0.1 snapshots the 1.0.0 state through the backing
    builder.set_version("m", SemVersion::new(1, 0, 1));
    orchestrator.on_artifact_changed(&path("m")).unwrap();
    assert!(backing
        .get(&path("m"), SemVersion::new(1, 0, 0))
        .unwrap()
        .is_some());
}

#[test]
fn test_rollback_snapshots_recorded_per_migration() {
    let h = harness();
    h.chain(false);
    h.preload_chain();

    h.builder.set_version("c", SemVersion::new(1, 1, 0));
    h.orchestrator.on_artifact_changed(&path("c")).unwrap();

    // The migration snapshotted c's pre-migration state
    let store = h.orchestrator.rollback_store();
    let snapshots = store.list(&path("c"));
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].version(), SemVersion::new(1, 0, 0));
    let payload = store.restore(&snapshots[0]).unwrap();
    assert_eq!(payload, b"binary of c at 1.0.0");
}
