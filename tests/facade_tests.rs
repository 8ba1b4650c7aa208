//! End-to-end tests through the public facade
//!
//! Exercises the crate the way an embedding application would: implement
//! the builder seam, declare dependencies, feed change events, observe
//! outcome records.

use hotswap::{
    ArtifactBuilder, ArtifactPath, BuildFailure, BuildOutput, ContentHash, MemorySink,
    ReloadOrchestrator, ReloadOutcome, SemVersion,
};
use std::sync::Arc;

/// Builder that compiles everything successfully at a fixed version
struct FixedBuilder {
    version: SemVersion,
}

impl ArtifactBuilder for FixedBuilder {
    fn build(&self, path: &ArtifactPath) -> Result<BuildOutput, BuildFailure> {
        let binary = format!("{path}@{}", self.version).into_bytes();
        Ok(BuildOutput {
            content_hash: ContentHash::of(&binary),
            binary,
            version: self.version,
        })
    }

    fn activate_fallback(&self, _path: &ArtifactPath) -> bool {
        false
    }

    fn disable(&self, _path: &ArtifactPath) {}
}

#[test]
fn test_change_event_flows_through_facade() {
    let sink = Arc::new(MemorySink::new());
    let engine = ReloadOrchestrator::builder(Arc::new(FixedBuilder {
        version: SemVersion::new(1, 0, 0),
    }))
    .event_sink(sink.clone())
    .build()
    .unwrap();

    engine
        .graph()
        .add_dependency(
            &ArtifactPath::new("app/ui.so"),
            &ArtifactPath::new("app/core.so"),
            false,
        )
        .unwrap();

    let report = engine
        .on_artifact_changed(&ArtifactPath::new("app/core.so"))
        .unwrap();
    assert_eq!(report.stats.affected, 2);
    assert_eq!(report.stats.succeeded, 2);

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].artifact, ArtifactPath::new("app/core.so"));
    assert!(events.iter().all(|e| e.outcome == ReloadOutcome::Committed));

    assert_eq!(
        engine.registry().latest("app/core.so"),
        Some(SemVersion::new(1, 0, 0))
    );
}

#[test]
fn test_cycle_is_rejected_through_facade() {
    let engine = ReloadOrchestrator::builder(Arc::new(FixedBuilder {
        version: SemVersion::new(1, 0, 0),
    }))
    .build()
    .unwrap();

    let graph = engine.graph();
    let (a, b) = (ArtifactPath::new("a"), ArtifactPath::new("b"));
    graph.add_dependency(&a, &b, false).unwrap();
    graph.add_dependency(&b, &a, false).unwrap();

    assert!(engine.on_artifact_changed(&a).is_err());
}
