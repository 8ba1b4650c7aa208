//! Shared test doubles for engine integration tests
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hotswap_core::{
    ArtifactBuilder, ArtifactPath, BuildFailure, BuildOutput, ContentHash, SemVersion,
};
use hotswap_engine::{EngineConfig, MemorySink, ReloadOrchestrator};

/// Builder double: hands out a configured version per path, with scriptable
/// failures consumed in order before builds succeed again.
pub struct TestBuilder {
    versions: Mutex<HashMap<ArtifactPath, SemVersion>>,
    failures: Mutex<HashMap<ArtifactPath, VecDeque<String>>>,
    pub builds: AtomicU64,
    pub fallbacks: AtomicU64,
    has_fallback: bool,
}

impl TestBuilder {
    pub fn new() -> Self {
        TestBuilder {
            versions: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            builds: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            has_fallback: true,
        }
    }

    /// Version the next builds of `path` will be stamped with
    pub fn set_version(&self, path: &str, version: SemVersion) {
        self.versions
            .lock()
            .insert(ArtifactPath::new(path), version);
    }

    /// Queue a failure diagnostic for the next build of `path`
    pub fn push_failure(&self, path: &str, diagnostic: &str) {
        self.failures
            .lock()
            .entry(ArtifactPath::new(path))
            .or_default()
            .push_back(diagnostic.to_string());
    }

    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ArtifactBuilder for TestBuilder {
    fn build(&self, path: &ArtifactPath) -> Result<BuildOutput, BuildFailure> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(queue) = self.failures.lock().get_mut(path) {
            if let Some(diagnostic_text) = queue.pop_front() {
                return Err(BuildFailure { diagnostic_text });
            }
        }
        let version = self
            .versions
            .lock()
            .get(path)
            .copied()
            .unwrap_or(SemVersion::new(1, 0, 0));
        let binary = format!("binary of {path} at {version}").into_bytes();
        Ok(BuildOutput {
            content_hash: ContentHash::of(&binary),
            binary,
            version,
        })
    }

    fn activate_fallback(&self, _path: &ArtifactPath) -> bool {
        if self.has_fallback {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
        }
        self.has_fallback
    }

    fn disable(&self, _path: &ArtifactPath) {}
}

/// Test config: small backoffs so retry paths finish fast
pub fn fast_config() -> EngineConfig {
    EngineConfig::from_toml(
        r#"
        [migration]
        retry_count = 1
        backoff_ms = 1
        timeout_ms = 5000

        [recovery]
        max_retries = 2
        backoff_ms = 1
        breaker_threshold = 3
        "#,
    )
    .unwrap()
}

pub struct Harness {
    pub orchestrator: ReloadOrchestrator,
    pub builder: Arc<TestBuilder>,
    pub sink: Arc<MemorySink>,
}

/// Orchestrator wired to a `TestBuilder` and a buffering sink
pub fn harness_with(config: EngineConfig) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let builder = Arc::new(TestBuilder::new());
    let sink = Arc::new(MemorySink::new());
    let orchestrator = ReloadOrchestrator::builder(builder.clone())
        .config(config)
        .event_sink(sink.clone())
        .build()
        .unwrap();
    Harness {
        orchestrator,
        builder,
        sink,
    }
}

pub fn harness() -> Harness {
    harness_with(fast_config())
}

pub fn path(s: &str) -> ArtifactPath {
    ArtifactPath::new(s)
}

impl Harness {
    /// Declare the chain `a -> b -> c` (a depends on b, b depends on c)
    pub fn chain(&self, critical: bool) {
        let graph = self.orchestrator.graph();
        graph.add_dependency(&path("a"), &path("b"), critical).unwrap();
        graph.add_dependency(&path("b"), &path("c"), false).unwrap();
    }

    /// Run one cascade from `c` so every artifact in the chain is loaded
    /// at 1.0.0
    pub fn preload_chain(&self) {
        let report = self.orchestrator.on_artifact_changed(&path("c")).unwrap();
        assert_eq!(report.stats.succeeded, 3);
        self.sink.drain();
    }
}
