//! In-memory collaborator implementations
//!
//! Useful for tests and for embedding the engine without persistent
//! infrastructure: a map-backed snapshot store, a buffering event sink,
//! and a sink that drops everything.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use hotswap_core::{
    ArtifactPath, EventSink, ReloadEvent, Result, SemVersion, SnapshotBacking,
};

/// Snapshot backing held entirely in memory.
#[derive(Default)]
pub struct MemoryBacking {
    map: Mutex<FxHashMap<(ArtifactPath, SemVersion), Vec<u8>>>,
}

impl MemoryBacking {
    /// Create an empty backing
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// Whether the backing is empty
    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

impl SnapshotBacking for MemoryBacking {
    fn put(&self, path: &ArtifactPath, version: SemVersion, bytes: &[u8]) -> Result<()> {
        self.map
            .lock()
            .insert((path.clone(), version), bytes.to_vec());
        Ok(())
    }

    fn get(&self, path: &ArtifactPath, version: SemVersion) -> Result<Option<Vec<u8>>> {
        Ok(self.map.lock().get(&(path.clone(), version)).cloned())
    }
}

/// Event sink buffering every record for later inspection.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<ReloadEvent>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all buffered events, in emission order
    pub fn events(&self) -> Vec<ReloadEvent> {
        self.events.lock().clone()
    }

    /// Remove and return all buffered events
    pub fn drain(&self) -> Vec<ReloadEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: ReloadEvent) {
        self.events.lock().push(event);
    }
}

/// Sink that discards every record.
#[derive(Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ReloadEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotswap_core::{CascadeId, ReloadOutcome};

    #[test]
    fn test_memory_backing_roundtrip() {
        let backing = MemoryBacking::new();
        let path = ArtifactPath::new("a");
        backing.put(&path, SemVersion::new(1, 0, 0), b"bytes").unwrap();
        assert_eq!(
            backing.get(&path, SemVersion::new(1, 0, 0)).unwrap(),
            Some(b"bytes".to_vec())
        );
        assert_eq!(backing.get(&path, SemVersion::new(2, 0, 0)).unwrap(), None);
    }

    #[test]
    fn test_memory_sink_buffers_in_order() {
        let sink = MemorySink::new();
        let cascade = CascadeId::new();
        for (i, outcome) in [ReloadOutcome::Committed, ReloadOutcome::Stale]
            .into_iter()
            .enumerate()
        {
            sink.emit(ReloadEvent {
                artifact: ArtifactPath::new(format!("a{i}")),
                outcome,
                version: None,
                cascade,
                timestamp: chrono::Utc::now(),
            });
        }
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].outcome, ReloadOutcome::Committed);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.events().is_empty());
    }
}
