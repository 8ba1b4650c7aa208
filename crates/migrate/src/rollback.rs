//! Versioned snapshot store for rollback
//!
//! Snapshots are held in a bounded per-artifact ring, newest first; the
//! oldest snapshot is evicted when the bound is exceeded. The store
//! exclusively owns payloads: callers hold opaque [`SnapshotHandle`]s and
//! get a fresh copy back on restore, which never consumes the snapshot.
//!
//! When a persistent backing is attached, every save is written through to
//! it keyed by (artifact path, version); restore falls back to the backing
//! if the in-memory ring has already evicted the entry.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use hotswap_core::{ArtifactPath, HotswapError, Result, SemVersion, SnapshotBacking};

/// Opaque reference to a saved snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHandle {
    artifact: ArtifactPath,
    version: SemVersion,
    seq: u64,
}

impl SnapshotHandle {
    /// Artifact the snapshot belongs to
    pub fn artifact(&self) -> &ArtifactPath {
        &self.artifact
    }

    /// Version the snapshot captured
    pub fn version(&self) -> SemVersion {
        self.version
    }
}

/// Wire format for write-through persistence
#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    version: SemVersion,
    payload: Vec<u8>,
    created_at: DateTime<Utc>,
}

struct StoredSnapshot {
    seq: u64,
    version: SemVersion,
    payload: Vec<u8>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

/// Bounded, thread-safe snapshot store.
pub struct RollbackStore {
    /// Per-artifact rings, front = newest
    rings: Mutex<FxHashMap<ArtifactPath, VecDeque<StoredSnapshot>>>,
    next_seq: AtomicU64,
    bound: usize,
    backing: Option<Arc<dyn SnapshotBacking>>,
}

impl RollbackStore {
    /// Create a store keeping at most `bound` snapshots per artifact
    pub fn new(bound: usize) -> Self {
        RollbackStore {
            rings: Mutex::new(FxHashMap::default()),
            next_seq: AtomicU64::new(0),
            bound: bound.max(1),
            backing: None,
        }
    }

    /// Attach a persistent backing; saves are written through to it
    pub fn with_backing(bound: usize, backing: Arc<dyn SnapshotBacking>) -> Self {
        RollbackStore {
            backing: Some(backing),
            ..RollbackStore::new(bound)
        }
    }

    /// Save a snapshot, evicting the oldest if the ring is full.
    pub fn save(
        &self,
        artifact: &ArtifactPath,
        version: SemVersion,
        payload: &[u8],
    ) -> Result<SnapshotHandle> {
        let created_at = Utc::now();
        if let Some(backing) = &self.backing {
            let record = SnapshotRecord {
                version,
                payload: payload.to_vec(),
                created_at,
            };
            let bytes = bincode::serialize(&record)?;
            backing.put(artifact, version, &bytes)?;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut rings = self.rings.lock();
        let ring = rings.entry(artifact.clone()).or_default();
        ring.push_front(StoredSnapshot {
            seq,
            version,
            payload: payload.to_vec(),
            created_at,
        });
        while ring.len() > self.bound {
            ring.pop_back();
        }
        debug!(
            target: "hotswap::migrate",
            artifact = %artifact,
            %version,
            retained = ring.len(),
            "saved rollback snapshot"
        );
        Ok(SnapshotHandle {
            artifact: artifact.clone(),
            version,
            seq,
        })
    }

    /// Fetch a snapshot payload. Idempotent: the snapshot stays in the
    /// store and may be restored again until pruned or evicted.
    pub fn restore(&self, handle: &SnapshotHandle) -> Result<Vec<u8>> {
        {
            let rings = self.rings.lock();
            if let Some(ring) = rings.get(&handle.artifact) {
                if let Some(snapshot) = ring.iter().find(|s| s.seq == handle.seq) {
                    return Ok(snapshot.payload.clone());
                }
            }
        }
        // Evicted from the ring; the backing may still have it
        if let Some(backing) = &self.backing {
            if let Some(bytes) = backing.get(&handle.artifact, handle.version)? {
                let record: SnapshotRecord = bincode::deserialize(&bytes)?;
                return Ok(record.payload);
            }
        }
        Err(HotswapError::SnapshotMissing(format!(
            "{} @ {}",
            handle.artifact, handle.version
        )))
    }

    /// Handles for an artifact's retained snapshots, newest first
    pub fn list(&self, artifact: &ArtifactPath) -> Vec<SnapshotHandle> {
        let rings = self.rings.lock();
        rings
            .get(artifact)
            .map(|ring| {
                ring.iter()
                    .map(|s| SnapshotHandle {
                        artifact: artifact.clone(),
                        version: s.version,
                        seq: s.seq,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The newest retained snapshot for an artifact, if any
    pub fn latest(&self, artifact: &ArtifactPath) -> Option<SnapshotHandle> {
        self.list(artifact).into_iter().next()
    }

    /// Drop all but the newest `keep` snapshots for an artifact
    pub fn prune(&self, artifact: &ArtifactPath, keep: usize) {
        let mut rings = self.rings.lock();
        if let Some(ring) = rings.get_mut(artifact) {
            ring.truncate(keep);
            if ring.is_empty() {
                rings.remove(artifact);
            }
        }
    }
}
