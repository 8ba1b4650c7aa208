//! Collaborator seams
//!
//! The engine reaches its external collaborators (native compiler, snapshot
//! persistence, dashboards, live artifact state) only through these traits.
//! Everything here is deliberately narrow: the engine decides *what* to
//! build, swap, or persist; the collaborator decides *how*.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::event::ReloadEvent;
use crate::types::{ArtifactPath, ContentHash};
use crate::version::SemVersion;

/// Successful build result handed back by the artifact builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// The loadable binary produced by the build
    pub binary: Vec<u8>,
    /// Version stamped on the new build
    pub version: SemVersion,
    /// Hash of the built content
    pub content_hash: ContentHash,
}

/// Build failure carrying the raw compiler diagnostic text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    /// Unparsed diagnostic output from the compiler
    pub diagnostic_text: String,
}

/// The native compiler/linker behind the engine.
///
/// `build` must be idempotent: the recovery policy calls it again on retry
/// and expects a repeated call for an unchanged source to behave the same.
pub trait ArtifactBuilder: Send + Sync {
    /// Compile the artifact at `path` into a loadable binary
    fn build(&self, path: &ArtifactPath) -> std::result::Result<BuildOutput, BuildFailure>;

    /// Swap in the previous known-good binary for `path`.
    ///
    /// Returns `false` when no fallback exists.
    fn activate_fallback(&self, path: &ArtifactPath) -> bool;

    /// Mark the artifact unusable in the running process
    fn disable(&self, path: &ArtifactPath);
}

/// Opaque persistent key/value store for rollback snapshots, keyed by
/// (artifact path, version).
pub trait SnapshotBacking: Send + Sync {
    /// Persist encoded snapshot bytes
    fn put(&self, path: &ArtifactPath, version: SemVersion, bytes: &[u8]) -> Result<()>;

    /// Fetch encoded snapshot bytes, `None` if absent
    fn get(&self, path: &ArtifactPath, version: SemVersion) -> Result<Option<Vec<u8>>>;
}

/// Consumer of reload outcome records (dashboards, metrics collectors)
pub trait EventSink: Send + Sync {
    /// Deliver one outcome record. Must not block the cascade.
    fn emit(&self, event: ReloadEvent);
}

/// The live, in-memory representation of a loaded artifact as seen by the
/// migration controller.
///
/// The controller owns sequencing (snapshot, attempt, retry, rollback); the
/// target owns the actual state transition. `apply` should observe `token`
/// at safe points so a cascade deadline can interrupt a long migration.
pub trait MigrationTarget {
    /// The currently live version
    fn version(&self) -> SemVersion;

    /// Serialize the observable state for snapshotting
    fn snapshot_state(&self) -> Vec<u8>;

    /// Transition the live state to `to`. Called under the controller's
    /// timeout/retry budget; may fail and be retried.
    fn apply(&mut self, to: SemVersion, token: &CancelToken) -> Result<()>;

    /// Restore state previously captured by `snapshot_state`.
    ///
    /// After this returns the observable state must be byte-identical to
    /// what `snapshot_state` produced.
    fn restore(&mut self, version: SemVersion, state: &[u8]) -> Result<()>;
}
