//! Artifact identity types
//!
//! An artifact is any hot-reloadable unit: a compiled code module, a shader,
//! a texture, or a configuration blob. Artifacts are identified by their
//! source path, which is the unique key throughout the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique key for a hot-reloadable artifact.
///
/// Wraps the source path string. Equality and hashing are on the full path;
/// no normalization is performed (the change source is expected to deliver
/// canonical paths).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactPath(String);

impl ArtifactPath {
    /// Create an artifact path from any string-like value
    pub fn new(path: impl Into<String>) -> Self {
        ArtifactPath(path.into())
    }

    /// The path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactPath {
    fn from(s: &str) -> Self {
        ArtifactPath(s.to_string())
    }
}

impl From<String> for ArtifactPath {
    fn from(s: String) -> Self {
        ArtifactPath(s)
    }
}

/// What kind of artifact a graph node refers to.
///
/// Nodes created implicitly by an edge reference start as `Unknown` and are
/// refined when the artifact itself is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Referenced but not yet registered
    Unknown,
    /// Compiled code module (shared library)
    Module,
    /// Shader source
    Shader,
    /// Texture or other binary asset
    Texture,
    /// Configuration file
    Config,
}

/// 64-bit content hash of an artifact's source or binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub u64);

impl ContentHash {
    /// Hash raw content with XXH3
    pub fn of(bytes: &[u8]) -> Self {
        ContentHash(xxhash_rust::xxh3::xxh3_64(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Unique identifier for one cascade execution.
///
/// Every change event processed by the orchestrator gets a fresh cascade id;
/// all outcome events emitted for that change carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CascadeId(Uuid);

impl CascadeId {
    /// Generate a new random cascade id
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        CascadeId(Uuid::new_v4())
    }
}

impl fmt::Display for CascadeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
