//! Structured outcome records published to the event sink
//!
//! Every artifact touched by a cascade produces exactly one outcome record.
//! Dashboards and metrics collectors consume these; the engine itself never
//! reads them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ArtifactPath, CascadeId};
use crate::version::SemVersion;

/// Terminal outcome for one artifact within a cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReloadOutcome {
    /// New version validated, migrated, and swapped in
    Committed,
    /// Migration failed; the pre-migration snapshot was restored
    RolledBack,
    /// The previous known-good binary was activated
    Fallback,
    /// Artifact marked unusable until manually cleared
    Disabled,
    /// Left on its old version because the cascade truncated above it
    Stale,
    /// Not processed (disabled artifact, halted or cancelled cascade)
    Skipped,
}

/// One outcome record, emitted per artifact per cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadEvent {
    /// The artifact this record describes
    pub artifact: ArtifactPath,
    /// What happened to it
    pub outcome: ReloadOutcome,
    /// Version now live for the artifact, when known
    pub version: Option<SemVersion>,
    /// Cascade this record belongs to
    pub cascade: CascadeId,
    /// When the outcome was reached
    pub timestamp: DateTime<Utc>,
}

/// Aggregate statistics for a completed (or aborted) cascade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeStats {
    /// Artifacts in the computed reload set
    pub affected: usize,
    /// Artifacts that committed their new version
    pub succeeded: usize,
    /// Artifacts that ended in rollback, fallback, or disable
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_for_dashboards() {
        let event = ReloadEvent {
            artifact: ArtifactPath::new("shaders/water.metal"),
            outcome: ReloadOutcome::Committed,
            version: Some(SemVersion::new(1, 2, 0)),
            cascade: CascadeId::new(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ReloadEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_stats_default_is_zeroed() {
        let stats = CascadeStats::default();
        assert_eq!(stats.affected, 0);
        assert_eq!(stats.succeeded, 0);
        assert_eq!(stats.failed, 0);
    }
}
