//! Version compatibility classification
//!
//! Pure functions deciding whether a version transition can be adopted
//! in place, needs a migration, or is a breaking jump. The rules, in
//! priority order:
//!
//! 1. Different major version → [`Compatibility::MajorBreaking`]
//! 2. Different minor version, or either side flagged `BREAKING` →
//!    [`Compatibility::MigrationRequired`]
//! 3. Otherwise → [`Compatibility::Compatible`]
//!
//! A consuming module may additionally declare the API version range it
//! supports; a target version outside that range is breaking regardless of
//! distance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

use crate::version::SemVersion;

/// Classification of a version transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compatibility {
    /// The new version can be swapped in directly
    Compatible,
    /// A migration step is required but possible
    MigrationRequired,
    /// Major version mismatch; migration cannot be automatic
    MajorBreaking,
}

/// Recommended actions accompanying a classification, as a small bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecommendedActions(u8);

impl RecommendedActions {
    /// No action required
    pub const NONE: RecommendedActions = RecommendedActions(0);
    /// Snapshot current state before touching the artifact
    pub const BACKUP_REQUIRED: RecommendedActions = RecommendedActions(0x01);
    /// Migration can be driven automatically
    pub const MIGRATE_AUTOMATIC: RecommendedActions = RecommendedActions(0x02);
    /// Migration needs a manual override
    pub const MIGRATE_MANUAL: RecommendedActions = RecommendedActions(0x04);

    /// Whether every action in `other` is recommended
    pub const fn contains(self, other: RecommendedActions) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no action is recommended
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for RecommendedActions {
    type Output = RecommendedActions;

    fn bitor(self, rhs: RecommendedActions) -> RecommendedActions {
        RecommendedActions(self.0 | rhs.0)
    }
}

/// Result of a compatibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatReport {
    /// How the transition is classified
    pub classification: Compatibility,
    /// What the caller should do about it
    pub actions: RecommendedActions,
}

impl CompatReport {
    /// Whether the transition can proceed without manual intervention
    pub fn is_adoptable(&self) -> bool {
        self.classification != Compatibility::MajorBreaking
    }
}

impl fmt::Display for CompatReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.classification {
            Compatibility::Compatible => write!(f, "compatible"),
            Compatibility::MigrationRequired => write!(f, "migration required"),
            Compatibility::MajorBreaking => write!(f, "major breaking"),
        }
    }
}

/// Inclusive API version range a consuming module declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRange {
    /// Lowest supported version
    pub min: SemVersion,
    /// Highest supported version
    pub max: SemVersion,
}

impl ApiRange {
    /// Whether `version` falls inside the range
    pub fn contains(&self, version: SemVersion) -> bool {
        self.min <= version && version <= self.max
    }
}

/// Classify the transition from the currently loaded `from` to the newly
/// built `to`.
pub fn check(from: SemVersion, to: SemVersion) -> CompatReport {
    if to.major != from.major {
        return CompatReport {
            classification: Compatibility::MajorBreaking,
            actions: RecommendedActions::BACKUP_REQUIRED | RecommendedActions::MIGRATE_MANUAL,
        };
    }
    if to.minor != from.minor || from.is_breaking() || to.is_breaking() {
        return CompatReport {
            classification: Compatibility::MigrationRequired,
            actions: RecommendedActions::BACKUP_REQUIRED | RecommendedActions::MIGRATE_AUTOMATIC,
        };
    }
    CompatReport {
        classification: Compatibility::Compatible,
        actions: RecommendedActions::NONE,
    }
}

/// Classify a transition for a consumer that declares a supported API range.
///
/// A target version outside the consumer's declared range is breaking even
/// when the numeric distance alone would allow migration.
pub fn check_against_range(
    from: SemVersion,
    to: SemVersion,
    supported: Option<&ApiRange>,
) -> CompatReport {
    if let Some(range) = supported {
        if !range.contains(to) {
            return CompatReport {
                classification: Compatibility::MajorBreaking,
                actions: RecommendedActions::BACKUP_REQUIRED
                    | RecommendedActions::MIGRATE_MANUAL,
            };
        }
    }
    check(from, to)
}
