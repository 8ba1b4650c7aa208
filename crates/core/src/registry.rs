//! Registered version history per artifact family
//!
//! The registry records which versions of each artifact family have been
//! built and can answer "what is the lowest version satisfying this
//! requirement without a breaking jump". History per family is bounded;
//! the oldest registered version is evicted first.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::compat::{self, Compatibility};
use crate::error::{HotswapError, Result};
use crate::version::SemVersion;

/// Thread-safe registry of known versions, keyed by artifact family name.
pub struct VersionRegistry {
    /// Versions per family, kept sorted ascending. Bounded by `history_bound`.
    families: RwLock<FxHashMap<String, Vec<SemVersion>>>,
    history_bound: usize,
}

impl VersionRegistry {
    /// Create a registry keeping at most `history_bound` versions per family
    pub fn new(history_bound: usize) -> Self {
        VersionRegistry {
            families: RwLock::new(FxHashMap::default()),
            history_bound,
        }
    }

    /// Record a version for a family.
    ///
    /// Duplicate registrations are no-ops. When the bound is exceeded the
    /// oldest (lowest) version is evicted.
    pub fn register(&self, family: &str, version: SemVersion) {
        let mut families = self.families.write();
        let versions = families.entry(family.to_string()).or_default();
        match versions.binary_search(&version) {
            Ok(_) => {}
            Err(pos) => {
                versions.insert(pos, version);
                if versions.len() > self.history_bound {
                    versions.remove(0);
                }
            }
        }
    }

    /// Remove a version from a family.
    ///
    /// Returns `NotFound` if the family or version was never registered.
    pub fn unregister(&self, family: &str, version: SemVersion) -> Result<()> {
        let mut families = self.families.write();
        let versions = families
            .get_mut(family)
            .ok_or_else(|| HotswapError::not_found(format!("artifact family '{}'", family)))?;
        match versions.binary_search(&version) {
            Ok(pos) => {
                versions.remove(pos);
                if versions.is_empty() {
                    families.remove(family);
                }
                Ok(())
            }
            Err(_) => Err(HotswapError::not_found(format!(
                "version {} of '{}'",
                version, family
            ))),
        }
    }

    /// The newest registered version of a family, if any
    pub fn latest(&self, family: &str) -> Option<SemVersion> {
        self.families
            .read()
            .get(family)
            .and_then(|v| v.last().copied())
    }

    /// All registered versions of a family, newest first
    pub fn versions(&self, family: &str) -> Vec<SemVersion> {
        self.families
            .read()
            .get(family)
            .map(|v| v.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    /// Find the lowest registered version `>= required` that is adoptable
    /// (compatible or migratable, never a breaking jump) relative to
    /// `required`.
    ///
    /// The ascending scan makes the tie-break deterministic: the smallest
    /// satisfying version wins.
    pub fn find_compatible(&self, family: &str, required: SemVersion) -> Result<SemVersion> {
        let families = self.families.read();
        let versions = families
            .get(family)
            .ok_or_else(|| HotswapError::not_found(format!("artifact family '{}'", family)))?;
        versions
            .iter()
            .filter(|v| **v >= required)
            .find(|v| {
                compat::check(required, **v).classification != Compatibility::MajorBreaking
            })
            .copied()
            .ok_or_else(|| {
                HotswapError::not_found(format!(
                    "no version of '{}' compatible with {}",
                    family, required
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(family: &str, versions: &[SemVersion]) -> VersionRegistry {
        let registry = VersionRegistry::new(16);
        for v in versions {
            registry.register(family, *v);
        }
        registry
    }

    #[test]
    fn test_latest_and_versions_newest_first() {
        let r = registry_with(
            "mods/ai.so",
            &[
                SemVersion::new(1, 0, 0),
                SemVersion::new(1, 2, 0),
                SemVersion::new(1, 1, 0),
            ],
        );
        assert_eq!(r.latest("mods/ai.so"), Some(SemVersion::new(1, 2, 0)));
        assert_eq!(
            r.versions("mods/ai.so"),
            vec![
                SemVersion::new(1, 2, 0),
                SemVersion::new(1, 1, 0),
                SemVersion::new(1, 0, 0),
            ]
        );
    }

    #[test]
    fn test_register_is_idempotent() {
        let r = registry_with("a", &[SemVersion::new(1, 0, 0)]);
        r.register("a", SemVersion::new(1, 0, 0));
        assert_eq!(r.versions("a").len(), 1);
    }

    #[test]
    fn test_history_bound_evicts_oldest() {
        let r = VersionRegistry::new(2);
        r.register("a", SemVersion::new(1, 0, 0));
        r.register("a", SemVersion::new(1, 1, 0));
        r.register("a", SemVersion::new(1, 2, 0));
        assert_eq!(
            r.versions("a"),
            vec![SemVersion::new(1, 2, 0), SemVersion::new(1, 1, 0)]
        );
    }

    #[test]
    fn test_find_compatible_picks_lowest_satisfying() {
        let r = registry_with(
            "a",
            &[
                SemVersion::new(1, 1, 0),
                SemVersion::new(1, 3, 0),
                SemVersion::new(1, 2, 0),
                SemVersion::new(2, 0, 0),
            ],
        );
        let found = r.find_compatible("a", SemVersion::new(1, 2, 0)).unwrap();
        assert_eq!(found, SemVersion::new(1, 2, 0));
    }

    #[test]
    fn test_find_compatible_skips_breaking_major() {
        let r = registry_with("a", &[SemVersion::new(2, 0, 0), SemVersion::new(3, 0, 0)]);
        // Only majors above the requirement exist; every candidate is breaking
        let err = r.find_compatible("a", SemVersion::new(1, 0, 0)).unwrap_err();
        assert!(matches!(err, HotswapError::NotFound(_)));
    }

    #[test]
    fn test_find_compatible_ignores_older_versions() {
        let r = registry_with("a", &[SemVersion::new(1, 0, 0), SemVersion::new(1, 5, 0)]);
        let found = r.find_compatible("a", SemVersion::new(1, 2, 0)).unwrap();
        assert_eq!(found, SemVersion::new(1, 5, 0));
    }

    #[test]
    fn test_unregister_unknown_reports_not_found() {
        let r = VersionRegistry::new(4);
        assert!(r.unregister("ghost", SemVersion::new(1, 0, 0)).is_err());
    }
}
