//! Semantic version value type
//!
//! `SemVersion` is an immutable `major.minor.patch.build` quadruple with a
//! small set of stability flags. The total order compares major, then minor,
//! then patch, then build; flags never participate in ordering or identity,
//! they are metadata describing the release channel.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use crate::error::{HotswapError, Result};

/// Stability flags attached to a version.
///
/// Stored as a bit set. Flags describe the release, they do not affect
/// version identity or ordering; the one exception in behavior is
/// [`VersionFlags::BREAKING`], which compatibility checking treats as a
/// forced migration marker even across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionFlags(u32);

impl VersionFlags {
    /// No flags set
    pub const NONE: VersionFlags = VersionFlags(0);
    /// Stable release
    pub const STABLE: VersionFlags = VersionFlags(0x0001);
    /// Beta testing release
    pub const BETA: VersionFlags = VersionFlags(0x0002);
    /// Long-term support release
    pub const LTS: VersionFlags = VersionFlags(0x0004);
    /// Contains breaking changes regardless of version distance
    pub const BREAKING: VersionFlags = VersionFlags(0x0008);

    /// Whether every flag in `other` is set in `self`
    pub const fn contains(self, other: VersionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flags are set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for VersionFlags {
    type Output = VersionFlags;

    fn bitor(self, rhs: VersionFlags) -> VersionFlags {
        VersionFlags(self.0 | rhs.0)
    }
}

/// An immutable semantic version: `major.minor.patch.build` plus flags.
///
/// # Ordering and identity
///
/// Two versions are equal iff their four numeric components are equal; flags
/// are excluded from `Eq`, `Ord`, and `Hash` so that `1.2.3` tagged `BETA`
/// and `1.2.3` tagged `STABLE` refer to the same point in version space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SemVersion {
    /// Major version; breaking changes increment this
    pub major: u32,
    /// Minor version; new features increment this
    pub minor: u32,
    /// Patch version; bug fixes increment this
    pub patch: u32,
    /// Build number, auto-incremented per build
    pub build: u32,
    /// Release channel flags
    #[serde(default)]
    pub flags: VersionFlags,
}

impl SemVersion {
    /// Create a version with build 0 and no flags
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        SemVersion {
            major,
            minor,
            patch,
            build: 0,
            flags: VersionFlags::NONE,
        }
    }

    /// Set the build number
    pub const fn with_build(mut self, build: u32) -> Self {
        self.build = build;
        self
    }

    /// Set the release flags
    pub const fn with_flags(mut self, flags: VersionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether this version carries the `BREAKING` flag
    pub const fn is_breaking(&self) -> bool {
        self.flags.contains(VersionFlags::BREAKING)
    }

    /// The numeric quadruple, for ordering and storage keys
    pub const fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.major, self.minor, self.patch, self.build)
    }
}

impl PartialEq for SemVersion {
    fn eq(&self, other: &Self) -> bool {
        self.as_tuple() == other.as_tuple()
    }
}

impl Eq for SemVersion {}

impl std::hash::Hash for SemVersion {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_tuple().hash(state);
    }
}

impl PartialOrd for SemVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_tuple().cmp(&other.as_tuple())
    }
}

impl fmt::Display for SemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.build != 0 {
            write!(f, ".{}", self.build)?;
        }
        if self.flags.contains(VersionFlags::BETA) {
            write!(f, "-beta")?;
        }
        if self.flags.contains(VersionFlags::LTS) {
            write!(f, "-lts")?;
        }
        Ok(())
    }
}

impl FromStr for SemVersion {
    type Err = HotswapError;

    /// Parse `"major.minor.patch"` or `"major.minor.patch.build"`.
    ///
    /// Flags are not part of the textual form; they come from module
    /// metadata, not from the version string.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(HotswapError::invalid_input(format!(
                "invalid version string '{}': expected major.minor.patch[.build]",
                s
            )));
        }
        let mut nums = [0u32; 4];
        for (i, part) in parts.iter().enumerate() {
            nums[i] = part.parse::<u32>().map_err(|_| {
                HotswapError::invalid_input(format!(
                    "invalid version component '{}' in '{}'",
                    part, s
                ))
            })?;
        }
        Ok(SemVersion {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            build: nums[3],
            flags: VersionFlags::NONE,
        })
    }
}
