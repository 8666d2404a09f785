//! Toolchain identifiers.
//!
//! A libc++ build is identified either by a tagged release version or by the
//! date of a trunk snapshot. The two forms are mutually exclusive and share a
//! single total order in which every release sorts before every snapshot.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A tagged release, e.g. `16.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
    #[serde(default)]
    pub patchlevel: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patchlevel: u32) -> Self {
        Self {
            major,
            minor,
            patchlevel,
        }
    }

    /// Parse a dotted version. Missing components default to zero.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        let patchlevel = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patchlevel))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patchlevel)
    }
}

/// The build date of a trunk snapshot, e.g. `trunk-20230301`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Datestamp {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

impl Datestamp {
    pub fn new(year: u32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Parse the `YYYYMMDD` portion of a snapshot name.
    pub fn parse_compact(s: &str) -> Option<Self> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(
            s[0..4].parse().ok()?,
            s[4..6].parse().ok()?,
            s[6..8].parse().ok()?,
        ))
    }
}

impl fmt::Display for Datestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trunk-{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

/// Either a release version or a snapshot date.
///
/// Serialized as a union tagged on `"kind"`, matching the `identifier`
/// field of `info.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identifier {
    Version(Version),
    Datestamp(Datestamp),
}

impl Identifier {
    pub fn is_version(&self) -> bool {
        matches!(self, Self::Version(_))
    }

    pub fn as_version(&self) -> Option<&Version> {
        match self {
            Self::Version(v) => Some(v),
            Self::Datestamp(_) => None,
        }
    }
}

impl Ord for Identifier {
    // Snapshots are trunk builds and compare newer than any tagged release.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Version(a), Self::Version(b)) => a.cmp(b),
            (Self::Datestamp(a), Self::Datestamp(b)) => a.cmp(b),
            (Self::Version(_), Self::Datestamp(_)) => Ordering::Less,
            (Self::Datestamp(_), Self::Version(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(v) => v.fmt(f),
            Self::Datestamp(d) => d.fmt(f),
        }
    }
}

impl From<Version> for Identifier {
    fn from(v: Version) -> Self {
        Self::Version(v)
    }
}

impl From<Datestamp> for Identifier {
    fn from(d: Datestamp) -> Self {
        Self::Datestamp(d)
    }
}
