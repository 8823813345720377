//! Runtime API Version Catalogue
//!
//! Provides the build-time catalogue of runtime API versions read from Cargo.toml
//! metadata (`package.metadata.plinth`). Plugins declare the version they target
//! in their manifest; the declared string is resolved against this catalogue.
//!
//! To publish a new API version:
//! 1. Append it to `package.metadata.plinth.api_versions`
//! 2. Point `package.metadata.plinth.current` at it
//! 3. Build - the catalogue is regenerated

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};

// Include the build-generated catalogue constants
include!(concat!(env!("OUT_DIR"), "/version_catalogue.rs"));

/// Result of comparing two runtime versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComparison {
    Less,
    Equal,
    Greater,
    /// At least one side is the `Unavailable` sentinel
    Incomparable,
}

impl VersionComparison {
    /// Numeric form: -1, 0, 1, or `None` when incomparable
    pub fn as_signum(self) -> Option<i8> {
        match self {
            VersionComparison::Less => Some(-1),
            VersionComparison::Equal => Some(0),
            VersionComparison::Greater => Some(1),
            VersionComparison::Incomparable => None,
        }
    }
}

/// A runtime API version: a position in the known catalogue, or the
/// `Unavailable` sentinel for strings the catalogue does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeVersion {
    Known(usize),
    Unavailable,
}

impl RuntimeVersion {
    /// The version provided by this build of the runtime
    pub fn current() -> Self {
        RuntimeVersion::Known(CURRENT_API_VERSION_ORDINAL)
    }

    /// Resolve a raw version string as written by a plugin author.
    ///
    /// Surrounding whitespace is ignored; anything not in the catalogue
    /// resolves to [`RuntimeVersion::Unavailable`].
    pub fn resolve(raw: &str) -> Self {
        let wanted = raw.trim();
        API_VERSION_LABELS
            .iter()
            .position(|label| *label == wanted)
            .map(RuntimeVersion::Known)
            .unwrap_or(RuntimeVersion::Unavailable)
    }

    /// All known versions in release order
    pub fn catalogue() -> impl Iterator<Item = RuntimeVersion> {
        (0..API_VERSION_LABELS.len()).map(RuntimeVersion::Known)
    }

    pub fn ordinal(&self) -> Option<usize> {
        match self {
            RuntimeVersion::Known(ordinal) => Some(*ordinal),
            RuntimeVersion::Unavailable => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RuntimeVersion::Known(ordinal) => API_VERSION_LABELS
                .get(*ordinal)
                .copied()
                .unwrap_or("unavailable"),
            RuntimeVersion::Unavailable => "unavailable",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RuntimeVersion::Known(_))
    }

    /// Compare by catalogue position
    pub fn compare(&self, other: &RuntimeVersion) -> VersionComparison {
        match (self, other) {
            (RuntimeVersion::Known(a), RuntimeVersion::Known(b)) => match a.cmp(b) {
                Ordering::Less => VersionComparison::Less,
                Ordering::Equal => VersionComparison::Equal,
                Ordering::Greater => VersionComparison::Greater,
            },
            _ => VersionComparison::Incomparable,
        }
    }

    /// Whether a plugin targeting `self` may run on a runtime providing `running`
    pub fn is_supported_by(&self, running: &RuntimeVersion) -> bool {
        matches!(
            self.compare(running),
            VersionComparison::Less | VersionComparison::Equal
        )
    }
}

impl PartialOrd for RuntimeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.compare(other) {
            VersionComparison::Less => Some(Ordering::Less),
            VersionComparison::Equal => Some(Ordering::Equal),
            VersionComparison::Greater => Some(Ordering::Greater),
            VersionComparison::Incomparable => None,
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for RuntimeVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
