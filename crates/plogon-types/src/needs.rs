//! Externally introduced artifacts and their review status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The runtime classification domain for needs discovered during a build.
/// Wider than [`crate::DeclaredNeedKind`]: build output also surfaces
/// resolved packages, which manifests never declare directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedKind {
    /// A resolved package from the project's lockfile.
    Package,
    /// An externally hosted file.
    File,
    /// A git submodule at a pinned commit.
    Submodule,
}

/// A unit of externally introduced material, discovered by classifying a
/// build's output (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Need {
    /// Which kind of need this is.
    pub kind: NeedKind,
    /// Package name, file url/dest, or submodule path — the key used to
    /// match against the reviewed-needs ledger.
    pub name: String,
    /// Resolved version (package version, file sha512, submodule commit).
    pub version: String,
    /// A prior version found in state for the same `(kind, name)`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_version: Option<String>,
    /// A diff URL between `old_version` and `version`, if one could be
    /// computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_url: Option<String>,
    /// Identity of the reviewer who approved this need, once reviewed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
}

/// The outcome of classifying a [`Need`] against the reviewed-needs
/// ledger and prior plugin state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeedVerdict {
    /// `(kind, name, version)` matches an entry in `reviewed_needs`.
    Reviewed {
        /// The reviewer recorded against the matching ledger entry.
        reviewer: String,
    },
    /// No exact match, but a strictly older version of the same
    /// `(kind, name)` exists in state.
    Update {
        /// The previously built/reviewed version.
        old_version: String,
        /// A link to a diff between `old_version` and the new version,
        /// when the need kind supports one.
        diff_url: Option<String>,
    },
    /// No match and no prior version on record.
    New,
}

impl NeedVerdict {
    /// Whether this verdict blocks a commit-mode task (spec §4.8, §7).
    pub fn is_unreviewed(&self) -> bool {
        !matches!(self, NeedVerdict::Reviewed { .. })
    }
}

/// An append-only, persisted approval record: `state.reviewed_needs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewedNeed {
    /// Which kind of need this approval covers.
    pub kind: NeedKind,
    /// The key (package name, file identifier, submodule path).
    pub key: String,
    /// The approved version.
    pub version: String,
    /// Identity of the reviewer who approved it.
    pub reviewer: String,
    /// When the approval was recorded.
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewedNeed {
    /// Whether this ledger entry matches a discovered `(kind, key, version)`.
    pub fn matches(&self, kind: NeedKind, key: &str, version: &str) -> bool {
        self.kind == kind && self.key == key && self.version == version
    }
}
