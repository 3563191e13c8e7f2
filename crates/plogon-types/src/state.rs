//! The persistent repository-state ledger (spec §3, §4.2).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::needs::{Need, ReviewedNeed};

/// The whole ledger: per-channel plugin state, plus the append-only
/// reviewed-needs list. This is the single source of truth for "have"
/// decisions (spec §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryState {
    /// Per-channel plugin state, keyed by channel id (`"stable"`,
    /// `"testing-live"`, ...).
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelState>,
    /// Approved `(kind, key, version, reviewer)` tuples, oldest first.
    #[serde(default)]
    pub reviewed_needs: Vec<ReviewedNeed>,
}

/// Plugin state for a single channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelState {
    /// Plugin state keyed by internal (directory) name.
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginState>,
}

/// What's currently built for one plugin in one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginState {
    /// The commit that was last built.
    pub built_commit: String,
    /// When that build completed.
    pub time_built: DateTime<Utc>,
    /// The effective version produced by that build.
    pub effective_version: String,
    /// A minimum version floor, if one has been configured.
    #[serde(default)]
    pub minimum_version: Option<String>,
    /// Per-version changelog and needs-used history, newest entries
    /// added as new versions are committed.
    #[serde(default)]
    pub changelogs: BTreeMap<String, PluginChangelog>,
}

/// One version's worth of history for a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginChangelog {
    /// When this version was released.
    pub time_released: DateTime<Utc>,
    /// Free-text changelog, if the manifest supplied one.
    #[serde(default)]
    pub changelog: Option<String>,
    /// The needs this build used, captured for later "update" comparisons.
    #[serde(default)]
    pub used_needs: Option<Vec<Need>>,
    /// Identity of the reviewer who committed this version.
    #[serde(default)]
    pub reviewer: Option<String>,
}

impl RepositoryState {
    /// Look up plugin state for `(channel, internal_name)`.
    pub fn get_plugin_state(&self, channel: &str, internal_name: &str) -> Option<&PluginState> {
        self.channels.get(channel)?.plugins.get(internal_name)
    }

    /// Whether this plugin has state recorded in *any* channel (spec
    /// §4.7: `is_new_plugin` derives from the negation of this).
    pub fn is_plugin_in_any_channel(&self, internal_name: &str) -> bool {
        self.channels
            .values()
            .any(|c| c.plugins.contains_key(internal_name))
    }

    /// Whether `(kind, key, version)` has been approved.
    pub fn is_need_reviewed(&self, kind: crate::NeedKind, key: &str, version: &str) -> bool {
        self.reviewed_needs
            .iter()
            .any(|entry| entry.matches(kind, key, version))
    }

    /// The most recent version on record for `(kind, key)` strictly less
    /// than `version`, used by the needs engine to classify "update"
    /// verdicts (spec §4.8). Ordering is by semver-like string compare of
    /// the ledger order of appearance, which is sufficient because
    /// versions are appended in build order.
    pub fn prior_need_version(&self, kind: crate::NeedKind, key: &str) -> Option<&str> {
        self.reviewed_needs
            .iter()
            .filter(|entry| entry.kind == kind && entry.key == key)
            .map(|entry| entry.version.as_str())
            .last()
    }
}
