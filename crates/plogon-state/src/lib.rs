//! Persistent repository state for the plugin build orchestrator.
//!
//! The state file is the single source of truth for "have" decisions: it
//! records, per channel and plugin, what was last built, and an
//! append-only ledger of reviewed needs. It is mutated only by the
//! orchestrator, and persisted after every mutation with a write-temp,
//! then-rename so no reader ever observes a partially written document
//! (spec §3, §4.2, §6).
//!
//! # Example
//!
//! ```
//! use plogon_state::{StateStore, state_path};
//! use plogon_types::{NeedKind, ReviewedNeed};
//! use chrono::Utc;
//! use std::path::Path;
//!
//! let store = StateStore::new(Path::new(".plogon"));
//! let mut state = store.load().expect("load");
//!
//! store.update_plugin_have(
//!     &mut state,
//!     "stable",
//!     "FooPlugin",
//!     "abc123abc123abc123abc123abc123abc123abcd",
//!     "1.0.0",
//!     Some("initial release"),
//!     None,
//!     None,
//! ).expect("update");
//!
//! assert!(state.get_plugin_state("stable", "FooPlugin").is_some());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use plogon_types::{
    ChannelState, Need, NeedKind, PluginChangelog, PluginState, RepositoryState, ReviewedNeed,
};

/// Default state file name.
pub const STATE_FILE: &str = "plogon-state.toml";

/// The state file path for a state directory.
pub fn state_path(state_dir: &Path) -> PathBuf {
    state_dir.join(STATE_FILE)
}

/// Persistent store for the repository state ledger.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a new state store at the given directory.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_path(state_dir),
        }
    }

    /// Path to the underlying state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the state file exists on disk.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load state from disk, or an empty ledger if the file is absent
    /// (spec §4.2: "creates empty if absent").
    pub fn load(&self) -> Result<RepositoryState> {
        if !self.path.exists() {
            return Ok(RepositoryState::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read state file {}", self.path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("failed to parse state document {}", self.path.display()))
    }

    /// Persist state to disk via write-temp-then-rename, so a crash or
    /// concurrent reader never observes a partial write.
    pub fn save(&self, state: &RepositoryState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state dir {}", parent.display()))?;
        }

        let tmp_path = self.path.with_extension("toml.tmp");

        let document =
            toml::to_string_pretty(state).context("failed to serialize state document")?;

        fs::write(&tmp_path, document)
            .with_context(|| format!("failed to write state file {}", tmp_path.display()))?;

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename state file to {}", self.path.display()))?;

        Ok(())
    }

    /// Delete the state entry for `(channel, internal_name)`, then
    /// persist (spec §4.2: `removePlugin`).
    pub fn remove_plugin(
        &self,
        state: &mut RepositoryState,
        channel: &str,
        internal_name: &str,
    ) -> Result<()> {
        if let Some(channel_state) = state.channels.get_mut(channel) {
            channel_state.plugins.remove(internal_name);
        }
        self.save(state)
    }

    /// Upsert a plugin's built state and, if `changelog` is non-empty,
    /// append a [`PluginChangelog`] entry keyed by `effective_version`.
    /// Persists on every call (spec §4.2: `updatePluginHave`).
    #[allow(clippy::too_many_arguments)]
    pub fn update_plugin_have(
        &self,
        state: &mut RepositoryState,
        channel: &str,
        internal_name: &str,
        built_commit: &str,
        effective_version: &str,
        changelog: Option<&str>,
        used_needs: Option<Vec<Need>>,
        reviewer: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        let channel_state = state.channels.entry(channel.to_string()).or_default();
        let plugin = channel_state
            .plugins
            .entry(internal_name.to_string())
            .or_insert_with(|| PluginState {
                built_commit: built_commit.to_string(),
                time_built: now,
                effective_version: effective_version.to_string(),
                minimum_version: None,
                changelogs: Default::default(),
            });

        plugin.built_commit = built_commit.to_string();
        plugin.time_built = now;
        plugin.effective_version = effective_version.to_string();

        if let Some(text) = changelog.filter(|c| !c.is_empty()) {
            plugin.changelogs.insert(
                effective_version.to_string(),
                PluginChangelog {
                    time_released: now,
                    changelog: Some(text.to_string()),
                    used_needs,
                    reviewer: reviewer.map(str::to_string),
                },
            );
        }

        self.save(state)
    }

    /// Record a new reviewed-needs ledger entry and persist (spec §4.2:
    /// `addReviewedNeed`).
    pub fn add_reviewed_need(
        &self,
        state: &mut RepositoryState,
        kind: NeedKind,
        key: &str,
        version: &str,
        reviewer: &str,
        reviewed_at: DateTime<Utc>,
    ) -> Result<()> {
        state.reviewed_needs.push(ReviewedNeed {
            kind,
            key: key.to_string(),
            version: version.to_string(),
            reviewer: reviewer.to_string(),
            reviewed_at,
        });
        self.save(state)
    }
}

// Re-exported for callers that only need the ledger type, not the
// persistence machinery.
pub use plogon_types::RepositoryState as State;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_gives_empty_state() {
        let td = tempdir().expect("tempdir");
        let store = StateStore::new(td.path());
        assert!(!store.exists());

        let state = store.load().expect("load");
        assert!(state.channels.is_empty());
        assert!(state.reviewed_needs.is_empty());
    }

    #[test]
    fn update_plugin_have_round_trips() {
        let td = tempdir().expect("tempdir");
        let store = StateStore::new(td.path());
        let mut state = store.load().expect("load");

        store
            .update_plugin_have(
                &mut state,
                "stable",
                "FooPlugin",
                "abc123abc123abc123abc123abc123abc123abcd",
                "1.0.0",
                Some("initial release"),
                None,
                Some("alice"),
            )
            .expect("update");

        assert!(store.exists());

        let reloaded = store.load().expect("reload");
        let plugin = reloaded
            .get_plugin_state("stable", "FooPlugin")
            .expect("plugin present");
        assert_eq!(plugin.built_commit, "abc123abc123abc123abc123abc123abc123abcd");
        assert_eq!(plugin.effective_version, "1.0.0");
        assert_eq!(
            plugin.changelogs.get("1.0.0").and_then(|c| c.changelog.as_deref()),
            Some("initial release")
        );
        assert!(reloaded.is_plugin_in_any_channel("FooPlugin"));
    }

    #[test]
    fn update_plugin_have_skips_changelog_when_empty() {
        let td = tempdir().expect("tempdir");
        let store = StateStore::new(td.path());
        let mut state = store.load().expect("load");

        store
            .update_plugin_have(&mut state, "stable", "FooPlugin", "c".repeat(40).as_str(), "1.0.0", Some(""), None, None)
            .expect("update");

        assert!(state.get_plugin_state("stable", "FooPlugin").unwrap().changelogs.is_empty());
    }

    #[test]
    fn remove_plugin_drops_it_from_any_channel() {
        let td = tempdir().expect("tempdir");
        let store = StateStore::new(td.path());
        let mut state = store.load().expect("load");

        store
            .update_plugin_have(&mut state, "testing-live", "BarPlugin", "d".repeat(40).as_str(), "1.0.0", None, None, None)
            .expect("update");
        assert!(state.is_plugin_in_any_channel("BarPlugin"));

        store
            .remove_plugin(&mut state, "testing-live", "BarPlugin")
            .expect("remove");
        assert!(!state.is_plugin_in_any_channel("BarPlugin"));

        let reloaded = store.load().expect("reload");
        assert!(!reloaded.is_plugin_in_any_channel("BarPlugin"));
    }

    #[test]
    fn add_reviewed_need_persists_and_is_queryable() {
        let td = tempdir().expect("tempdir");
        let store = StateStore::new(td.path());
        let mut state = store.load().expect("load");

        store
            .add_reviewed_need(
                &mut state,
                NeedKind::Package,
                "Acme.Widgets",
                "2.0.0",
                "alice",
                Utc::now(),
            )
            .expect("add");

        assert!(state.is_need_reviewed(NeedKind::Package, "Acme.Widgets", "2.0.0"));
        let reloaded = store.load().expect("reload");
        assert!(reloaded.is_need_reviewed(NeedKind::Package, "Acme.Widgets", "2.0.0"));
    }

    #[test]
    fn save_never_leaves_a_tmp_file_behind() {
        let td = tempdir().expect("tempdir");
        let store = StateStore::new(td.path());
        let state = RepositoryState::default();
        store.save(&state).expect("save");

        assert!(store.exists());
        assert!(!store.path().with_extension("toml.tmp").exists());
    }
}
