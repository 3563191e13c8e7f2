//! Planned build/remove work items (spec §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Channel, Manifest};

/// Whether a [`BuildTask`] builds a plugin or removes its last-built
/// state because its manifest disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Run the build pipeline for this plugin.
    Build,
    /// Drop the plugin's state and published artifacts.
    Remove,
}

/// One unit of planned work, produced exactly once per orchestrator run
/// by the task planner (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTask {
    /// The plugin's directory name.
    pub internal_name: String,
    /// Which channel this task applies to.
    pub channel: Channel,
    /// The manifest driving this task. Always `None` for `Remove` tasks.
    pub manifest: Option<Manifest>,
    /// The commit previously recorded in state, if any.
    pub have_commit: Option<String>,
    /// The version previously recorded in state, if any.
    pub have_version: Option<String>,
    /// The build time previously recorded in state, if any.
    pub have_time: Option<DateTime<Utc>>,
    /// Build or remove.
    pub kind: TaskKind,
    /// This plugin has no state in any channel.
    pub is_new_plugin: bool,
    /// This plugin has state, but not in this channel.
    pub is_new_in_channel: bool,
    /// The manifest's repository host is github.com.
    pub is_github: bool,
    /// The manifest's repository host is gitlab.com.
    pub is_gitlab: bool,
}

impl BuildTask {
    /// Classify the repository host of `url` into the `is_github`/
    /// `is_gitlab` flags (spec §4.7).
    pub fn host_flags(url: &str) -> (bool, bool) {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase));
        match host.as_deref() {
            Some("github.com") => (true, false),
            Some("gitlab.com") => (false, true),
            _ => (false, false),
        }
    }

    /// Sort key enforcing the deterministic `(channel, internal_name)`
    /// tie-break required by spec §4.7 and §8.
    pub fn sort_key(&self) -> (String, String) {
        (self.channel.to_string(), self.internal_name.clone())
    }
}
