//! Task planning: manifests + state → build/remove tasks (spec §4.7).
//!
//! Same "diff two views of the world into a reproducible plan" shape the
//! rest of this corpus uses for workspace-metadata-vs-registry-state
//! publish planning, narrowed here to manifests vs. repository state.
//! Tasks are produced exactly once per run and sorted by
//! `(channel, internal_name)` so repeated runs over identical inputs
//! produce byte-identical plans (spec §8).

use std::collections::BTreeMap;

use plogon_manifest::ManifestStore;
use plogon_types::{BuildTask, Channel, RepositoryState, TaskKind};

use crate::mode::Mode;

/// Plan the task set for this run (spec §4.7 steps 1–3).
///
/// `manifests` is the already-scanned (and, in `PullRequest` mode,
/// affected-set-filtered) manifest store; `state` is the previously
/// loaded repository ledger. The returned list is sorted by
/// [`BuildTask::sort_key`].
pub fn plan_tasks(manifests: &ManifestStore, state: &RepositoryState, mode: Mode) -> Vec<BuildTask> {
    let mut tasks: BTreeMap<(String, String), BuildTask> = BTreeMap::new();

    for (channel_id, plugins) in &manifests.channels {
        let Ok(channel) = Channel::parse(channel_id) else {
            continue;
        };

        for (internal_name, manifest) in plugins {
            let prior = state.get_plugin_state(channel_id, internal_name);
            let is_new_plugin = !state.is_plugin_in_any_channel(internal_name);
            let is_new_in_channel = prior.is_none() && !is_new_plugin;

            let commit_changed = prior
                .map(|p| p.built_commit != manifest.plugin.commit)
                .unwrap_or(true);

            if commit_changed || mode.rebuilds_unconditionally() {
                let (is_github, is_gitlab) = BuildTask::host_flags(&manifest.plugin.repository);
                let task = BuildTask {
                    internal_name: internal_name.clone(),
                    channel: channel.clone(),
                    manifest: Some(manifest.clone()),
                    have_commit: prior.map(|p| p.built_commit.clone()),
                    have_version: prior.map(|p| p.effective_version.clone()),
                    have_time: prior.map(|p| p.time_built),
                    kind: TaskKind::Build,
                    is_new_plugin,
                    is_new_in_channel,
                    is_github,
                    is_gitlab,
                };
                tasks.insert((channel_id.clone(), internal_name.clone()), task);
            }
        }
    }

    if mode.runs_removal_tasks() {
        for (channel_id, channel_state) in &state.channels {
            let Ok(channel) = Channel::parse(channel_id) else {
                continue;
            };

            for internal_name in channel_state.plugins.keys() {
                let still_manifested = manifests
                    .channels
                    .get(channel_id)
                    .is_some_and(|plugins| plugins.contains_key(internal_name));
                if still_manifested {
                    continue;
                }

                let prior = &channel_state.plugins[internal_name];
                tasks.insert(
                    (channel_id.clone(), internal_name.clone()),
                    BuildTask {
                        internal_name: internal_name.clone(),
                        channel: channel.clone(),
                        manifest: None,
                        have_commit: Some(prior.built_commit.clone()),
                        have_version: Some(prior.effective_version.clone()),
                        have_time: Some(prior.time_built),
                        kind: TaskKind::Remove,
                        is_new_plugin: false,
                        is_new_in_channel: false,
                        is_github: false,
                        is_gitlab: false,
                    },
                );
            }
        }
    }

    tasks.into_values().collect()
}
