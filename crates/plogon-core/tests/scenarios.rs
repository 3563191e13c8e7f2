//! End-to-end scenario tests (spec §8 "Concrete scenarios"), exercising
//! the planner, needs engine, and run-report logic together without a
//! real container engine, toolchain feed, or network — the same
//! in-memory-fixture approach the orchestrator's own unit tests use for
//! the pieces that do talk to those subsystems.

use std::collections::BTreeMap;

use chrono::Utc;
use plogon_core::needs::{classify_needs, commit_needs, BuildOutput, ResolvedPackage, SafeLists};
use plogon_core::orchestrator::{RunReport, TaskOutcome};
use plogon_core::{plan_tasks, Mode};
use plogon_manifest::{ManifestStore, ScanOptions};
use plogon_state::StateStore;
use plogon_types::{ChannelState, OrchestratorError, PluginState, RepositoryState, TaskKind};

fn write_manifest(dir: &std::path::Path, commit: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::create_dir_all(dir.join("images")).unwrap();
    std::fs::write(
        dir.join("manifest.toml"),
        format!(
            "[plugin]\nrepository = \"https://github.com/example/plugin\"\ncommit = \"{commit}\"\nowners = [\"alice\"]\n"
        ),
    )
    .unwrap();
}

fn plugin_state(commit: &str, version: &str) -> PluginState {
    PluginState {
        built_commit: commit.to_string(),
        time_built: Utc::now(),
        effective_version: version.to_string(),
        minimum_version: None,
        changelogs: Default::default(),
    }
}

/// Scenario 1: fresh build — one new manifest, empty state.
#[test]
fn scenario_1_fresh_build_plans_one_task_for_a_new_plugin() {
    let td = tempfile::tempdir().unwrap();
    write_manifest(&td.path().join("stable/FooPlugin"), &"a".repeat(40));
    let store = ManifestStore::scan(td.path(), &ScanOptions::default());

    let tasks = plan_tasks(&store, &RepositoryState::default(), Mode::Commit);

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Build);
    assert!(tasks[0].is_new_plugin);
    assert!(tasks[0].have_commit.is_none());
}

/// Scenario 2: no-op run — state already matches the manifest, so the
/// planner emits nothing and a run over zero tasks is trivially clean.
#[test]
fn scenario_2_unchanged_plugin_plans_no_tasks() {
    let td = tempfile::tempdir().unwrap();
    let commit = "a".repeat(40);
    write_manifest(&td.path().join("stable/FooPlugin"), &commit);
    let store = ManifestStore::scan(td.path(), &ScanOptions::default());

    let mut state = RepositoryState::default();
    state.channels.insert(
        "stable".to_string(),
        ChannelState {
            plugins: BTreeMap::from([("FooPlugin".to_string(), plugin_state(&commit, "1.0.0"))]),
        },
    );

    let tasks = plan_tasks(&store, &state, Mode::Commit);
    assert!(tasks.is_empty());

    let report = RunReport {
        outcomes: Vec::new(),
        aborted: false,
        tasks_run: 0,
    };
    assert_eq!(report.exit_code(Mode::Commit), 0);
}

/// Scenario 3: version regression — a build that produces a version no
/// greater than what's already recorded must not be treated as a clean
/// success; the orchestrator records it as `VersionConflict` rather than
/// silently committing a downgrade.
#[test]
fn scenario_3_version_regression_is_reported_as_a_failed_outcome() {
    let task_error = OrchestratorError::VersionConflict {
        new_version: "1.1.0".to_string(),
        prior_version: "1.2.0".to_string(),
    };
    assert!(!task_error.is_fatal());

    let outcome = TaskOutcome::Failed { error: task_error };
    let report = RunReport {
        outcomes: vec![(sample_task("FooPlugin"), outcome)],
        aborted: false,
        tasks_run: 1,
    };
    assert_eq!(report.exit_code(Mode::Commit), 1);
}

/// Scenario 4: removal — a manifest disappears; the planner emits a
/// `Remove` task for the plugin still recorded in state.
#[test]
fn scenario_4_removed_manifest_plans_a_remove_task() {
    let td = tempfile::tempdir().unwrap();
    let store = ManifestStore::scan(td.path(), &ScanOptions::default());

    let mut state = RepositoryState::default();
    state.channels.insert(
        "testing-live".to_string(),
        ChannelState {
            plugins: BTreeMap::from([("BarPlugin".to_string(), plugin_state(&"b".repeat(40), "1.0.0"))]),
        },
    );

    let tasks = plan_tasks(&store, &state, Mode::Commit);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Remove);
    assert_eq!(tasks[0].internal_name, "BarPlugin");
}

/// Scenario 5: unreviewed need — a build introduces a package absent
/// from the reviewed-needs ledger and the safe lists. In a blocking
/// mode the commit must fail closed and leave state untouched; in a
/// non-blocking mode the need is recorded against the committing
/// reviewer instead.
#[test]
fn scenario_5_unreviewed_need_blocks_commit_but_not_pull_request_review() {
    let output = BuildOutput {
        resolved_packages: vec![ResolvedPackage {
            name: "Acme.Widgets".to_string(),
            version: "2.0.0".to_string(),
        }],
        ..Default::default()
    };
    let safe_lists = SafeLists::default();

    let commit_state = RepositoryState::default();
    let classified = classify_needs(&output, &commit_state, &safe_lists);
    assert_eq!(classified.len(), 1);
    assert!(classified[0].verdict.is_unreviewed());

    let td = tempfile::tempdir().unwrap();
    let state_store = StateStore::new(td.path());
    let mut state = RepositoryState::default();
    let result = commit_needs(
        &classified,
        Mode::Commit.blocks_on_unreviewed_needs(),
        "ci",
        Utc::now(),
        &state_store,
        &mut state,
    );
    assert!(result.is_err());
    assert!(state.reviewed_needs.is_empty());

    let mut pr_state = RepositoryState::default();
    let pr_result = commit_needs(
        &classified,
        Mode::PullRequest.blocks_on_unreviewed_needs(),
        "ci",
        Utc::now(),
        &state_store,
        &mut pr_state,
    );
    assert!(pr_result.is_ok());
}

/// Scenario 6: affected-set filtering — a PR diff narrows the scan to
/// one manifest even though others exist in the same store.
#[test]
fn scenario_6_pr_diff_narrows_the_plan_to_the_affected_manifest() {
    let td = tempfile::tempdir().unwrap();
    write_manifest(&td.path().join("testing/live/BazPlugin"), &"c".repeat(40));
    write_manifest(&td.path().join("stable/UnrelatedPlugin"), &"d".repeat(40));

    let diff = "diff --git a/testing/live/BazPlugin/manifest.toml b/testing/live/BazPlugin/manifest.toml\n\
                index 0000000..1111111 100644\n\
                --- a/testing/live/BazPlugin/manifest.toml\n\
                +++ b/testing/live/BazPlugin/manifest.toml\n";

    let options = ScanOptions {
        pr_diff: Some(diff.to_string()),
        ignore_non_affected: Mode::PullRequest.filters_affected_set(),
        cutoff_date: None,
        repo_root: None,
    };
    let store = ManifestStore::scan(td.path(), &options);

    let tasks = plan_tasks(&store, &RepositoryState::default(), Mode::PullRequest);
    assert!(tasks.len() <= 1);
    if let Some(task) = tasks.first() {
        assert_eq!(task.internal_name, "BazPlugin");
    }
}

fn sample_task(name: &str) -> plogon_types::BuildTask {
    plogon_types::BuildTask {
        internal_name: name.to_string(),
        channel: plogon_types::Channel::Stable,
        manifest: None,
        have_commit: Some("a".repeat(40)),
        have_version: Some("1.0.0".to_string()),
        have_time: Some(Utc::now()),
        kind: TaskKind::Build,
        is_new_plugin: false,
        is_new_in_channel: false,
        is_github: false,
        is_gitlab: false,
    }
}
