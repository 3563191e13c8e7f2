//! Drives a planned task list to completion (spec §4.10), directly
//! grounded on `engine.rs`'s `run_publish`: a serial `for` loop over a
//! plan, catching and recording per-item errors so one failure never
//! aborts the run, committing state as it goes, and reporting progress
//! through the `Reporter` trait rather than a global logger. Generalized
//! here from "publish packages" to "build-or-remove tasks".

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, instrument};

use plogon_container::{BuildOutcome, ContainerRuntime, ContainerSpec};
use plogon_state::StateStore;
use plogon_toolchain::{ToolchainProvider, TrackOverrides};
use plogon_types::{BuildTask, Manifest, OrchestratorError, Reporter, RepositoryState, TaskKind};
use plogon_webhook::WebhookConfig;

use crate::collaborators::{IssueCommenter, PrLabeler, WebServices};
use crate::diff::{self, ArtifactDiff, BlobStore};
use crate::hydrate::{HydrateError, Hydrator};
use crate::mode::Mode;
use crate::needs::{self, BuildOutput, ResolvedFile, ResolvedSubmodule, SafeLists};

/// Everything a run needs injected: the real subsystems plus the
/// boundary collaborators (spec §6), none of which the orchestrator
/// constructs for itself — mirrors `engine.rs`'s pattern of taking a
/// `PlannedWorkspace` and a `RegistryClient` rather than building them.
pub struct BuildDeps<'a> {
    /// Connected container engine handle (or a fake, in tests).
    pub container: &'a dyn ContainerRuntime,
    /// Toolchain feed + cache.
    pub toolchain: &'a ToolchainProvider,
    /// Channel → track overrides (spec §4.3).
    pub track_overrides: &'a TrackOverrides,
    /// Package hydrator (spec §4.5).
    pub hydrator: &'a Hydrator,
    /// Atomic state persistence (spec §4.2).
    pub state_store: &'a StateStore,
    /// Where published diffs/artifacts go; `NullBlobStore` by default.
    pub blob_store: &'a mut dyn BlobStore,
    /// PR comment adapter; `NoopIssueCommenter` when not wired to a PR.
    pub issue_commenter: &'a mut dyn IssueCommenter,
    /// PR label adapter; `NoopPrLabeler` when not wired to a PR.
    pub pr_labeler: &'a mut dyn PrLabeler,
    /// Web-service registration adapter; `NoopWebServices` by default.
    pub web_services: &'a mut dyn WebServices,
    /// Safe-package lists narrowing needs-report visibility (spec §4.8).
    pub safe_lists: &'a SafeLists,
    /// Root that per-task source clones live under, keyed by
    /// `<internal_name>-<commit>`.
    pub work_root: PathBuf,
    /// Root that per-task container output scratch space lives under.
    pub scratch_output_root: PathBuf,
    /// Root that per-task hydrated packages live under.
    pub packages_root: PathBuf,
    /// `/static` bind mount contents (holds `entrypoint.sh`).
    pub static_dir: PathBuf,
    /// Where a successful build's artifacts are published, keyed by
    /// `<channel>/<internal_name>/`.
    pub artifact_root: PathBuf,
    /// Container image used when a manifest doesn't override one.
    pub default_image: String,
    /// Blob-store bucket diffs and artifacts are published under.
    pub blob_bucket: String,
    /// The API level constant builds are checked against (spec §9 open
    /// question: "the constant's source should be configuration").
    pub required_api_level: u32,
    /// Acting identity, checked against a manifest's owners for
    /// ownership gating (spec §4.10 step 3).
    pub actor: Option<String>,
    /// Identities treated as privileged-group members regardless of
    /// per-manifest ownership.
    pub privileged_actors: Vec<String>,
    /// Skip ownership gating unconditionally (spec §4.10 step 3: "unless
    /// the `build_all` option is set").
    pub build_all: bool,
    /// Identity recorded as the approver of newly-reviewed needs at
    /// commit time (spec §4.8, §9).
    pub reviewer: String,
    /// Propagated into every suspending operation; cancellation removes
    /// the in-flight container and leaves state untouched (spec §5).
    pub cancel: CancellationToken,
    /// Where build outcomes are posted (spec §6: `WebhookPoster`, the
    /// one collaborator with a real implementation). `None` disables
    /// notification entirely.
    pub webhook: Option<WebhookConfig>,
}

/// What happened to one planned task.
#[derive(Debug)]
pub enum TaskOutcome {
    /// The build ran, committed (if the mode mutates state), and its
    /// artifacts were published.
    Built {
        /// The version recorded for this build.
        version: String,
    },
    /// The plugin's last-built state was removed.
    Removed,
    /// The task was not attempted — ownership gating, or a disabled
    /// removal mode.
    Skipped {
        /// Why the task was not attempted.
        reason: String,
    },
    /// The task ran and failed. Never aborts the run unless `error`
    /// `is_fatal()`.
    Failed {
        /// The failure that ended the task.
        error: OrchestratorError,
    },
    /// The run aborted (a prior task's `PluginCommitError` fired) before
    /// this task could be attempted.
    NotRun,
}

/// The outcome of an entire orchestrator run (spec §4.10, §7).
#[derive(Debug)]
pub struct RunReport {
    /// Every planned task alongside what happened to it, in the order
    /// they were attempted.
    pub outcomes: Vec<(BuildTask, TaskOutcome)>,
    /// Set once a `PluginCommitError` fires; every subsequent task is
    /// recorded as `NotRun` (spec §7: "state consistency guarantee
    /// cannot be proven past this point").
    pub aborted: bool,
    /// How many tasks were actually attempted (excludes `Skipped` and
    /// `NotRun`), used by `exit_code` for the "zero tasks ran in
    /// PullRequest mode" case (spec §7).
    pub tasks_run: usize,
}

impl RunReport {
    /// Spec §7: "Exit status of the overall run is non-zero iff any task
    /// failed, any fatal error fired, or (in PullRequest mode) zero
    /// tasks were attempted."
    pub fn exit_code(&self, mode: Mode) -> i32 {
        let any_failed = self
            .outcomes
            .iter()
            .any(|(_, outcome)| matches!(outcome, TaskOutcome::Failed { .. }));
        let zero_attempted_in_pr = matches!(mode, Mode::PullRequest) && self.tasks_run == 0;

        if any_failed || self.aborted || zero_attempted_in_pr {
            1
        } else {
            0
        }
    }
}

/// The build output directory's artifact/package-resolution report
/// (spec §4.8: "the build output directory contains a manifest of
/// artifacts and a package resolution report"). The lockfile-derived
/// package list comes from `Hydrator::hydrate` directly; this report
/// covers everything else a container build alone knows: the emitted
/// API level, the effective version, and the file/submodule needs it
/// resolved.
#[derive(Debug, Clone, Default, Deserialize)]
struct BuildReport {
    #[serde(default)]
    api_level: Option<u32>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    file_needs: Vec<ResolvedFile>,
    #[serde(default)]
    submodule_needs: Vec<ResolvedSubmodule>,
}

const BUILD_REPORT_FILE: &str = "plogon-build.json";
const IMAGES_DIR: &str = "images";

/// Drives one run over a planned task set (spec §4.10).
pub struct Orchestrator<'a> {
    deps: BuildDeps<'a>,
}

impl<'a> Orchestrator<'a> {
    /// Build an orchestrator around an already-wired dependency set.
    pub fn new(deps: BuildDeps<'a>) -> Self {
        Self { deps }
    }

    /// Run every task in `tasks`, serially, in deterministic
    /// `(channel, internal_name)` order (spec §5: "no task observes
    /// another's partial state").
    pub fn run(&mut self, mut tasks: Vec<BuildTask>, mode: Mode, reporter: &mut dyn Reporter) -> RunReport {
        tasks.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut state = match self.deps.state_store.load() {
            Ok(state) => state,
            Err(err) => {
                reporter.error(&format!("failed to load state: {err:#}"));
                let outcomes = tasks.into_iter().map(|t| (t, TaskOutcome::NotRun)).collect();
                return RunReport {
                    outcomes,
                    aborted: true,
                    tasks_run: 0,
                };
            }
        };

        let mut outcomes = Vec::with_capacity(tasks.len());
        let mut aborted = false;
        let mut tasks_run = 0usize;

        for task in tasks {
            if aborted {
                outcomes.push((task, TaskOutcome::NotRun));
                continue;
            }

            if self.deps.cancel.is_cancelled() {
                reporter.warn(&format!("{}: run cancelled", task.sort_key().1));
                outcomes.push((
                    task,
                    TaskOutcome::Failed {
                        error: OrchestratorError::CancellationRequested,
                    },
                ));
                continue;
            }

            let span = info_span!("task", channel = %task.channel, plugin = %task.internal_name);
            let _enter = span.enter();

            let outcome = match task.kind {
                TaskKind::Remove => self.run_remove_task(&task, mode, &mut state, reporter),
                TaskKind::Build => self.run_build_task(&task, mode, &mut state, reporter),
            };

            if !matches!(outcome, TaskOutcome::Skipped { .. }) {
                tasks_run += 1;
            }
            if let TaskOutcome::Failed { error } = &outcome {
                if error.is_fatal() {
                    aborted = true;
                }
            }

            self.notify(&task, &outcome, reporter);
            outcomes.push((task, outcome));
        }

        RunReport {
            outcomes,
            aborted,
            tasks_run,
        }
    }

    fn run_remove_task(
        &mut self,
        task: &BuildTask,
        mode: Mode,
        state: &mut RepositoryState,
        reporter: &mut dyn Reporter,
    ) -> TaskOutcome {
        if !mode.runs_removal_tasks() {
            return TaskOutcome::Skipped {
                reason: "removal tasks disabled in this mode".into(),
            };
        }

        if !mode.mutates_state() {
            reporter.info(&format!("{}: would remove (no state mutation in this mode)", task.internal_name));
            return TaskOutcome::Removed;
        }

        let channel = task.channel.to_string();
        match self.deps.state_store.remove_plugin(state, &channel, &task.internal_name) {
            Ok(()) => {
                reporter.info(&format!("{}/{}: removed", channel, task.internal_name));
                TaskOutcome::Removed
            }
            Err(err) => TaskOutcome::Failed {
                error: OrchestratorError::PluginCommit(err.to_string()),
            },
        }
    }

    #[instrument(skip_all, fields(plugin = %task.internal_name))]
    fn run_build_task(
        &mut self,
        task: &BuildTask,
        mode: Mode,
        state: &mut RepositoryState,
        reporter: &mut dyn Reporter,
    ) -> TaskOutcome {
        let label = format!("{}/{}", task.channel, task.internal_name);

        let manifest = match &task.manifest {
            Some(manifest) => manifest,
            None => {
                return TaskOutcome::Failed {
                    error: OrchestratorError::ManifestParse(format!("{label}: build task carries no manifest")),
                };
            }
        };

        if mode.gates_ownership() && !self.deps.build_all && !self.is_authorized(manifest) {
            reporter.info(&format!("{label}: skipped (acting identity is not an owner; pass build_all to override)"));
            return TaskOutcome::Skipped {
                reason: "ownership gate".into(),
            };
        }

        let channel = task.channel.to_string();
        let _ = self
            .deps
            .web_services
            .stage_plugin_build(&task.internal_name, &channel, &manifest.plugin.commit);

        match self.build_one(task, manifest, mode, state, reporter) {
            Ok(outcome) => outcome,
            Err(error) => {
                reporter.error(&format!("{label}: {error}"));
                self.emit_label_for(task, &error);
                TaskOutcome::Failed { error }
            }
        }
    }

    /// Acquire → hydrate → run → review → publish → commit, strictly
    /// sequential within a task (spec §5).
    fn build_one(
        &mut self,
        task: &BuildTask,
        manifest: &Manifest,
        mode: Mode,
        state: &mut RepositoryState,
        reporter: &mut dyn Reporter,
    ) -> Result<TaskOutcome, OrchestratorError> {
        self.check_cancelled()?;

        let channel = task.channel.to_string();
        let task_key = format!("{}-{}", task.internal_name, manifest.plugin.commit);

        reporter.info(&format!("{channel}/{}: acquiring source at {}", task.internal_name, short_commit(&manifest.plugin.commit)));
        let work_dir = plogon_git::work_dir_for(&self.deps.work_root, &task.internal_name, &manifest.plugin.commit);
        plogon_git::acquire(manifest, &work_dir).map_err(|err| OrchestratorError::SourceAcquisition(err.to_string()))?;

        self.check_cancelled()?;

        reporter.info(&format!("{channel}/{}: resolving toolchain", task.internal_name));
        let toolchain_dir = self
            .deps
            .toolchain
            .provide(&task.channel, self.deps.track_overrides)
            .map_err(|err| OrchestratorError::ToolchainUnavailable(err.to_string()))?;

        let project_dir = work_dir.join(&manifest.plugin.project_path);
        let packages_dir = self.deps.packages_root.join(&task_key);
        std::fs::create_dir_all(&packages_dir)
            .map_err(|err| OrchestratorError::SourceAcquisition(format!("failed to create packages dir: {err}")))?;

        self.check_cancelled()?;

        reporter.info(&format!("{channel}/{}: hydrating dependencies", task.internal_name));
        let resolved_packages = self
            .block_on(self.deps.hydrator.hydrate(&project_dir, &packages_dir))
            .map_err(map_hydrate_error)?;

        let output_dir = self.deps.scratch_output_root.join(&task_key);
        std::fs::create_dir_all(&output_dir)
            .map_err(|err| OrchestratorError::ContainerStart(format!("failed to create output dir: {err}")))?;

        self.check_cancelled()?;

        let spec = ContainerSpec {
            image: manifest.build.image.clone().unwrap_or_else(|| self.deps.default_image.clone()),
            work_dir: work_dir.clone(),
            toolchain_dir,
            static_dir: self.deps.static_dir.clone(),
            output_dir: output_dir.clone(),
            packages_dir,
            project_dir: manifest.plugin.project_path.clone(),
            plugin_name: task.internal_name.clone(),
            plugin_commit: manifest.plugin.commit.clone(),
            plugin_version: manifest.plugin.version.clone(),
        };

        reporter.info(&format!("{channel}/{}: running build container", task.internal_name));
        let outcome = self
            .block_on(self.deps.container.run(spec, reporter))
            .map_err(|err| OrchestratorError::ContainerStart(err.to_string()))?;

        let exit_code = match outcome {
            BuildOutcome::Success => 0,
            BuildOutcome::Failed { exit_code } => {
                return Err(OrchestratorError::BuildExitNonZero(exit_code));
            }
        };
        debug_assert_eq!(exit_code, 0);

        let report = read_build_report(&output_dir);

        if !output_dir.join(IMAGES_DIR).exists() {
            return Err(OrchestratorError::MissingIcon(task.internal_name.clone()));
        }

        let api_level = report
            .api_level
            .ok_or(OrchestratorError::ApiLevelMissing(self.deps.required_api_level))?;
        if api_level != self.deps.required_api_level {
            return Err(OrchestratorError::ApiLevelMismatch {
                have: api_level,
                want: self.deps.required_api_level,
            });
        }

        let effective_version = manifest
            .plugin
            .version
            .clone()
            .or(report.version.clone())
            .ok_or_else(|| OrchestratorError::ContainerStart(format!("{}: build emitted no version", task.internal_name)))?;

        if let Some(prior_version) = &task.have_version {
            if !version_is_greater(&effective_version, prior_version) {
                return Err(OrchestratorError::VersionConflict {
                    new_version: effective_version.clone(),
                    prior_version: prior_version.clone(),
                });
            }
        }

        let build_output = BuildOutput {
            resolved_packages,
            resolved_files: report.file_needs.clone(),
            resolved_submodules: report.submodule_needs.clone(),
        };
        let classified = needs::classify_needs(&build_output, state, self.deps.safe_lists);

        if mode.blocks_on_unreviewed_needs() {
            let unreviewed = classified.iter().filter(|c| c.verdict.is_unreviewed()).count();
            if unreviewed > 0 {
                return Err(OrchestratorError::UnreviewedNeeds(unreviewed));
            }
        }

        if !mode.mutates_state() {
            reporter.info(&format!("{channel}/{}: build succeeded (not committing in this mode)", task.internal_name));
            return Ok(TaskOutcome::Built { version: effective_version });
        }

        let prior_published_dir = self.deps.artifact_root.join(&channel).join(&task.internal_name);
        let has_prior = prior_published_dir.exists();
        let artifact_diff = diff::diff_artifacts(has_prior.then_some(prior_published_dir.as_path()), &output_dir);

        let used_needs: Vec<_> = classified.iter().map(|c| c.need.clone()).collect();
        let now = Utc::now();

        needs::commit_needs(&classified, mode.blocks_on_unreviewed_needs(), &self.deps.reviewer, now, self.deps.state_store, state)
            .map_err(|err| match err {
                needs::CommitNeedsError::Unreviewed(e) => OrchestratorError::UnreviewedNeeds(e.0),
                needs::CommitNeedsError::Persist(e) => OrchestratorError::PluginCommit(e.to_string()),
            })?;

        self.deps
            .state_store
            .update_plugin_have(
                state,
                &channel,
                &task.internal_name,
                &manifest.plugin.commit,
                &effective_version,
                Some(manifest.plugin.changelog.as_str()).filter(|c| !c.is_empty()),
                Some(used_needs),
                Some(&self.deps.reviewer),
            )
            .map_err(|err| OrchestratorError::PluginCommit(format!("state update failed: {err:#}")))?;

        // State is durable past this point; every remaining step's
        // failure is a PluginCommitError (spec §4.10 step 4).
        copy_artifacts(&output_dir, &prior_published_dir)
            .map_err(|err| OrchestratorError::PluginCommit(format!("artifact copy failed: {err}")))?;

        let artifact_key = format!("{}.zip", task.internal_name);
        let artifact_bytes = std::fs::read(output_dir.join(&artifact_key)).unwrap_or_default();
        let unified_diff = format!(
            "{} line(s) added, {} line(s) removed for {}@{}",
            artifact_diff.lines_added, artifact_diff.lines_removed, task.internal_name, manifest.plugin.commit
        );
        let _published = diff::publish_diff(
            self.deps.blob_store,
            &self.deps.blob_bucket,
            &task.internal_name,
            &channel,
            &manifest.plugin.commit,
            &unified_diff,
            &artifact_bytes,
            &artifact_key,
            artifact_diff,
        );

        reporter.info(&format!("{channel}/{}: committed at {}", task.internal_name, effective_version));
        Ok(TaskOutcome::Built { version: effective_version })
    }

    fn is_authorized(&self, manifest: &Manifest) -> bool {
        let Some(actor) = &self.deps.actor else {
            return false;
        };
        manifest.plugin.owners.iter().any(|owner| owner.eq_ignore_ascii_case(actor))
            || self.deps.privileged_actors.iter().any(|privileged| privileged.eq_ignore_ascii_case(actor))
    }

    fn emit_label_for(&mut self, task: &BuildTask, error: &OrchestratorError) {
        let label = match error {
            OrchestratorError::MissingIcon(_) => "missing-icon",
            OrchestratorError::ApiLevelMismatch { .. } => "api-level-mismatch",
            OrchestratorError::VersionConflict { .. } => "version-conflict",
            OrchestratorError::UnreviewedNeeds(_) => "needs-review",
            _ => return,
        };

        let channel = task.channel.to_string();
        if let Ok(Some(issue)) = self.deps.web_services.get_pr_number(&task.internal_name, &channel) {
            let _ = self.deps.pr_labeler.set_labels(issue, &[label.to_string()]);
        }
    }

    /// Post a build/remove outcome to the configured webhook, if any
    /// (spec §6). Best-effort: a delivery failure is reported but never
    /// turns a successful task into a failed one.
    fn notify(&self, task: &BuildTask, outcome: &TaskOutcome, reporter: &mut dyn Reporter) {
        let Some(webhook) = &self.deps.webhook else {
            return;
        };

        let channel = task.channel.to_string();
        let payload = match outcome {
            TaskOutcome::Built { version } => plogon_webhook::build_success_payload(&task.internal_name, &channel, version),
            TaskOutcome::Failed { error } => plogon_webhook::build_failure_payload(&task.internal_name, &channel, &error.to_string()),
            TaskOutcome::Removed | TaskOutcome::Skipped { .. } | TaskOutcome::NotRun => return,
        };

        if let Err(err) = plogon_webhook::send_webhook(webhook, &payload) {
            reporter.warn(&format!("{}/{}: webhook delivery failed: {err:#}", channel, task.internal_name));
        }
    }

    fn check_cancelled(&self) -> Result<(), OrchestratorError> {
        if self.deps.cancel.is_cancelled() {
            Err(OrchestratorError::CancellationRequested)
        } else {
            Ok(())
        }
    }

    /// Runs a suspending subsystem call from the orchestrator's single
    /// synchronous driver thread (spec §5: "per-task I/O uses `tokio`
    /// ... `plogon-core`'s own driver loop is synchronous").
    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        tokio::runtime::Handle::current().block_on(fut)
    }
}

fn short_commit(commit: &str) -> &str {
    &commit[..commit.len().min(12)]
}

fn map_hydrate_error(err: HydrateError) -> OrchestratorError {
    match err {
        HydrateError::LockfileMissing => OrchestratorError::LockfileMissing,
        HydrateError::UnsupportedVersion(version) => OrchestratorError::LockfileVersion(version),
        other => OrchestratorError::SourceAcquisition(format!("dependency hydration failed: {other}")),
    }
}

fn read_build_report(output_dir: &Path) -> BuildReport {
    std::fs::read(output_dir.join(BUILD_REPORT_FILE))
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

fn copy_artifacts(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in walkdir::WalkDir::new(source).into_iter().filter_map(Result::ok) {
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Compares dot-separated numeric version strings component-wise,
/// falling back to a plain string comparison for anything that doesn't
/// parse cleanly (spec §8 scenario 3: "equal or lower versions block
/// state mutation").
fn version_is_greater(new_version: &str, prior_version: &str) -> bool {
    fn parts(v: &str) -> Option<Vec<u64>> {
        v.split('.').map(|segment| segment.parse::<u64>().ok()).collect()
    }

    match (parts(new_version), parts(prior_version)) {
        (Some(new_parts), Some(prior_parts)) => new_parts > prior_parts,
        _ => new_version > prior_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_greater_compares_numeric_components() {
        assert!(version_is_greater("1.2.0", "1.1.9"));
        assert!(!version_is_greater("1.1.0", "1.2.0"));
        assert!(!version_is_greater("1.2.0", "1.2.0"));
        assert!(version_is_greater("2.0.0", "1.9.9"));
    }

    #[test]
    fn version_is_greater_falls_back_to_string_compare_on_unparseable_input() {
        assert!(version_is_greater("b", "a"));
        assert!(!version_is_greater("a", "b"));
    }

    #[test]
    fn run_report_exit_code_is_zero_when_nothing_failed() {
        let report = RunReport {
            outcomes: vec![],
            aborted: false,
            tasks_run: 1,
        };
        assert_eq!(report.exit_code(Mode::Commit), 0);
    }

    #[test]
    fn run_report_exit_code_is_nonzero_when_aborted() {
        let report = RunReport {
            outcomes: vec![],
            aborted: true,
            tasks_run: 0,
        };
        assert_eq!(report.exit_code(Mode::Commit), 1);
    }

    #[test]
    fn run_report_exit_code_is_nonzero_for_zero_tasks_in_pull_request_mode() {
        let report = RunReport {
            outcomes: vec![],
            aborted: false,
            tasks_run: 0,
        };
        assert_eq!(report.exit_code(Mode::PullRequest), 1);
        assert_eq!(report.exit_code(Mode::Commit), 0);
    }

    #[test]
    fn read_build_report_defaults_when_file_missing() {
        let td = tempfile::tempdir().unwrap();
        let report = read_build_report(td.path());
        assert!(report.api_level.is_none());
        assert!(report.file_needs.is_empty());
    }

    #[test]
    fn read_build_report_parses_present_file() {
        let td = tempfile::tempdir().unwrap();
        std::fs::write(
            td.path().join(BUILD_REPORT_FILE),
            r#"{"api_level": 9, "version": "1.2.3", "file_needs": [], "submodule_needs": []}"#,
        )
        .unwrap();
        let report = read_build_report(td.path());
        assert_eq!(report.api_level, Some(9));
        assert_eq!(report.version.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn copy_artifacts_mirrors_nested_structure() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("images")).unwrap();
        std::fs::write(src.path().join("images/icon.png"), b"x").unwrap();
        std::fs::write(src.path().join("plugin.zip"), b"zip").unwrap();

        let dest = tempfile::tempdir().unwrap();
        copy_artifacts(src.path(), dest.path()).unwrap();

        assert!(dest.path().join("images/icon.png").exists());
        assert!(dest.path().join("plugin.zip").exists());
    }
}
