//! Source acquisition for plogon build tasks (spec §4.4).
//!
//! For each task: clone without checkout if the work directory is
//! missing or empty, fetch the pinned commit by hash from `origin`,
//! hard-reset the tree to that commit, then update declared submodules.
//! Clones are reused across runs, keyed by `<internal_name>-<commit>`.
//!
//! Read-only context queries (used for audit logging and the manifest
//! store's cutoff-date filter) shell out to the system `git`, the same
//! way the rest of this corpus does for read-only diagnostics; the
//! mutating operations use `git2` directly so clone/fetch/reset can be
//! driven without depending on an external binary's exact flag surface.

use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{FetchOptions, ObjectType, Repository, ResetType};
use plogon_types::Manifest;

/// Failures from acquiring or updating a task's source tree.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The manifest's `project_path` escapes its clone directory. Checked
    /// again here even though `Manifest::validate` already ran, since
    /// manifests retrieved from history bypass the manifest store.
    #[error("project_path {0:?} escapes its clone directory")]
    EscapingProjectPath(String),
    /// `git2` reported a failure during clone/fetch/reset/submodule-update.
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
    /// The declared commit does not exist in the fetched history.
    #[error("commit {commit} not found after fetch")]
    CommitNotFound {
        /// The commit that was being fetched.
        commit: String,
    },
}

/// The local working directory a clone lives in, keyed for reuse across
/// runs (spec §4.4).
pub fn work_dir_for(root: &Path, internal_name: &str, commit: &str) -> PathBuf {
    root.join(format!("{internal_name}-{commit}"))
}

/// Acquire (or update) the source tree for a task's manifest into
/// `work_dir`. Idempotent: safe to call again for the same commit.
pub fn acquire(manifest: &Manifest, work_dir: &Path) -> Result<(), SourceError> {
    plogon_types::manifest::validate_project_path(&manifest.plugin.project_path)
        .map_err(|_| SourceError::EscapingProjectPath(manifest.plugin.project_path.clone()))?;

    let repo = open_or_clone(&manifest.plugin.repository, work_dir)?;
    fetch_commit(&repo, &manifest.plugin.commit)?;
    hard_reset_to(&repo, &manifest.plugin.commit)?;
    update_submodules(&repo)?;

    Ok(())
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

fn open_or_clone(repository_url: &str, work_dir: &Path) -> Result<Repository, SourceError> {
    if work_dir.exists() && !is_empty_dir(work_dir) {
        return Ok(Repository::open(work_dir)?);
    }

    std::fs::create_dir_all(work_dir).map_err(|e| {
        SourceError::Git(git2::Error::from_str(&format!(
            "failed to create work dir {}: {e}",
            work_dir.display()
        )))
    })?;

    // Clone without checkout: populate the object database and a remote,
    // but defer populating the working tree until `hard_reset_to` knows
    // the exact pinned commit.
    let repo = Repository::init(work_dir)?;
    repo.remote("origin", repository_url)?;

    let mut remote = repo.find_remote("origin")?;
    let mut fetch_opts = FetchOptions::new();
    remote.fetch::<&str>(&[], Some(&mut fetch_opts), None)?;

    Ok(repo)
}

fn fetch_commit(repo: &Repository, commit: &str) -> Result<(), SourceError> {
    let mut remote = repo.find_remote("origin")?;
    let mut fetch_opts = FetchOptions::new();
    // Fetch the specific pinned revision by hash from origin.
    remote.fetch(&[commit], Some(&mut fetch_opts), None)?;
    Ok(())
}

fn hard_reset_to(repo: &Repository, commit: &str) -> Result<(), SourceError> {
    let oid = git2::Oid::from_str(commit).map_err(|_| SourceError::CommitNotFound {
        commit: commit.to_string(),
    })?;
    let object = repo
        .find_object(oid, Some(ObjectType::Commit))
        .map_err(|_| SourceError::CommitNotFound {
            commit: commit.to_string(),
        })?;
    repo.reset(&object, ResetType::Hard, None)?;
    Ok(())
}

fn update_submodules(repo: &Repository) -> Result<(), SourceError> {
    for mut submodule in repo.submodules()? {
        submodule.update(true, None)?;
    }
    Ok(())
}

/// Lightweight read-only git context, used for audit logging. Shells out
/// to the system `git` for diagnostics that don't warrant `git2`
/// plumbing (describe, status porcelain).
#[derive(Debug, Clone, Default)]
pub struct GitContext {
    /// Current commit hash, if resolvable.
    pub commit: Option<String>,
    /// Current tag, if the commit is tagged.
    pub tag: Option<String>,
}

/// Gather read-only context for `path` (expected to be a task's work dir).
pub fn get_git_context(path: &Path) -> GitContext {
    GitContext {
        commit: get_commit_hash(path).ok(),
        tag: get_tag(path).ok().flatten(),
    }
}

fn get_commit_hash(path: &Path) -> anyhow::Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(path)
        .output()?;
    anyhow::ensure!(output.status.success(), "git rev-parse failed");
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn get_tag(path: &Path) -> anyhow::Result<Option<String>> {
    let output = Command::new("git")
        .args(["describe", "--exact-match", "--tags"])
        .current_dir(path)
        .output()?;
    if !output.status.success() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
}

/// Commit timestamp of the most recent revision touching `path` within
/// `repo_dir`, used by the manifest store's cutoff-date filter (spec
/// §4.1). Shells out to `git log` for the same reason the read-only
/// context helpers above do.
pub fn last_commit_time(
    repo_dir: &Path,
    path: &str,
) -> anyhow::Result<Option<chrono::DateTime<chrono::Utc>>> {
    let output = Command::new("git")
        .args([
            "log",
            "-n",
            "1",
            "--pretty=format:%cd",
            "--date=iso-strict",
            "--",
            path,
        ])
        .current_dir(repo_dir)
        .output()?;
    if !output.status.success() {
        return Ok(None);
    }
    let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        chrono::DateTime::parse_from_rfc3339(&raw)?.with_timezone(&chrono::Utc),
    ))
}

/// `show <rev>:<path>` content, used by `getHistoricManifest` (spec §4.1).
pub fn show_file_at_rev(repo_dir: &Path, rev: &str, path: &str) -> anyhow::Result<String> {
    let output = Command::new("git")
        .args(["show", &format!("{rev}:{path}")])
        .current_dir(repo_dir)
        .output()?;
    anyhow::ensure!(
        output.status.success(),
        "git show {rev}:{path} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Most recent revision that touched `path`, used by `getHistoricManifest`
/// (spec §4.1) to find the last version of a manifest before it was
/// removed.
pub fn most_recent_revision(repo_dir: &Path, path: &str) -> anyhow::Result<Option<String>> {
    let output = Command::new("git")
        .args(["rev-list", "-n", "1", "HEAD", "--", path])
        .current_dir(repo_dir)
        .output()?;
    anyhow::ensure!(output.status.success(), "git rev-list failed");
    let rev = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(if rev.is_empty() { None } else { Some(rev) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plogon_types::{BuildSection, PluginSection};
    use std::process::Command as StdCommand;
    use tempfile::tempdir;

    fn init_upstream(dir: &Path) -> String {
        StdCommand::new("git").args(["init"]).current_dir(dir).output().unwrap();
        StdCommand::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(dir)
            .output()
            .unwrap();
        StdCommand::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(dir)
            .output()
            .unwrap();
        std::fs::write(dir.join("README.md"), "hello").unwrap();
        StdCommand::new("git").args(["add", "."]).current_dir(dir).output().unwrap();
        StdCommand::new("git")
            .args(["commit", "-m", "init"])
            .current_dir(dir)
            .output()
            .unwrap();
        let out = StdCommand::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir)
            .output()
            .unwrap();
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    fn manifest(repository: &str, commit: &str, project_path: &str) -> Manifest {
        Manifest {
            plugin: PluginSection {
                repository: repository.to_string(),
                commit: commit.to_string(),
                project_path: project_path.to_string(),
                owners: vec!["alice".into()],
                changelog: String::new(),
                version: None,
            },
            build: BuildSection::default(),
            path_in_repo: PathBuf::new(),
            directory: PathBuf::new(),
        }
    }

    #[test]
    fn rejects_escaping_project_path_before_touching_disk() {
        let td = tempdir().unwrap();
        let m = manifest("file:///does/not/matter", &"f".repeat(40), "../escape");
        let result = acquire(&m, &td.path().join("work"));
        assert!(matches!(result, Err(SourceError::EscapingProjectPath(_))));
    }

    #[test]
    fn work_dir_naming_is_keyed_by_name_and_commit() {
        let root = Path::new("/tmp/plogon-work");
        let dir = work_dir_for(root, "FooPlugin", "abc123");
        assert_eq!(dir, PathBuf::from("/tmp/plogon-work/FooPlugin-abc123"));
    }

    #[test]
    #[serial_test::serial]
    fn acquire_clones_fetches_and_resets_local_repo() {
        let upstream_td = tempdir().unwrap();
        let commit = init_upstream(upstream_td.path());
        let work_td = tempdir().unwrap();
        let work_dir = work_td.path().join("work");

        let repo_url = format!("file://{}", upstream_td.path().display());
        let m = manifest(&repo_url, &commit, ".");

        acquire(&m, &work_dir).expect("acquire should succeed against a local repo");
        assert!(work_dir.join("README.md").exists());

        let ctx = get_git_context(&work_dir);
        assert_eq!(ctx.commit.as_deref(), Some(commit.as_str()));
    }
}
