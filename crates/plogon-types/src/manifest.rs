//! Per-plugin declarative manifest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Channel;

/// A single plugin's declarative build manifest, as parsed from
/// `<channel>/<name>/manifest.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// `[plugin]` section.
    pub plugin: PluginSection,
    /// `[build]` section (optional in the TOML; defaulted here).
    #[serde(default)]
    pub build: BuildSection,
    /// Channel/name location this manifest was loaded from. Not part of
    /// the TOML; filled in by the manifest store at scan time.
    #[serde(skip)]
    pub path_in_repo: PathBuf,
    /// Local directory backing this manifest (`<channel>/<name>/`).
    #[serde(skip)]
    pub directory: PathBuf,
}

/// `[plugin]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSection {
    /// Source repository URL.
    pub repository: String,
    /// Pinned full hex commit revision.
    pub commit: String,
    /// Relative subdirectory of the repository containing the project.
    #[serde(default)]
    pub project_path: String,
    /// Set of owner identifiers (GitHub logins, typically).
    pub owners: Vec<String>,
    /// Free-text changelog for this version.
    #[serde(default)]
    pub changelog: String,
    /// Optional version; may be overridden by a PR body at commit time.
    #[serde(default)]
    pub version: Option<String>,
}

/// `[build]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    /// Alternate container image, if not using the configured default.
    #[serde(default)]
    pub image: Option<String>,
    /// Pre-declared needs, in manifest order.
    #[serde(default)]
    pub needs: Vec<DeclaredNeed>,
}

/// A single `[[build.needs]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredNeed {
    /// `file` or `submodule`.
    #[serde(rename = "type")]
    pub kind: DeclaredNeedKind,
    /// Source URL, for file needs.
    #[serde(default)]
    pub url: Option<String>,
    /// Destination path, for file needs.
    #[serde(default)]
    pub dest: Option<String>,
    /// Expected SHA-512 digest, for file needs.
    #[serde(default)]
    pub sha512: Option<String>,
}

/// The two kinds of need a manifest can pre-declare. Distinct from
/// [`crate::NeedKind`], which additionally covers packages discovered at
/// build time — manifests never declare package needs directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredNeedKind {
    /// An externally hosted file to be fetched into the build.
    File,
    /// A git submodule pinned at a specific commit.
    Submodule,
}

impl Manifest {
    /// Validate the invariants from spec §3: `project_path` never escapes
    /// its directory, `commit` is a full hex revision, `owners` is
    /// non-empty. Called once at parse time by the manifest store, and
    /// re-checked defensively by the source acquirer before any
    /// filesystem join (manifests loaded from history bypass the store).
    pub fn validate(&self) -> Result<(), crate::ManifestValidationError> {
        use crate::ManifestValidationError as E;

        if self.plugin.owners.is_empty() {
            return Err(E::NoOwners);
        }

        if !is_full_hex_commit(&self.plugin.commit) {
            return Err(E::InvalidCommit(self.plugin.commit.clone()));
        }

        validate_project_path(&self.plugin.project_path)?;

        Ok(())
    }

    /// The channel this manifest was scanned from, derived from
    /// `path_in_repo`. Returns `None` for manifests built in memory
    /// (e.g. in unit tests) without a populated path.
    pub fn channel(&self) -> Option<Channel> {
        let mut components = self.path_in_repo.components();
        match components.next()?.as_os_str().to_str()? {
            "stable" => Some(Channel::Stable),
            "testing" => {
                let track = components.next()?.as_os_str().to_str()?;
                Some(Channel::Testing(track.to_string()))
            }
            _ => None,
        }
    }
}

/// Reject `project_path` values that escape the clone directory.
pub fn validate_project_path(project_path: &str) -> Result<(), crate::ManifestValidationError> {
    use crate::ManifestValidationError as E;

    let path = Path::new(project_path);
    if path.is_absolute() {
        return Err(E::EscapingProjectPath(project_path.to_string()));
    }
    for component in path.components() {
        if matches!(component, std::path::Component::ParentDir) {
            return Err(E::EscapingProjectPath(project_path.to_string()));
        }
    }
    Ok(())
}

fn is_full_hex_commit(commit: &str) -> bool {
    commit.len() == 40 && commit.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(project_path: &str, commit: &str, owners: Vec<&str>) -> Manifest {
        Manifest {
            plugin: PluginSection {
                repository: "https://github.com/example/plugin".into(),
                commit: commit.into(),
                project_path: project_path.into(),
                owners: owners.into_iter().map(String::from).collect(),
                changelog: String::new(),
                version: None,
            },
            build: BuildSection::default(),
            path_in_repo: PathBuf::from("stable/FooPlugin/manifest.toml"),
            directory: PathBuf::from("stable/FooPlugin"),
        }
    }

    const VALID_COMMIT: &str = "abcdef0123456789abcdef0123456789abcdef01";

    #[test]
    fn accepts_well_formed_manifest() {
        let m = manifest(".", VALID_COMMIT, vec!["alice"]);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn rejects_parent_dir_escape() {
        let m = manifest("../x", VALID_COMMIT, vec!["alice"]);
        assert!(matches!(
            m.validate(),
            Err(crate::ManifestValidationError::EscapingProjectPath(_))
        ));
    }

    #[test]
    fn rejects_nested_parent_dir_escape() {
        let m = manifest("a/../../x", VALID_COMMIT, vec!["alice"]);
        assert!(m.validate().is_err());
    }

    #[test]
    fn rejects_absolute_project_path() {
        let m = manifest("/etc/passwd", VALID_COMMIT, vec!["alice"]);
        assert!(m.validate().is_err());
    }

    #[test]
    fn rejects_short_commit() {
        let m = manifest(".", "abc123", vec!["alice"]);
        assert!(matches!(
            m.validate(),
            Err(crate::ManifestValidationError::InvalidCommit(_))
        ));
    }

    #[test]
    fn rejects_empty_owners() {
        let m = manifest(".", VALID_COMMIT, vec![]);
        assert!(matches!(
            m.validate(),
            Err(crate::ManifestValidationError::NoOwners)
        ));
    }

    #[test]
    fn channel_parses_from_path() {
        let mut m = manifest(".", VALID_COMMIT, vec!["alice"]);
        m.path_in_repo = PathBuf::from("testing/live/FooPlugin/manifest.toml");
        assert_eq!(m.channel(), Some(Channel::Testing("live".into())));
    }
}
