//! Manifest scanning and historic retrieval (spec §4.1).
//!
//! Walks a manifest store root's `stable/<name>/` and
//! `testing/<track>/<name>/` subdirectories, parsing exactly one
//! manifest file per plugin directory. A single malformed manifest is
//! recorded, not fatal — the scan always returns whatever it could
//! parse alongside the list of failures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use plogon_types::Manifest;

const MANIFEST_FILE: &str = "manifest.toml";
const IMAGES_DIR: &str = "images";

/// Failure parsing or validating one manifest file. Non-fatal to the
/// overall scan.
#[derive(Debug, thiserror::Error)]
pub enum ManifestParseError {
    /// The manifest file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The manifest file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The manifest's TOML could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Toml {
        /// The manifest file path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },
    /// The manifest parsed but failed `Manifest::validate`.
    #[error("invalid manifest {path}: {source}")]
    Invalid {
        /// The manifest file path.
        path: PathBuf,
        /// The validation failure.
        #[source]
        source: plogon_types::ManifestValidationError,
    },
    /// The plugin directory has no `images/` folder (spec §4.1:
    /// supplemented — recorded as a deterministic signal for the needs
    /// review engine rather than aborting the scan).
    #[error("{directory} is missing its images/ folder")]
    MissingImages {
        /// The plugin directory missing `images/`.
        directory: PathBuf,
    },
}

/// Options narrowing a scan to a subset of manifests.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Unified diff text; when present, restricts the affected set used
    /// by `ignore_non_affected`.
    pub pr_diff: Option<String>,
    /// If true and `pr_diff` is present, skip manifests not in the
    /// diff's affected-path set.
    pub ignore_non_affected: bool,
    /// Skip manifests whose file wasn't modified at or after this
    /// instant, per the surrounding repository's commit history.
    pub cutoff_date: Option<chrono::DateTime<chrono::Utc>>,
    /// Repository root to run cutoff-date `git log` queries against.
    /// Required when `cutoff_date` is set.
    pub repo_root: Option<PathBuf>,
}

/// The result of scanning a manifest store root: every manifest that
/// parsed successfully, plus every failure encountered along the way.
#[derive(Debug, Default)]
pub struct ManifestStore {
    /// `channel_id -> (internal_name -> Manifest)`.
    pub channels: BTreeMap<String, BTreeMap<String, Manifest>>,
    /// Every non-fatal failure encountered during the scan.
    pub failures: Vec<(PathBuf, ManifestParseError)>,
}

impl ManifestStore {
    /// Scan `base_dir` for `stable/<name>/` and `testing/<track>/<name>/`
    /// manifest directories.
    pub fn scan(base_dir: &Path, options: &ScanOptions) -> Self {
        let mut store = ManifestStore::default();
        let affected = options
            .pr_diff
            .as_deref()
            .map(affected_paths_from_diff)
            .unwrap_or_default();

        for (channel_id, channel_dir) in channel_directories(base_dir) {
            let mut plugins = BTreeMap::new();

            let Ok(entries) = std::fs::read_dir(&channel_dir) else {
                continue;
            };

            for entry in entries.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }

                let plugin_dir = entry.path();
                let Some(internal_name) = plugin_dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };

                let manifest_path = plugin_dir.join(MANIFEST_FILE);
                let relative_manifest_path = manifest_path
                    .strip_prefix(base_dir)
                    .unwrap_or(&manifest_path)
                    .to_path_buf();

                if options.ignore_non_affected && options.pr_diff.is_some() {
                    let relative_str = relative_manifest_path.to_string_lossy();
                    if !affected.iter().any(|p| relative_str.ends_with(p.as_str())) {
                        continue;
                    }
                }

                if let Some(cutoff) = options.cutoff_date {
                    if let Some(repo_root) = &options.repo_root {
                        match plogon_git::last_commit_time(
                            repo_root,
                            &relative_manifest_path.to_string_lossy(),
                        ) {
                            Ok(Some(modified)) if modified < cutoff => continue,
                            _ => {}
                        }
                    }
                }

                if !plugin_dir.join(IMAGES_DIR).is_dir() {
                    store.failures.push((
                        plugin_dir.clone(),
                        ManifestParseError::MissingImages {
                            directory: plugin_dir.clone(),
                        },
                    ));
                }

                match load_manifest(&manifest_path, &relative_manifest_path, &plugin_dir) {
                    Ok(manifest) => {
                        plugins.insert(internal_name.to_string(), manifest);
                    }
                    Err(err) => store.failures.push((manifest_path, err)),
                }
            }

            if !plugins.is_empty() {
                store.channels.insert(channel_id, plugins);
            }
        }

        store
    }

    /// Look up a parsed manifest by channel id and internal name.
    pub fn get(&self, channel_id: &str, internal_name: &str) -> Option<&Manifest> {
        self.channels.get(channel_id)?.get(internal_name)
    }

    /// Retrieve the most recent historical version of a manifest via the
    /// surrounding repository's history, even if the manifest no longer
    /// exists on disk (spec §4.1: `getHistoricManifest`).
    pub fn get_historic_manifest(
        repo_root: &Path,
        base_dir: &Path,
        channel_id: &str,
        internal_name: &str,
    ) -> anyhow::Result<Manifest> {
        let relative_manifest_path = manifest_relative_path(base_dir, channel_id, internal_name)
            .ok_or_else(|| anyhow::anyhow!("unknown channel id: {channel_id}"))?;
        let manifest_str = relative_manifest_path.to_string_lossy().to_string();

        let revision = plogon_git::most_recent_revision(repo_root, &manifest_str)?
            .ok_or_else(|| anyhow::anyhow!("no history found for {manifest_str}"))?;

        let content = plogon_git::show_file_at_rev(repo_root, &revision, &manifest_str)?;
        let mut manifest: Manifest = toml::from_str(&content)?;
        manifest.path_in_repo = relative_manifest_path.clone();
        manifest.directory = relative_manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(manifest)
    }
}

fn manifest_relative_path(base_dir: &Path, channel_id: &str, internal_name: &str) -> Option<PathBuf> {
    if channel_id == "stable" {
        return Some(base_dir.join("stable").join(internal_name).join(MANIFEST_FILE));
    }
    let track = channel_id.strip_prefix("testing-")?;
    Some(
        base_dir
            .join("testing")
            .join(track)
            .join(internal_name)
            .join(MANIFEST_FILE),
    )
}

fn channel_directories(base_dir: &Path) -> Vec<(String, PathBuf)> {
    let mut channels = Vec::new();

    let stable_dir = base_dir.join("stable");
    if stable_dir.is_dir() {
        channels.push(("stable".to_string(), stable_dir));
    }

    let testing_dir = base_dir.join("testing");
    if let Ok(entries) = std::fs::read_dir(&testing_dir) {
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                if let Some(track) = entry.path().file_name().and_then(|n| n.to_str()) {
                    channels.push((format!("testing-{track}"), entry.path()));
                }
            }
        }
    }

    channels
}

fn load_manifest(
    manifest_path: &Path,
    relative_manifest_path: &Path,
    plugin_dir: &Path,
) -> Result<Manifest, ManifestParseError> {
    let content =
        std::fs::read_to_string(manifest_path).map_err(|source| ManifestParseError::Read {
            path: manifest_path.to_path_buf(),
            source,
        })?;

    let mut manifest: Manifest =
        toml::from_str(&content).map_err(|source| ManifestParseError::Toml {
            path: manifest_path.to_path_buf(),
            source,
        })?;

    manifest
        .validate()
        .map_err(|source| ManifestParseError::Invalid {
            path: manifest_path.to_path_buf(),
            source,
        })?;

    manifest.path_in_repo = relative_manifest_path.to_path_buf();
    manifest.directory = plugin_dir.to_path_buf();

    Ok(manifest)
}

/// Parse a unified diff for the set of manifest paths it touches,
/// matching `+++ b/<path>.toml` and `rename to <path>.toml` lines
/// (case-insensitive). Pure string processing — independent of any VCS.
pub fn affected_paths_from_diff(diff_text: &str) -> Vec<String> {
    let mut paths = Vec::new();

    for line in diff_text.lines() {
        let lower = line.to_ascii_lowercase();

        if let Some(rest) = lower.strip_prefix("+++ b/") {
            if rest.ends_with(".toml") {
                paths.push(line["+++ b/".len()..].to_string());
            }
        } else if let Some(rest) = lower.strip_prefix("rename to ") {
            if rest.ends_with(".toml") {
                paths.push(line["rename to ".len()..].to_string());
            }
        }
    }

    paths
}
