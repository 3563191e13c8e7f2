//! `plogon.toml` configuration loading.
//!
//! Holds the ambient configuration a manifest store root carries:
//! container image defaults, the toolchain track override table (spec
//! §4.3), the dependency feed host (spec §4.5), the safe-package
//! namespace/exact lists (spec §4.8), the configured API-level constant
//! (spec §9 open question), and blob-store/webhook endpoint settings
//! (spec §6). CLI flags override file config field-by-field, the same
//! merge-with-CLI-args shape used throughout this corpus.
//!
//! # Example
//!
//! ```
//! use plogon_config::{Config, load_config};
//! use std::path::Path;
//!
//! let config = load_config(Path::new(".")).expect("load config");
//! assert_eq!(config.container.default_image, "plogon/build:latest");
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plogon_types::ApiLevel;
use serde::{Deserialize, Serialize};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "plogon.toml";

/// The config file path for a manifest store root.
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Complete `plogon.toml` configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// `[container]` table.
    #[serde(default)]
    pub container: ContainerConfig,
    /// `[toolchain]` table.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// `[hydrate]` table.
    #[serde(default)]
    pub hydrate: HydrateConfig,
    /// `[needs]` table.
    #[serde(default)]
    pub needs: NeedsConfig,
    /// `[build]` table.
    #[serde(default)]
    pub build: BuildConfig,
    /// `[webhook]` table.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// `[blob_store]` table.
    #[serde(default)]
    pub blob_store: BlobStoreConfig,
}

/// `[container]`: image defaults for the container executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image used when a manifest doesn't override `build.image`.
    #[serde(default = "default_image")]
    pub default_image: String,
}

fn default_image() -> String {
    "plogon/build:latest".to_string()
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            default_image: default_image(),
        }
    }
}

/// `[toolchain]`: the channel → upstream track override table (spec
/// §4.3), keyed the same way [`plogon_types::Channel::track_key`]
/// produces keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Releases cache directory.
    #[serde(default)]
    pub releases_dir: Option<PathBuf>,
    /// Per-channel track overrides.
    #[serde(default)]
    pub tracks: BTreeMap<String, String>,
}

/// `[hydrate]`: the dependency feed host and reference-assembly pins
/// (spec §4.5, §9 open question: pinned versions are configuration, not
/// a code constant).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HydrateConfig {
    /// Host serving `/<name>/<version>/<name>.<version>.<ext>` packages.
    pub feed_host: Option<String>,
    /// Reference assemblies fetched into every task's package folder,
    /// keyed by name, pinned to a specific version each.
    #[serde(default)]
    pub reference_assemblies: BTreeMap<String, String>,
}

/// `[needs]`: the safe-namespace and exact-match package lists that
/// narrow what needs review (spec §4.8). Membership here only narrows
/// what surfaces as a "new" need to review — it never auto-reviews
/// something already flagged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeedsConfig {
    /// Package name prefixes treated as same-owner, low-risk.
    #[serde(default)]
    pub safe_namespaces: Vec<String>,
    /// Exact package names treated as pre-approved.
    #[serde(default)]
    pub safe_exact: Vec<String>,
}

/// `[build]`: the configured API-level constant (spec §9 open question).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// The API level builds are expected to report; `None` means the
    /// check is not enforced.
    pub required_api_level: Option<ApiLevel>,
}

/// `[webhook]`: endpoint for the `WebhookPoster` collaborator (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Destination URL. `None` leaves webhook posting disabled.
    pub url: Option<String>,
}

/// `[blob_store]`: endpoint for the `BlobStore` collaborator (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    /// Base directory or URL artifacts are published under.
    pub destination: Option<String>,
}

impl Config {
    /// Defaults, with nothing loaded from disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge this config with `other`, with `other`'s explicitly-set
    /// fields taking precedence — the same "file config, then CLI
    /// overrides" shape used across this corpus.
    pub fn merge(&self, other: &Config) -> Config {
        Config {
            container: ContainerConfig {
                default_image: if other.container.default_image != default_image() {
                    other.container.default_image.clone()
                } else {
                    self.container.default_image.clone()
                },
            },
            toolchain: ToolchainConfig {
                releases_dir: other
                    .toolchain
                    .releases_dir
                    .clone()
                    .or_else(|| self.toolchain.releases_dir.clone()),
                tracks: if other.toolchain.tracks.is_empty() {
                    self.toolchain.tracks.clone()
                } else {
                    other.toolchain.tracks.clone()
                },
            },
            hydrate: HydrateConfig {
                feed_host: other
                    .hydrate
                    .feed_host
                    .clone()
                    .or_else(|| self.hydrate.feed_host.clone()),
                reference_assemblies: if other.hydrate.reference_assemblies.is_empty() {
                    self.hydrate.reference_assemblies.clone()
                } else {
                    other.hydrate.reference_assemblies.clone()
                },
            },
            needs: NeedsConfig {
                safe_namespaces: if other.needs.safe_namespaces.is_empty() {
                    self.needs.safe_namespaces.clone()
                } else {
                    other.needs.safe_namespaces.clone()
                },
                safe_exact: if other.needs.safe_exact.is_empty() {
                    self.needs.safe_exact.clone()
                } else {
                    other.needs.safe_exact.clone()
                },
            },
            build: BuildConfig {
                required_api_level: other
                    .build
                    .required_api_level
                    .or(self.build.required_api_level),
            },
            webhook: WebhookConfig {
                url: other.webhook.url.clone().or_else(|| self.webhook.url.clone()),
            },
            blob_store: BlobStoreConfig {
                destination: other
                    .blob_store
                    .destination
                    .clone()
                    .or_else(|| self.blob_store.destination.clone()),
            },
        }
    }
}

/// Load configuration from a manifest store root, defaulting if absent.
pub fn load_config(dir: &Path) -> Result<Config> {
    load_config_from_file(&config_path(dir))
}

/// Load configuration from a specific file path, defaulting if absent.
pub fn load_config_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Save configuration to a manifest store root.
pub fn save_config(dir: &Path, config: &Config) -> Result<()> {
    let path = config_path(dir);
    let content = toml::to_string_pretty(config).context("failed to serialize config to TOML")?;
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;
    Ok(())
}

/// Find `plogon.toml` by walking up from `start_dir`.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_has_default_image() {
        let config = Config::new();
        assert_eq!(config.container.default_image, "plogon/build:latest");
        assert!(config.build.required_api_level.is_none());
    }

    #[test]
    fn load_missing_config_returns_default() {
        let td = tempdir().expect("tempdir");
        let config = load_config(td.path()).expect("load");
        assert_eq!(config.container.default_image, "plogon/build:latest");
    }

    #[test]
    fn save_and_load_round_trips() {
        let td = tempdir().expect("tempdir");
        let mut config = Config::new();
        config.hydrate.feed_host = Some("https://feed.example.com".to_string());
        config.needs.safe_namespaces = vec!["Acme.".to_string()];
        config.build.required_api_level = Some(ApiLevel(9));

        save_config(td.path(), &config).expect("save");

        let loaded = load_config(td.path()).expect("load");
        assert_eq!(loaded.hydrate.feed_host.as_deref(), Some("https://feed.example.com"));
        assert_eq!(loaded.needs.safe_namespaces, vec!["Acme.".to_string()]);
        assert_eq!(loaded.build.required_api_level, Some(ApiLevel(9)));
    }

    #[test]
    fn parses_full_document() {
        let content = r#"
[container]
default_image = "custom/image:1.0"

[toolchain]
releases_dir = "/var/cache/plogon/releases"

[toolchain.tracks]
"stable" = "release"
"live" = "live-track"

[hydrate]
feed_host = "https://packages.example.com"

[hydrate.reference_assemblies]
"Dalamud" = "9.1.2"
"ImGui.NET" = "1.90.0"

[needs]
safe_namespaces = ["Acme."]
safe_exact = ["Newtonsoft.Json"]

[build]
required_api_level = 9

[webhook]
url = "https://hooks.example.com/plogon"

[blob_store]
destination = "s3://plogon-artifacts"
"#;
        let config: Config = toml::from_str(content).expect("parse");
        assert_eq!(config.container.default_image, "custom/image:1.0");
        assert_eq!(config.toolchain.tracks.get("live"), Some(&"live-track".to_string()));
        assert_eq!(
            config.hydrate.reference_assemblies.get("Dalamud"),
            Some(&"9.1.2".to_string())
        );
        assert_eq!(config.needs.safe_exact, vec!["Newtonsoft.Json".to_string()]);
        assert_eq!(config.build.required_api_level, Some(ApiLevel(9)));
        assert_eq!(config.webhook.url.as_deref(), Some("https://hooks.example.com/plogon"));
    }

    #[test]
    fn merge_prefers_other_when_set() {
        let base = Config::new();
        let mut overrides = Config::new();
        overrides.hydrate.feed_host = Some("https://override.example.com".to_string());

        let merged = base.merge(&overrides);
        assert_eq!(merged.hydrate.feed_host.as_deref(), Some("https://override.example.com"));
    }

    #[test]
    fn find_config_walks_up() {
        let td = tempdir().expect("tempdir");
        let nested = td.path().join("stable").join("FooPlugin");
        std::fs::create_dir_all(&nested).expect("create dirs");

        let config_file = td.path().join(CONFIG_FILE);
        std::fs::write(&config_file, "[container]\ndefault_image = \"x\"").expect("write");

        let found = find_config(&nested);
        assert_eq!(found, Some(config_file));
    }

    #[test]
    fn find_config_returns_none_if_not_found() {
        let td = tempdir().expect("tempdir");
        let nested = td.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("create dirs");
        assert!(find_config(&nested).is_none());
    }
}
