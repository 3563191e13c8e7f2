//! Dependency hydration: lockfile-driven package download (spec §4.5).
//!
//! Package fetches are independent of one another, so they run
//! concurrently bounded by a small semaphore — the same
//! bounded-concurrency shape used elsewhere in this corpus for fan-out
//! over independent network calls, narrowed here to within-task fan-out
//! only (spec §5: "package fetches may be parallelized"). Each fetch
//! retries transient failures under `plogon_retry`'s default backoff.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use plogon_retry::{calculate_delay, RetryPolicy};
use serde::Deserialize;
use sha2::{Digest, Sha512};
use tokio::sync::Semaphore;

use crate::needs::ResolvedPackage;

/// Default number of concurrent package fetches in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// A single locked package entry.
#[derive(Debug, Clone, Deserialize)]
pub struct LockedPackage {
    /// Package name.
    pub name: String,
    /// Resolved version.
    pub resolved_version: String,
    /// Expected content hash, if the lockfile declares one (spec §9:
    /// content-hash verification resolved "yes" — see DESIGN.md).
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// The project's dependency lockfile (spec §4.5).
#[derive(Debug, Clone, Deserialize)]
pub struct Lockfile {
    /// Schema version; only `1` is recognized.
    pub version: u32,
    /// Locked packages grouped by runtime identifier, in declaration
    /// order. Hydration uses the first group only (spec §4.5: "the
    /// first runtime section").
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<LockedPackage>>,
}

impl Lockfile {
    /// Parse a lockfile document, rejecting unrecognized schema versions.
    pub fn parse(text: &str) -> Result<Self, HydrateError> {
        let lockfile: Lockfile = toml::from_str(text).map_err(|e| HydrateError::LockfileVersion(e.to_string()))?;
        if lockfile.version != 1 {
            return Err(HydrateError::UnsupportedVersion(lockfile.version));
        }
        Ok(lockfile)
    }

    /// The packages from the first runtime section, in lockfile order.
    pub fn primary_runtime_packages(&self) -> &[LockedPackage] {
        self.dependencies
            .values()
            .next()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Failures hydrating a task's dependency set (spec §4.5, §7).
#[derive(Debug, thiserror::Error)]
pub enum HydrateError {
    /// `<project>/packages.lock` did not exist.
    #[error("lockfile missing")]
    LockfileMissing,
    /// The lockfile's `version` field was not recognized.
    #[error("unsupported lockfile version: {0}")]
    UnsupportedVersion(u32),
    /// The lockfile document itself failed to parse.
    #[error("failed to parse lockfile: {0}")]
    LockfileVersion(String),
    /// Downloading a package's archive failed.
    #[error("failed to fetch {name}@{version}: {source}")]
    Fetch {
        /// Package name.
        name: String,
        /// Package version.
        version: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// A downloaded package's content did not match its declared hash.
    #[error("content hash mismatch for {name}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Package name.
        name: String,
        /// Declared hash.
        expected: String,
        /// Computed hash.
        actual: String,
    },
    /// Writing a downloaded package to disk failed.
    #[error("failed to write package {name} to {path}: {source}")]
    Write {
        /// Package name.
        name: String,
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Resolves a lockfile's packages into a local package folder, plus the
/// configured reference assemblies (spec §4.5).
pub struct Hydrator {
    client: reqwest::Client,
    feed_host: String,
    reference_assemblies: BTreeMap<String, String>,
    package_extension: String,
    concurrency: usize,
}

impl Hydrator {
    /// Create a hydrator pointed at `feed_host` (a full base URL,
    /// including scheme), fetching `extension` archives, and always
    /// additionally materializing `reference_assemblies` (name → pinned
    /// version).
    pub fn new(
        feed_host: impl Into<String>,
        extension: impl Into<String>,
        reference_assemblies: BTreeMap<String, String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            feed_host: feed_host.into().trim_end_matches('/').to_string(),
            reference_assemblies,
            package_extension: extension.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Read `<project_dir>/packages.lock` and fetch every package from
    /// its first runtime section, plus the configured reference
    /// assemblies, into `packages_dir`.
    pub async fn hydrate(&self, project_dir: &Path, packages_dir: &Path) -> Result<Vec<ResolvedPackage>, HydrateError> {
        let lockfile_path = project_dir.join("packages.lock");
        if !lockfile_path.exists() {
            return Err(HydrateError::LockfileMissing);
        }

        let text = std::fs::read_to_string(&lockfile_path).map_err(|source| HydrateError::Write {
            name: "packages.lock".to_string(),
            path: lockfile_path.clone(),
            source,
        })?;
        let lockfile = Lockfile::parse(&text)?;

        std::fs::create_dir_all(packages_dir).map_err(|source| HydrateError::Write {
            name: "packages_dir".to_string(),
            path: packages_dir.to_path_buf(),
            source,
        })?;

        let mut targets: Vec<(String, String, Option<String>)> = lockfile
            .primary_runtime_packages()
            .iter()
            .map(|pkg| (pkg.name.clone(), pkg.resolved_version.clone(), pkg.content_hash.clone()))
            .collect();

        for (name, version) in &self.reference_assemblies {
            targets.push((name.clone(), version.clone(), None));
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for (name, version, content_hash) in targets {
            let semaphore = Arc::clone(&semaphore);
            let client = self.client.clone();
            let url = self.package_url(&name, &version);
            let dest = packages_dir.join(format!("{}.{}.{}", name.to_lowercase(), version, self.package_extension));

            futures.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                fetch_one(&client, &url, &dest, &name, &version, content_hash.as_deref()).await
            });
        }

        let mut resolved = Vec::new();
        while let Some(result) = futures.next().await {
            let package = result?;
            resolved.push(package);
        }

        resolved.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(resolved)
    }

    fn package_url(&self, name: &str, version: &str) -> String {
        let lower = name.to_lowercase();
        format!(
            "{}/{}/{}/{}.{}.{}",
            self.feed_host, lower, version, lower, version, self.package_extension
        )
    }
}

/// Fetches one package, retrying transient failures under
/// `plogon_retry`'s default backoff policy (spec §4.3's download retry
/// requirement applied here too, since package hydration is the other
/// network-bound fetch on the build path).
async fn fetch_one(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    name: &str,
    version: &str,
    expected_hash: Option<&str>,
) -> Result<ResolvedPackage, HydrateError> {
    let retry_config = RetryPolicy::Default.to_config();
    let mut attempt = 1;
    loop {
        match fetch_once(client, url, dest, name, version, expected_hash).await {
            Ok(package) => return Ok(package),
            Err(_) if attempt < retry_config.max_attempts => {
                tokio::time::sleep(calculate_delay(&retry_config, attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn fetch_once(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    name: &str,
    version: &str,
    expected_hash: Option<&str>,
) -> Result<ResolvedPackage, HydrateError> {
    let response = client.get(url).send().await.map_err(|source| HydrateError::Fetch {
        name: name.to_string(),
        version: version.to_string(),
        source,
    })?;
    let response = response.error_for_status().map_err(|source| HydrateError::Fetch {
        name: name.to_string(),
        version: version.to_string(),
        source,
    })?;
    let bytes = response.bytes().await.map_err(|source| HydrateError::Fetch {
        name: name.to_string(),
        version: version.to_string(),
        source,
    })?;

    if let Some(expected) = expected_hash {
        let mut hasher = Sha512::new();
        hasher.update(&bytes);
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(HydrateError::HashMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    std::fs::write(dest, &bytes).map_err(|source| HydrateError::Write {
        name: name.to_string(),
        path: dest.to_path_buf(),
        source,
    })?;

    Ok(ResolvedPackage {
        name: name.to_string(),
        version: version.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_lockfile_version() {
        let text = "version = 2\n";
        let result = Lockfile::parse(text);
        assert!(matches!(result, Err(HydrateError::UnsupportedVersion(2))));
    }

    #[test]
    fn parses_primary_runtime_section() {
        let text = r#"
version = 1

[dependencies]
"net8.0" = [
    { name = "Acme.Widgets", resolved_version = "2.0.0" },
]
"#;
        let lockfile = Lockfile::parse(text).expect("parse");
        let packages = lockfile.primary_runtime_packages();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "Acme.Widgets");
    }

    #[tokio::test]
    async fn hydrate_fails_fast_when_lockfile_missing() {
        let td = tempfile::tempdir().unwrap();
        let hydrator = Hydrator::new("example.com", "nupkg", BTreeMap::new());
        let result = hydrator.hydrate(td.path(), &td.path().join("packages")).await;
        assert!(matches!(result, Err(HydrateError::LockfileMissing)));
    }

    #[tokio::test]
    async fn hydrate_downloads_packages_and_reference_assemblies() {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("server");
        let addr = server.server_addr().to_string();
        let handle = std::thread::spawn(move || {
            for _ in 0..2 {
                if let Ok(request) = server.recv() {
                    let response = tiny_http::Response::from_data(b"package-bytes".to_vec());
                    let _ = request.respond(response);
                }
            }
        });

        let mut refs = BTreeMap::new();
        refs.insert("Dalamud".to_string(), "9.1.2".to_string());

        let td = tempfile::tempdir().unwrap();
        std::fs::write(
            td.path().join("packages.lock"),
            r#"
version = 1

[dependencies]
"net8.0" = [
    { name = "Acme.Widgets", resolved_version = "2.0.0" },
]
"#,
        )
        .unwrap();

        let hydrator = Hydrator::new(format!("http://{addr}"), "nupkg", refs);
        let packages_dir = td.path().join("packages");
        let resolved = hydrator.hydrate(td.path(), &packages_dir).await.expect("hydrate");

        assert_eq!(resolved.len(), 2);
        assert!(packages_dir.join("acme.widgets.2.0.0.nupkg").exists());
        assert!(packages_dir.join("dalamud.9.1.2.nupkg").exists());

        handle.join().unwrap();
    }
}
