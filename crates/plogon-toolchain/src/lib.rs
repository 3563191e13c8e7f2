//! Toolchain track resolution and archive hydration (spec §4.3).
//!
//! Maps a channel id to an upstream release track, fetches that track's
//! JSON descriptor, and materializes the referenced archive locally
//! under `<releases_dir>/<track>-<version>/` — reusing it if already
//! present. Network and archive failures both surface as
//! [`ToolchainError::Unavailable`]: callers don't need to distinguish
//! "couldn't reach the feed" from "couldn't unpack what it sent". The
//! download-and-unpack step retries under `plogon_retry`'s default
//! backoff policy before giving up.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use plogon_retry::{RetryExecutor, RetryPolicy};
use serde::Deserialize;

/// Default timeout for descriptor and archive requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for toolchain feed requests.
pub const USER_AGENT: &str = concat!("plogon/", env!("CARGO_PKG_VERSION"));

/// Any failure resolving or materializing a toolchain.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// Network or archive unpacking failed (spec §4.3, §7: a single
    /// variant covers both — a build can't proceed either way).
    #[error("toolchain unavailable for track {track:?}: {source}")]
    Unavailable {
        /// The upstream track that could not be materialized.
        track: String,
        /// The underlying cause.
        #[source]
        source: anyhow::Error,
    },
}

/// Override table mapping channel ids to upstream track names, read from
/// a TOML document (spec §4.3). Channels with no entry fall back to the
/// default mapping: `stable` → `release`, `testing-<track>` → `<track>`
/// if non-empty, else `release`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackOverrides {
    #[serde(default)]
    tracks: std::collections::BTreeMap<String, String>,
}

impl TrackOverrides {
    /// Parse a track override document.
    pub fn parse(toml_text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_text)
    }

    /// Resolve a channel id to an upstream track.
    pub fn resolve(&self, channel: &plogon_types::Channel) -> String {
        let channel_key = channel.track_key();
        if let Some(track) = self.tracks.get(channel_key) {
            return track.clone();
        }

        match channel {
            plogon_types::Channel::Stable => "release".to_string(),
            plogon_types::Channel::Testing(track) if !track.is_empty() => track.clone(),
            plogon_types::Channel::Testing(_) => "release".to_string(),
        }
    }
}

/// JSON descriptor served by the toolchain feed for a track.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainDescriptor {
    /// Upstream assembly version for this track.
    pub assembly_version: String,
    /// URL of the archive to download.
    pub download_url: String,
    /// Minimum runtime version the toolchain requires.
    pub runtime_version: String,
    /// Whether that runtime is a hard build requirement.
    #[serde(default)]
    pub runtime_required: bool,
}

/// Fetches descriptors and materializes toolchain archives, caching them
/// under a releases directory keyed by `<track>-<version>/`.
pub struct ToolchainProvider {
    feed_base: String,
    releases_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl ToolchainProvider {
    /// Create a provider pointed at `feed_base` (the toolchain feed host)
    /// caching materialized toolchains under `releases_dir`.
    pub fn new(feed_base: impl Into<String>, releases_dir: impl Into<PathBuf>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            feed_base: feed_base.into().trim_end_matches('/').to_string(),
            releases_dir: releases_dir.into(),
            client,
        }
    }

    /// Resolve `channel` to a local toolchain directory, downloading and
    /// unpacking the archive only if it isn't already materialized.
    pub fn provide(
        &self,
        channel: &plogon_types::Channel,
        overrides: &TrackOverrides,
    ) -> Result<PathBuf, ToolchainError> {
        let track = overrides.resolve(channel);
        self.provide_track(&track)
    }

    /// Resolve a specific track name to a local toolchain directory.
    pub fn provide_track(&self, track: &str) -> Result<PathBuf, ToolchainError> {
        let descriptor = self.fetch_descriptor(track).map_err(|source| ToolchainError::Unavailable {
            track: track.to_string(),
            source,
        })?;

        let local_dir = self
            .releases_dir
            .join(format!("{track}-{}", descriptor.assembly_version));

        if local_dir.exists() {
            return Ok(local_dir);
        }

        self.download_and_unpack(&descriptor, &local_dir)
            .map_err(|source| ToolchainError::Unavailable {
                track: track.to_string(),
                source,
            })?;

        Ok(local_dir)
    }

    fn fetch_descriptor(&self, track: &str) -> anyhow::Result<ToolchainDescriptor> {
        let url = format!("{}/{}/descriptor.json", self.feed_base, track);
        let response = self.client.get(&url).send()?;
        anyhow::ensure!(
            response.status().is_success(),
            "descriptor request for track {track:?} failed: {}",
            response.status()
        );
        Ok(response.json()?)
    }

    fn download_and_unpack(
        &self,
        descriptor: &ToolchainDescriptor,
        local_dir: &Path,
    ) -> anyhow::Result<()> {
        RetryExecutor::from_policy(RetryPolicy::Default)
            .run(|_attempt| self.try_download_and_unpack(descriptor, local_dir))
    }

    fn try_download_and_unpack(&self, descriptor: &ToolchainDescriptor, local_dir: &Path) -> anyhow::Result<()> {
        let response = self.client.get(&descriptor.download_url).send()?;
        anyhow::ensure!(
            response.status().is_success(),
            "archive download failed: {}",
            response.status()
        );
        let bytes = response.bytes()?;

        let staging_dir = local_dir.with_extension("tmp");
        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir)?;
        }
        fs::create_dir_all(&staging_dir)?;

        let cursor = std::io::Cursor::new(bytes);
        let mut archive = zip::ZipArchive::new(cursor)?;
        archive.extract(&staging_dir)?;

        fs::rename(&staging_dir, local_dir)?;
        Ok(())
    }
}
