//! The orchestrator-wide error catalog (spec §7).
//!
//! Each component crate defines its own narrow error enum; this type is
//! the sum of all of them, composed via `#[from]` the same way a
//! top-level publish error composes its sub-crates' errors.

use thiserror::Error;

/// A manifest failed `Manifest::validate` (spec §3 invariants).
#[derive(Debug, Clone, Error)]
pub enum ManifestValidationError {
    /// `project_path` contained `..` or was absolute.
    #[error("project_path {0:?} escapes its clone directory")]
    EscapingProjectPath(String),
    /// `commit` was not a full 40-character hex revision.
    #[error("commit {0:?} is not a full hex revision")]
    InvalidCommit(String),
    /// `owners` was empty.
    #[error("manifest has no owners")]
    NoOwners,
}

/// The complete failure catalog surfaced by a single task run (spec §7).
/// One task failing never aborts the run; only `PluginCommit` is fatal.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A manifest could not be parsed. Logged and skipped; never
    /// surfaced as a task failure on its own.
    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    /// The project's lockfile was missing.
    #[error("lockfile missing")]
    LockfileMissing,
    /// The lockfile declared an unsupported `version`.
    #[error("unsupported lockfile version: {0}")]
    LockfileVersion(u32),

    /// The toolchain bundle could not be fetched or unpacked.
    #[error("toolchain unavailable: {0}")]
    ToolchainUnavailable(String),

    /// Cloning, fetching, or resetting the plugin's source failed.
    #[error("source acquisition failed: {0}")]
    SourceAcquisition(String),

    /// The container engine failed to create or start the container.
    /// A system error distinct from a nonzero build exit.
    #[error("container start failed: {0}")]
    ContainerStart(String),

    /// The build container exited with a nonzero status. Not a system
    /// error — the task simply failed.
    #[error("build exited with status {0}")]
    BuildExitNonZero(i64),

    /// A successful build's output directory lacked `images/`.
    #[error("missing icon for plugin {0}")]
    MissingIcon(String),

    /// The plugin-emitted API level didn't match the configured
    /// required level.
    #[error("api level mismatch: have {have}, want {want}")]
    ApiLevelMismatch {
        /// The level the build emitted.
        have: u32,
        /// The level configuration requires.
        want: u32,
    },

    /// The build report omitted `api_level` entirely. Treated as a hard
    /// failure rather than an automatic match, since an omission is
    /// exactly when a non-conforming build is most likely to occur.
    #[error("build report omitted api_level (required: {0})")]
    ApiLevelMissing(u32),

    /// Needs remained unreviewed at commit time.
    #[error("{0} need(s) require review before this can be committed")]
    UnreviewedNeeds(usize),

    /// The new version was not strictly greater than the prior one.
    #[error("version conflict: {new_version} is not greater than {prior_version}")]
    VersionConflict {
        /// The version the build produced.
        new_version: String,
        /// The version already on record.
        prior_version: String,
    },

    /// Fatal: state was mutated but artifact copy (or a later step)
    /// failed. State consistency cannot be proven past this point; all
    /// subsequent tasks in the run are skipped.
    #[error("plugin commit failed after state mutation: {0}")]
    PluginCommit(String),

    /// The run was cancelled. The container is removed and state is
    /// left untouched.
    #[error("cancellation requested")]
    CancellationRequested,
}

impl OrchestratorError {
    /// Whether this error should abort the entire run (spec §7: only
    /// `PluginCommit` is fatal).
    pub fn is_fatal(&self) -> bool {
        matches!(self, OrchestratorError::PluginCommit(_))
    }

    /// Whether this error represents a system-level failure (container
    /// engine unreachable, etc.) as opposed to an expected task outcome
    /// like a nonzero build exit.
    pub fn is_system_error(&self) -> bool {
        matches!(self, OrchestratorError::ContainerStart(_))
    }
}
