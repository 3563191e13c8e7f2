//! # Types
//!
//! Core domain types shared by every plogon component: manifests, channels,
//! build tasks, the repository state ledger, needs, and the error catalog.
//!
//! This crate has no I/O. It exists so that `plogon-manifest`, `plogon-state`,
//! `plogon-plan`, `plogon-needs` and `plogon-core` agree on one shape for the
//! data that flows between them, with validation happening at construction
//! time rather than scattered across call sites.
//!
//! ## Modules
//!
//! - [`manifest`] — per-plugin declarative manifest and its validation
//! - [`channel`] — channel/track identifiers
//! - [`task`] — planned build/remove work items
//! - [`state`] — the persistent repository-state ledger
//! - [`needs`] — externally introduced artifacts and their review verdicts
//! - [`error`] — the orchestrator-wide error catalog
//! - [`reporter`] — the progress-reporting trait shared across components

pub mod channel;
pub mod error;
pub mod manifest;
pub mod needs;
pub mod reporter;
pub mod state;
pub mod task;

pub use channel::Channel;
pub use error::{ManifestValidationError, OrchestratorError};
pub use manifest::{BuildSection, DeclaredNeed, DeclaredNeedKind, Manifest, PluginSection};
pub use needs::{Need, NeedKind, NeedVerdict, ReviewedNeed};
pub use reporter::{NullReporter, Reporter};
pub use state::{ChannelState, PluginChangelog, PluginState, RepositoryState};
pub use task::{BuildTask, TaskKind};

use serde::{Deserialize, Serialize};

/// The API level a plugin build emits, compared against a configured
/// constant rather than one baked into code (spec §9, open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApiLevel(pub u32);

impl std::fmt::Display for ApiLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
