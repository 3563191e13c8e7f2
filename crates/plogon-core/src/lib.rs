//! Task planning, dependency hydration, needs review, diffing, and
//! orchestration for the plugin build pipeline (spec §4.5, §4.7–§4.10).
//!
//! This crate wires the standalone component crates (`plogon-manifest`,
//! `plogon-state`, `plogon-toolchain`, `plogon-git`, `plogon-container`,
//! `plogon-webhook`) together with four algorithmic modules that have no
//! collaborator of their own to live in: task planning (`plan`),
//! dependency hydration (`hydrate`), needs classification (`needs`), and
//! artifact diffing (`diff`). `orchestrator` drives all of it serially
//! per run, the same "core lib wires the microcrates" shape its upstream
//! lineage uses for plan → preflight → publish.
//!
//! ## Modules
//!
//! - [`mode`] — the four operating modes and what each one gates
//! - [`collaborators`] — boundary-only trait signatures (§6): PR
//!   commenting, labeling, and web-service registration are out of
//!   scope, so only `Noop` implementations live here
//! - [`hydrate`] — lockfile-driven package download (C5)
//! - [`plan`] — manifests + state → build/remove tasks (C7)
//! - [`needs`] — build output → classified needs (C8)
//! - [`diff`] — artifact diffing and blob publication (C9)
//! - [`orchestrator`] — drives the whole pipeline (C10)

pub mod collaborators;
pub mod diff;
pub mod hydrate;
pub mod mode;
pub mod needs;
pub mod orchestrator;
pub mod plan;

pub use collaborators::{
    IssueCommenter, NoopIssueCommenter, NoopPrLabeler, NoopWebServices, PrLabeler, WebServices,
};
pub use diff::{ArtifactDiff, BlobStore, NullBlobStore};
pub use hydrate::{HydrateError, Hydrator, Lockfile, LockedPackage};
pub use mode::Mode;
pub use needs::{classify_needs, commit_needs, BuildOutput, CommitNeedsError, ResolvedPackage, UnreviewedNeedsError};
pub use orchestrator::{BuildDeps, Orchestrator, RunReport, TaskOutcome};
pub use plan::plan_tasks;
