//! Operating modes (spec §6) and what each one gates.

use serde::{Deserialize, Serialize};

/// The orchestrator's operating mode. Every run picks exactly one; the
/// mode is read once at startup and threaded down rather than branched
/// on deep in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// A pull request is open against the manifest repository. Restricts
    /// the scan to the PR-diff affected set, never mutates state, and
    /// reports needs rather than blocking on them.
    PullRequest,
    /// A merge to the manifest repository's default branch. Mutates
    /// state on success and enforces unreviewed-needs gating.
    Commit,
    /// Scheduled rebuild-everything verification. Rebuilds every
    /// manifest regardless of prior commit, applies the cutoff-date
    /// filter, never mutates state.
    Continuous,
    /// Local iteration. Behaves like `Commit` for planning purposes but
    /// skips ownership gating.
    Development,
}

impl Mode {
    /// Whether the manifest store should restrict its scan to the
    /// PR-diff affected set (spec §4.1, §6).
    pub fn filters_affected_set(self) -> bool {
        matches!(self, Mode::PullRequest)
    }

    /// Whether remove tasks are planned for manifests that disappeared
    /// (spec §4.7 step 2, §6).
    pub fn runs_removal_tasks(self) -> bool {
        !matches!(self, Mode::Continuous)
    }

    /// Whether a successful build is allowed to mutate repository state
    /// (spec §4.10 step 4, §6).
    pub fn mutates_state(self) -> bool {
        matches!(self, Mode::Commit | Mode::Development)
    }

    /// Whether the manifest store's cutoff-date filter applies (spec
    /// §4.1, §6: "Continuous only").
    pub fn enforces_cutoff_date(self) -> bool {
        matches!(self, Mode::Continuous)
    }

    /// Whether task execution is gated on the acting identity being a
    /// manifest owner or privileged-group member (spec §4.10 step 3,
    /// §6).
    pub fn gates_ownership(self) -> bool {
        matches!(self, Mode::PullRequest | Mode::Commit | Mode::Continuous)
    }

    /// Whether an unreviewed need blocks the task outright, as opposed
    /// to being reported only (spec §4.8, §8 scenario 5). Only `Commit`
    /// enforces the gate; `Development` still mutates state but treats
    /// the committing identity as the reviewer of record for whatever
    /// was previously unreviewed, matching local-iteration ergonomics.
    pub fn blocks_on_unreviewed_needs(self) -> bool {
        matches!(self, Mode::Commit)
    }

    /// Whether the task planner rebuilds every manifest regardless of a
    /// matching prior commit (spec §4.7 step 3).
    pub fn rebuilds_unconditionally(self) -> bool {
        matches!(self, Mode::Continuous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_commit_and_development_mutate_state() {
        assert!(Mode::Commit.mutates_state());
        assert!(Mode::Development.mutates_state());
        assert!(!Mode::PullRequest.mutates_state());
        assert!(!Mode::Continuous.mutates_state());
    }

    #[test]
    fn only_continuous_skips_removal_and_enforces_cutoff() {
        assert!(!Mode::Continuous.runs_removal_tasks());
        assert!(Mode::Continuous.enforces_cutoff_date());
        for mode in [Mode::PullRequest, Mode::Commit, Mode::Development] {
            assert!(mode.runs_removal_tasks());
            assert!(!mode.enforces_cutoff_date());
        }
    }

    #[test]
    fn development_is_the_only_mode_that_skips_ownership_gating() {
        assert!(!Mode::Development.gates_ownership());
        assert!(Mode::PullRequest.gates_ownership());
        assert!(Mode::Commit.gates_ownership());
        assert!(Mode::Continuous.gates_ownership());
    }

    #[test]
    fn only_commit_mode_blocks_on_unreviewed_needs() {
        assert!(Mode::Commit.blocks_on_unreviewed_needs());
        assert!(!Mode::Development.blocks_on_unreviewed_needs());
        assert!(!Mode::PullRequest.blocks_on_unreviewed_needs());
        assert!(!Mode::Continuous.blocks_on_unreviewed_needs());
    }

    #[test]
    fn only_pull_request_filters_the_affected_set() {
        assert!(Mode::PullRequest.filters_affected_set());
        assert!(!Mode::Commit.filters_affected_set());
        assert!(!Mode::Continuous.filters_affected_set());
        assert!(!Mode::Development.filters_affected_set());
    }
}
