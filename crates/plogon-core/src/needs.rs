//! Needs review engine: classify a build's externally introduced
//! material against the reviewed-needs ledger (spec §4.8).

use chrono::{DateTime, Utc};
use plogon_state::StateStore;
use plogon_types::{Need, NeedKind, NeedVerdict, RepositoryState};
use serde::Deserialize;

/// A package resolved from the project's lockfile (spec §4.8: "package
/// needs").
#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedPackage {
    /// Package name.
    pub name: String,
    /// Resolved version.
    pub version: String,
}

/// A file need as actually materialized by the build (spec §4.8: "file
/// needs"), distinct from [`plogon_types::DeclaredNeed`] in that it
/// carries the digest the build actually computed rather than the
/// manifest's expectation.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedFile {
    /// The `url` or `dest` the manifest declared, used as the need key.
    pub key: String,
    /// The SHA-512 digest of the fetched content.
    pub sha512: String,
}

/// A submodule at its pinned commit, as checked out for the build (spec
/// §4.8: "submodule needs").
#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedSubmodule {
    /// Submodule path relative to the project root.
    pub path: String,
    /// The commit it was pinned to.
    pub commit: String,
}

/// The artifacts a successful build introduced, as read back from the
/// build's output directory (spec §4.8: "the build output directory
/// contains a manifest of artifacts and a package resolution report").
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Every resolved package from the lockfile.
    pub resolved_packages: Vec<ResolvedPackage>,
    /// Every declared file need, resolved to its actual digest.
    pub resolved_files: Vec<ResolvedFile>,
    /// Every submodule at its pinned commit.
    pub resolved_submodules: Vec<ResolvedSubmodule>,
}

/// A need together with its classification against the ledger and
/// whether it should be hidden from human-facing reports.
#[derive(Debug, Clone)]
pub struct ClassifiedNeed {
    /// The need itself.
    pub need: Need,
    /// Its review status (spec §4.8).
    pub verdict: NeedVerdict,
    /// True when the need's name matches a configured safe-namespace
    /// prefix or an exact safe-package entry. Affects report rendering
    /// only — never exempts a need from review (spec §4.8: "hidden from
    /// reports but still enumerated; never auto-marked reviewed").
    pub hidden_from_report: bool,
}

/// The safe-package lists that narrow what surfaces in reports (spec
/// §4.8), mirroring `plogon_config::NeedsConfig`.
#[derive(Debug, Clone, Default)]
pub struct SafeLists {
    /// Package name prefixes considered low-risk.
    pub safe_namespaces: Vec<String>,
    /// Exact package names considered pre-approved.
    pub safe_exact: Vec<String>,
}

impl SafeLists {
    fn hides(&self, name: &str) -> bool {
        self.safe_exact.iter().any(|exact| exact == name)
            || self.safe_namespaces.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// Classify every need a build introduced against `state` (spec §4.8).
pub fn classify_needs(output: &BuildOutput, state: &RepositoryState, safe_lists: &SafeLists) -> Vec<ClassifiedNeed> {
    let mut classified = Vec::with_capacity(
        output.resolved_packages.len() + output.resolved_files.len() + output.resolved_submodules.len(),
    );

    for package in &output.resolved_packages {
        classified.push(classify_one(
            NeedKind::Package,
            &package.name,
            &package.version,
            state,
            safe_lists.hides(&package.name),
        ));
    }

    for file in &output.resolved_files {
        classified.push(classify_one(NeedKind::File, &file.key, &file.sha512, state, false));
    }

    for submodule in &output.resolved_submodules {
        classified.push(classify_one(
            NeedKind::Submodule,
            &submodule.path,
            &submodule.commit,
            state,
            false,
        ));
    }

    classified
}

fn classify_one(kind: NeedKind, key: &str, version: &str, state: &RepositoryState, hidden_from_report: bool) -> ClassifiedNeed {
    let verdict = if state.is_need_reviewed(kind, key, version) {
        let reviewer = state
            .reviewed_needs
            .iter()
            .find(|entry| entry.matches(kind, key, version))
            .map(|entry| entry.reviewer.clone())
            .unwrap_or_default();
        NeedVerdict::Reviewed { reviewer }
    } else if let Some(prior) = state.prior_need_version(kind, key) {
        NeedVerdict::Update {
            old_version: prior.to_string(),
            diff_url: None,
        }
    } else {
        NeedVerdict::New
    };

    let need = Need {
        kind,
        name: key.to_string(),
        version: version.to_string(),
        old_version: match &verdict {
            NeedVerdict::Update { old_version, .. } => Some(old_version.clone()),
            _ => None,
        },
        diff_url: None,
        reviewed_by: match &verdict {
            NeedVerdict::Reviewed { reviewer } => Some(reviewer.clone()),
            _ => None,
        },
    };

    ClassifiedNeed {
        need,
        verdict,
        hidden_from_report,
    }
}

/// Raised when a commit-mode task has needs that remain unreviewed
/// (spec §4.8, §7).
#[derive(Debug, thiserror::Error)]
#[error("{0} need(s) require review before this can be committed")]
pub struct UnreviewedNeedsError(pub usize);

/// Everything that can go wrong finalizing needs review for a commit.
#[derive(Debug, thiserror::Error)]
pub enum CommitNeedsError {
    /// Needs remained unreviewed in a blocking mode.
    #[error(transparent)]
    Unreviewed(#[from] UnreviewedNeedsError),
    /// The reviewed-needs ledger could not be persisted.
    #[error("failed to persist reviewed-needs ledger: {0}")]
    Persist(#[source] anyhow::Error),
}

/// Finalize needs review for a commit: in blocking modes, reject if any
/// need remains unreviewed; otherwise, record the committing identity as
/// approver for every previously-unreviewed need (spec §4.8, §9: the
/// committing reviewer is recorded as approver).
pub fn commit_needs(
    classified: &[ClassifiedNeed],
    blocks_on_unreviewed: bool,
    reviewer: &str,
    now: DateTime<Utc>,
    state_store: &StateStore,
    state: &mut RepositoryState,
) -> Result<(), CommitNeedsError> {
    let unreviewed: Vec<&ClassifiedNeed> = classified.iter().filter(|c| c.verdict.is_unreviewed()).collect();

    if blocks_on_unreviewed && !unreviewed.is_empty() {
        return Err(UnreviewedNeedsError(unreviewed.len()).into());
    }

    for entry in unreviewed {
        state_store
            .add_reviewed_need(state, entry.need.kind, &entry.need.name, &entry.need.version, reviewer, now)
            .map_err(CommitNeedsError::Persist)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plogon_types::ReviewedNeed;

    fn state_with_reviewed(kind: NeedKind, key: &str, version: &str) -> RepositoryState {
        let mut state = RepositoryState::default();
        state.reviewed_needs.push(ReviewedNeed {
            kind,
            key: key.to_string(),
            version: version.to_string(),
            reviewer: "alice".to_string(),
            reviewed_at: Utc::now(),
        });
        state
    }

    #[test]
    fn exact_ledger_match_is_reviewed() {
        let state = state_with_reviewed(NeedKind::Package, "Acme.Widgets", "2.0.0");
        let output = BuildOutput {
            resolved_packages: vec![ResolvedPackage {
                name: "Acme.Widgets".to_string(),
                version: "2.0.0".to_string(),
            }],
            ..Default::default()
        };

        let classified = classify_needs(&output, &state, &SafeLists::default());
        assert_eq!(classified.len(), 1);
        assert!(!classified[0].verdict.is_unreviewed());
    }

    #[test]
    fn newer_version_than_ledger_is_update_not_reviewed() {
        let state = state_with_reviewed(NeedKind::Package, "Acme.Widgets", "1.0.0");
        let output = BuildOutput {
            resolved_packages: vec![ResolvedPackage {
                name: "Acme.Widgets".to_string(),
                version: "2.0.0".to_string(),
            }],
            ..Default::default()
        };

        let classified = classify_needs(&output, &state, &SafeLists::default());
        match &classified[0].verdict {
            NeedVerdict::Update { old_version, .. } => assert_eq!(old_version, "1.0.0"),
            other => panic!("expected Update, got {other:?}"),
        }
    }

    #[test]
    fn unknown_package_is_new() {
        let output = BuildOutput {
            resolved_packages: vec![ResolvedPackage {
                name: "Acme.Widgets".to_string(),
                version: "2.0.0".to_string(),
            }],
            ..Default::default()
        };

        let classified = classify_needs(&output, &RepositoryState::default(), &SafeLists::default());
        assert_eq!(classified[0].verdict, NeedVerdict::New);
    }

    #[test]
    fn safe_list_hides_from_report_but_still_requires_review() {
        let safe_lists = SafeLists {
            safe_namespaces: vec!["Acme.".to_string()],
            safe_exact: vec![],
        };
        let output = BuildOutput {
            resolved_packages: vec![ResolvedPackage {
                name: "Acme.Widgets".to_string(),
                version: "2.0.0".to_string(),
            }],
            ..Default::default()
        };

        let classified = classify_needs(&output, &RepositoryState::default(), &safe_lists);
        assert!(classified[0].hidden_from_report);
        assert!(classified[0].verdict.is_unreviewed());
    }

    #[test]
    fn commit_needs_rejects_when_blocking_and_something_unreviewed() {
        let td = tempfile::tempdir().unwrap();
        let store = StateStore::new(td.path());
        let mut state = RepositoryState::default();

        let output = BuildOutput {
            resolved_packages: vec![ResolvedPackage {
                name: "Acme.Widgets".to_string(),
                version: "2.0.0".to_string(),
            }],
            ..Default::default()
        };
        let classified = classify_needs(&output, &state, &SafeLists::default());

        let result = commit_needs(&classified, true, "bob", Utc::now(), &store, &mut state);
        assert!(matches!(result, Err(CommitNeedsError::Unreviewed(UnreviewedNeedsError(1)))));
        assert!(!state.is_need_reviewed(NeedKind::Package, "Acme.Widgets", "2.0.0"));
    }

    #[test]
    fn commit_needs_auto_approves_when_not_blocking() {
        let td = tempfile::tempdir().unwrap();
        let store = StateStore::new(td.path());
        let mut state = RepositoryState::default();

        let output = BuildOutput {
            resolved_packages: vec![ResolvedPackage {
                name: "Acme.Widgets".to_string(),
                version: "2.0.0".to_string(),
            }],
            ..Default::default()
        };
        let classified = classify_needs(&output, &state, &SafeLists::default());

        commit_needs(&classified, false, "bob", Utc::now(), &store, &mut state).expect("ok");
        assert!(state.is_need_reviewed(NeedKind::Package, "Acme.Widgets", "2.0.0"));
    }
}
