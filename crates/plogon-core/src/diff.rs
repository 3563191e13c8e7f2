//! Diff computation and artifact publication (spec §4.9).

use std::path::Path;

use similar::{ChangeTag, TextDiff};
use walkdir::WalkDir;

/// Line-level summary of what changed between a plugin's prior build
/// output and its new one, plus links to wherever that comparison was
/// published (spec §4.9).
#[derive(Debug, Clone, Default)]
pub struct ArtifactDiff {
    /// Lines present in the new output but not the old.
    pub lines_added: usize,
    /// Lines present in the old output but not the new.
    pub lines_removed: usize,
    /// Link to the published byte-for-byte diff, if a blob store is
    /// configured.
    pub regular_diff_link: Option<String>,
    /// Link to a published decompiled/semantic diff, if the build
    /// produced one (spec §4.9: "when available").
    pub semantic_diff_link: Option<String>,
    /// Link to the artifact itself on the configured hosting surface.
    pub hoster_url: Option<String>,
}

/// Where published diffs and artifacts end up (spec §6). Specified at
/// the boundary only; `NullBlobStore` is the default when no real
/// destination is configured, matching spec §4.9's "silently disabled
/// without a destination" rule.
pub trait BlobStore {
    /// Upload `bytes` under `bucket`/`key`, returning a URL it can be
    /// fetched back from.
    fn put(&mut self, bucket: &str, key: &str, bytes: &[u8]) -> anyhow::Result<String>;
}

/// `BlobStore` that performs no upload and returns no URL. Used when
/// `[blob_store]` has no configured destination.
#[derive(Debug, Default)]
pub struct NullBlobStore;

impl BlobStore for NullBlobStore {
    fn put(&mut self, _bucket: &str, _key: &str, _bytes: &[u8]) -> anyhow::Result<String> {
        anyhow::bail!("no blob store destination configured")
    }
}

/// Compare every regular file under `prior_dir` against `new_dir` and
/// return an aggregate line-level diff (spec §4.9 step 1). Either
/// directory may be absent, in which case its files are treated as
/// wholly removed or wholly added.
pub fn diff_artifacts(prior_dir: Option<&Path>, new_dir: &Path) -> ArtifactDiff {
    let prior_text = prior_dir.map(concat_directory_text).unwrap_or_default();
    let new_text = concat_directory_text(new_dir);

    let text_diff = TextDiff::from_lines(&prior_text, &new_text);
    let mut lines_added = 0;
    let mut lines_removed = 0;

    for change in text_diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => lines_added += 1,
            ChangeTag::Delete => lines_removed += 1,
            ChangeTag::Equal => {}
        }
    }

    ArtifactDiff {
        lines_added,
        lines_removed,
        regular_diff_link: None,
        semantic_diff_link: None,
        hoster_url: None,
    }
}

/// Publish a rendered unified diff and the built artifact itself, filling
/// in the links a prior [`diff_artifacts`] call left empty (spec §4.9
/// step 2). No-ops (leaving links `None`) when `store` has no
/// destination, per spec: publication is silently disabled rather than
/// fatal.
pub fn publish_diff(
    store: &mut dyn BlobStore,
    bucket: &str,
    internal_name: &str,
    channel: &str,
    commit: &str,
    unified_diff: &str,
    artifact_bytes: &[u8],
    artifact_key: &str,
    mut diff: ArtifactDiff,
) -> ArtifactDiff {
    let diff_key = format!("{channel}/{internal_name}/{commit}.diff");
    if let Ok(url) = store.put(bucket, &diff_key, unified_diff.as_bytes()) {
        diff.regular_diff_link = Some(url);
    }

    let artifact_object_key = format!("{channel}/{internal_name}/{commit}/{artifact_key}");
    if let Ok(url) = store.put(bucket, &artifact_object_key, artifact_bytes) {
        diff.hoster_url = Some(url);
    }

    diff
}

fn concat_directory_text(dir: &Path) -> String {
    let mut entries: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .collect();
    entries.sort_by_key(|e| e.path().to_path_buf());

    let mut text = String::new();
    for entry in entries {
        if let Ok(contents) = std::fs::read_to_string(entry.path()) {
            text.push_str(&contents);
            if !text.ends_with('\n') {
                text.push('\n');
            }
        }
    }
    text
}
