// FlowCompare — Changed-flow retrieval
//
// Downloads the before/after text of every contact flow a commit added or
// modified, so the two versions can be compared.

use crate::flow::ContactFlow;
use crate::github::{Commit, GitHubClient, GitHubError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Content used for a flow that does not exist in the parent commit.
pub const EMPTY_FLOW: &str = "{}";

#[derive(Debug, Clone)]
pub struct FlowVersions {
    pub path: String,
    pub original: String,
    pub modified: String,
}

#[derive(Debug, Clone)]
pub struct SavedFlow {
    pub path: String,
    pub original: PathBuf,
    pub modified: PathBuf,
    pub is_new: bool,
}

/// Files of `commit` under `flow_path` whose status is `added` or `modified`.
pub fn changed_flow_paths(commit: &Commit, flow_path: &str) -> Vec<String> {
    let dir = flow_path.trim_matches('/');
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    };
    commit
        .files
        .iter()
        .filter(|f| f.filename.starts_with(&prefix))
        .filter(|f| matches!(f.status.as_str(), "added" | "modified"))
        .inspect(|f| tracing::info!(file = %f.filename, status = %f.status, "Changed flow"))
        .map(|f| f.filename.clone())
        .collect()
}

/// `dir/name.json` → (`name_original.json`, `name_modified.json`).
pub fn version_file_names(path: &str) -> (String, String) {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let base = file_name.split('.').next().unwrap_or(file_name);
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !base.is_empty() => (
            format!("{}_original.{}", base, ext),
            format!("{}_modified.{}", base, ext),
        ),
        _ => (
            format!("{}_original", file_name),
            format!("{}_modified", file_name),
        ),
    }
}

/// Like [`version_file_names`] but keeps everything up to the last `.`:
/// `ivr.v2.json` → `ivr.v2_original.json`.
pub fn full_stem_file_names(path: &str) -> (String, String) {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (
            format!("{}_original.{}", stem, ext),
            format!("{}_modified.{}", stem, ext),
        ),
        _ => version_file_names(path),
    }
}

/// Output names for every path; names already taken fall back to the full
/// stem, then to a numeric suffix.
pub fn assign_version_file_names(paths: &[String]) -> Vec<(String, String)> {
    let mut taken: HashSet<String> = HashSet::new();
    paths
        .iter()
        .map(|path| {
            let mut names = version_file_names(path);
            if taken.contains(&names.0) {
                let fallback = full_stem_file_names(path);
                tracing::warn!(
                    file = %path,
                    name = %names.0,
                    fallback = %fallback.0,
                    "Output name already used in this commit"
                );
                names = fallback;
            }
            let base = names.clone();
            let mut n = 2;
            while taken.contains(&names.0) {
                names = (format!("{}_{}", n, base.0), format!("{}_{}", n, base.1));
                n += 1;
            }
            taken.insert(names.0.clone());
            names
        })
        .collect()
}

/// Parent-commit and commit content of one file.
pub async fn file_versions(
    gh: &GitHubClient,
    owner: &str,
    repo: &str,
    commit: &Commit,
    path: &str,
) -> Result<FlowVersions, GitHubError> {
    let original = match commit.parent_sha() {
        Some(parent) => match gh.get_file_content(owner, repo, path, parent).await {
            Ok(text) => text,
            Err(e) if e.is_not_found() => EMPTY_FLOW.to_string(),
            Err(e) => return Err(e),
        },
        None => EMPTY_FLOW.to_string(),
    };
    let modified = gh.get_file_content(owner, repo, path, &commit.sha).await?;

    Ok(FlowVersions {
        path: path.to_string(),
        original,
        modified,
    })
}

pub fn save_versions(output_dir: &Path, versions: &FlowVersions) -> std::io::Result<SavedFlow> {
    let names = version_file_names(&versions.path);
    save_versions_as(output_dir, versions, &names)
}

/// Save under explicit `(original, modified)` file names.
pub fn save_versions_as(
    output_dir: &Path,
    versions: &FlowVersions,
    (original_name, modified_name): &(String, String),
) -> std::io::Result<SavedFlow> {
    std::fs::create_dir_all(output_dir)?;
    let original = output_dir.join(original_name);
    let modified = output_dir.join(modified_name);
    std::fs::write(&original, &versions.original)?;
    std::fs::write(&modified, &versions.modified)?;
    tracing::info!(
        original = %original.display(),
        modified = %modified.display(),
        "Flow versions saved"
    );
    Ok(SavedFlow {
        path: versions.path.clone(),
        original,
        modified,
        is_new: versions.original == EMPTY_FLOW,
    })
}

/// Fetch and save both versions of every changed flow in `sha`.
pub async fn fetch_changed_flows(
    gh: &GitHubClient,
    owner: &str,
    repo: &str,
    sha: &str,
    flow_path: &str,
    output_dir: &Path,
) -> anyhow::Result<Vec<SavedFlow>> {
    let commit = gh.get_commit(owner, repo, sha).await?;
    let paths = changed_flow_paths(&commit, flow_path);
    tracing::info!(commit = %sha, count = paths.len(), "Changed flows found");

    let names = assign_version_file_names(&paths);
    let mut saved = Vec::with_capacity(paths.len());
    for (path, names) in paths.iter().zip(&names) {
        let versions = file_versions(gh, owner, repo, &commit, path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to retrieve versions of {}: {}", path, e))?;

        if let Err(e) = ContactFlow::parse(&versions.modified) {
            tracing::warn!(file = %path, error = %e, "Modified flow is not valid contact-flow JSON");
        }
        saved.push(save_versions_as(output_dir, &versions, names)?);
    }
    Ok(saved)
}
