use crate::error::LyraError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Never descended into, even without a `.gitignore` saying so.
const EXCLUDE_PATTERNS: &[&str] = &["**/node_modules/**"];

fn glob_set(root: &Path, patterns: &[&str]) -> Result<GlobSet, LyraError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            LyraError::adapter_read(root, format!("invalid pattern {pattern}: {e}"))
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| LyraError::adapter_read(root, e))
}

fn walk(root: &Path, include: &GlobSet, exclude: &GlobSet) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for result in WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .follow_links(false)
        .build()
    {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                debug!(?err, "Failed to read directory entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if include.is_match(relative) && !exclude.is_match(relative) {
            found.push(path.to_path_buf());
        }
    }

    found.sort();
    found
}

/// Files below `root` whose relative path matches one of `patterns`,
/// sorted. Hidden and git-ignored entries are skipped.
///
/// A missing `root` yields no files.
pub(super) async fn find_files(
    root: &Path,
    patterns: &[&str],
) -> Result<Vec<PathBuf>, LyraError> {
    if !tokio::fs::try_exists(root)
        .await
        .map_err(|e| LyraError::adapter_read(root, e))?
    {
        return Ok(Vec::new());
    }

    let include = glob_set(root, patterns)?;
    let exclude = glob_set(root, EXCLUDE_PATTERNS)?;
    let walk_root = root.to_path_buf();
    tokio::task::spawn_blocking(move || walk(&walk_root, &include, &exclude))
        .await
        .map_err(|e| LyraError::adapter_read(root, e))
}

/// Dot-joined id prefix for a file, from its directory relative to `root`.
///
/// `root/a/b/sv.yml` gives `Some("a.b")`; `root/sv.yml` gives `None`.
pub(super) fn id_prefix(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    crate::language_files::prefix_for_source_file(relative)
}
