//! Git working-copy operations used by the pull-request workflow.

use crate::error::LyraError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Operations on a repository working copy.
#[async_trait]
pub trait GitClient: Send + Sync {
    async fn checkout(&self, repo: &Path, branch: &str) -> Result<(), LyraError>;

    /// Pull the current branch from origin. Returns whether HEAD moved.
    async fn pull(&self, repo: &Path) -> Result<bool, LyraError>;

    /// Create `new_branch` from `base` and switch to it.
    async fn checkout_branch(
        &self,
        repo: &Path,
        new_branch: &str,
        base: &str,
    ) -> Result<(), LyraError>;

    async fn add(&self, repo: &Path, files: &[PathBuf]) -> Result<(), LyraError>;

    async fn commit(&self, repo: &Path, message: &str) -> Result<(), LyraError>;

    /// Push `branch` to origin and set it as upstream.
    async fn push(&self, repo: &Path, branch: &str) -> Result<(), LyraError>;

    /// Paths with uncommitted changes, as reported by `git status`.
    async fn status(&self, repo: &Path) -> Result<Vec<String>, LyraError>;
}

/// `GitClient` running the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct CommandGit;

impl CommandGit {
    async fn run(&self, repo: &Path, args: &[&str]) -> Result<String, LyraError> {
        let command = args.first().copied().unwrap_or_default().to_string();
        debug!("git -C {} {}", repo.display(), args.join(" "));

        let output = Command::new("git")
            .arg("-C")
            .arg(repo)
            .args(args)
            .output()
            .await
            .map_err(|e| LyraError::Git {
                command: command.clone(),
                stderr: format!("failed to run git: {}", e),
            })?;

        if !output.status.success() {
            return Err(LyraError::Git {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn head(&self, repo: &Path) -> Result<String, LyraError> {
        Ok(self.run(repo, &["rev-parse", "HEAD"]).await?.trim().to_string())
    }
}

/// Paths from `git status --porcelain -z` output.
///
/// Entries are NUL-terminated and never quoted. A rename or copy entry is
/// followed by an extra field holding the original path.
fn parse_porcelain(output: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut fields = output.split('\0');

    while let Some(entry) = fields.next() {
        let (Some(status), Some(path)) = (entry.get(..2), entry.get(3..)) else {
            continue;
        };
        if path.is_empty() {
            continue;
        }
        paths.push(path.to_string());
        if status.contains(['R', 'C']) {
            fields.next();
        }
    }

    paths
}

#[async_trait]
impl GitClient for CommandGit {
    async fn checkout(&self, repo: &Path, branch: &str) -> Result<(), LyraError> {
        self.run(repo, &["checkout", branch]).await.map(|_| ())
    }

    async fn pull(&self, repo: &Path) -> Result<bool, LyraError> {
        let before = self.head(repo).await?;
        self.run(repo, &["pull", "--ff-only"]).await?;
        let after = self.head(repo).await?;
        Ok(before != after)
    }

    async fn checkout_branch(
        &self,
        repo: &Path,
        new_branch: &str,
        base: &str,
    ) -> Result<(), LyraError> {
        self.run(repo, &["checkout", "-b", new_branch, base])
            .await
            .map(|_| ())
    }

    async fn add(&self, repo: &Path, files: &[PathBuf]) -> Result<(), LyraError> {
        let mut args = vec!["add".to_string(), "--".to_string()];
        args.extend(files.iter().map(|f| f.to_string_lossy().into_owned()));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(repo, &args).await.map(|_| ())
    }

    async fn commit(&self, repo: &Path, message: &str) -> Result<(), LyraError> {
        self.run(repo, &["commit", "-m", message]).await.map(|_| ())
    }

    async fn push(&self, repo: &Path, branch: &str) -> Result<(), LyraError> {
        self.run(repo, &["push", "--set-upstream", "origin", branch])
            .await
            .map(|_| ())
    }

    async fn status(&self, repo: &Path) -> Result<Vec<String>, LyraError> {
        let output = self
            .run(repo, &["status", "--porcelain", "-z", "--untracked-files=all"])
            .await?;
        Ok(parse_porcelain(&output))
    }
}
