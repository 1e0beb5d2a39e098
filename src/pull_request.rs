//! Turning in-memory translations into a GitHub pull request.
//!
//! The workflow owns the repository working copy while it runs: it syncs
//! the base branch, writes every language file, commits the changed ones
//! on a fresh branch, pushes and opens the PR, and finally puts the
//! working copy back on the synced base branch. Only one workflow may
//! run per repository at a time.

use crate::error::LyraError;
use crate::git::GitClient;
use crate::github::{PullRequestCreator, PullRequestRequest};
use crate::language_files::{group_by_source_file, write_language_files};
use crate::lyra_config::LyraConfig;
use crate::server_config::ServerProjectConfig;
use crate::store::StoreRegistry;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

const BRANCH_PREFIX: &str = "lyra-translate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PullRequestStatus {
    Idle,
    Sending,
    #[serde(rename_all = "camelCase")]
    Success {
        branch_name: String,
        pull_request_url: String,
    },
    #[serde(rename_all = "camelCase")]
    Error { error_message: String },
}

impl PullRequestStatus {
    fn from_error(error: &LyraError) -> Self {
        Self::Error {
            error_message: error.user_message(),
        }
    }
}

/// Busy flags for repository working copies, keyed by repository path.
#[derive(Debug, Default)]
pub struct RepoLocks {
    busy: Mutex<HashMap<PathBuf, bool>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn busy(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, bool>> {
        self.busy.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark `repo` busy, or `None` if it already is. The flag is cleared
    /// when the returned guard is dropped.
    pub fn try_acquire(self: &Arc<Self>, repo: &Path) -> Option<RepoLockGuard> {
        let mut busy = self.busy();
        let flag = busy.entry(repo.to_path_buf()).or_insert(false);
        if *flag {
            return None;
        }
        *flag = true;
        Some(RepoLockGuard {
            locks: Arc::clone(self),
            repo: repo.to_path_buf(),
        })
    }

    pub fn is_locked(&self, repo: &Path) -> bool {
        self.busy().get(repo).copied().unwrap_or(false)
    }

    fn release(&self, repo: &Path) {
        self.busy().insert(repo.to_path_buf(), false);
    }
}

#[derive(Debug)]
pub struct RepoLockGuard {
    locks: Arc<RepoLocks>,
    repo: PathBuf,
}

impl Drop for RepoLockGuard {
    fn drop(&mut self) {
        self.locks.release(&self.repo);
    }
}

/// `lyra-translate-<UTC timestamp>-<6 random characters>`
pub fn generate_branch_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!(
        "{}-{}-{}",
        BRANCH_PREFIX,
        chrono::Utc::now().format("%Y%m%d%H%M%S"),
        suffix.to_lowercase()
    )
}

fn describe_changes(project: &ServerProjectConfig, changed: &[String]) -> (String, String) {
    let title = format!("Translation updates for {}", project.name);
    let mut body = String::from("Translations edited in Lyra.\n\nChanged files:\n");
    for file in changed {
        body.push_str(&format!("- `{}`\n", file));
    }
    (title, body)
}

/// Runs the pull request workflow against repository working copies.
pub struct RepoGit {
    git: Arc<dyn GitClient>,
    github: Arc<dyn PullRequestCreator>,
    locks: Arc<RepoLocks>,
}

impl RepoGit {
    pub fn new(
        git: Arc<dyn GitClient>,
        github: Arc<dyn PullRequestCreator>,
        locks: Arc<RepoLocks>,
    ) -> Self {
        Self { git, github, locks }
    }

    /// `Sending` while a workflow holds the project's repository.
    pub fn status(&self, project: &ServerProjectConfig) -> PullRequestStatus {
        if self.locks.is_locked(project.repo_path()) {
            PullRequestStatus::Sending
        } else {
            PullRequestStatus::Idle
        }
    }

    /// Propose the store's translations as a pull request.
    ///
    /// Never fails: every outcome, including a busy repository, is
    /// reported as a status.
    pub async fn send_pull_request(
        &self,
        project: &ServerProjectConfig,
        stores: &StoreRegistry,
        token: Option<String>,
    ) -> PullRequestStatus {
        let repo = project.repo_path();
        let Some(_lock) = self.locks.try_acquire(repo) else {
            warn!(
                "Pull request for {} rejected, repository {} is busy",
                project.name,
                repo.display()
            );
            return PullRequestStatus::from_error(&LyraError::RequestInProgress);
        };

        info!("Sending pull request for {}", project.name);
        let result = self.propose(project, stores, token).await;

        if let Err(e) = self.sync_base_branch(repo, &project.base_branch).await {
            error!(
                "Could not restore {} to {}: {}",
                repo.display(),
                project.base_branch,
                e
            );
        }

        match result {
            Ok(status) => status,
            Err(LyraError::NoChanges) => {
                info!("No translation changes for {}", project.name);
                PullRequestStatus::from_error(&LyraError::NoChanges)
            }
            Err(e) => {
                error!("Pull request for {} failed: {}", project.name, e);
                PullRequestStatus::from_error(&e)
            }
        }
    }

    /// Check out the base branch and pull. Returns whether upstream moved.
    async fn sync_base_branch(&self, repo: &Path, base: &str) -> Result<bool, LyraError> {
        self.git.checkout(repo, base).await?;
        self.git.pull(repo).await
    }

    async fn propose(
        &self,
        project: &ServerProjectConfig,
        stores: &StoreRegistry,
        token: Option<String>,
    ) -> Result<PullRequestStatus, LyraError> {
        let token = token.ok_or_else(|| LyraError::MissingGitHubToken(project.name.clone()))?;
        let repo = project.repo_path();
        let base = project.base_branch.as_str();

        let upstream_changed = self.sync_base_branch(repo, base).await?;
        let project_config = LyraConfig::read(repo)
            .await?
            .project(&project.sub_project_path)?;
        let store = stores.get_or_create(&project_config);
        if upstream_changed {
            info!("{} moved upstream, refreshing store", base);
            store.refresh().await?;
        }

        let files = group_by_source_file(&store.snapshot().await?);
        let written = write_language_files(&project_config.translations_dir(), &files).await?;

        let dirty = self.git.status(repo).await?;
        let changed: Vec<PathBuf> = written
            .into_iter()
            .filter(|path| dirty.iter().any(|d| repo.join(d) == *path))
            .collect();
        if changed.is_empty() {
            return Err(LyraError::NoChanges);
        }

        let branch_name = generate_branch_name();
        let changed_names: Vec<String> = changed
            .iter()
            .map(|p| p.strip_prefix(repo).unwrap_or(p).display().to_string())
            .collect();
        let (title, body) = describe_changes(project, &changed_names);

        self.git.checkout_branch(repo, &branch_name, base).await?;
        self.git.add(repo, &changed).await?;
        self.git.commit(repo, &title).await?;
        self.git.push(repo, &branch_name).await?;

        let pull_request_url = self
            .github
            .create_pull_request(&PullRequestRequest {
                owner: project.owner.clone(),
                repo: project.repo.clone(),
                base_branch: base.to_string(),
                branch_name: branch_name.clone(),
                title,
                body,
                token,
            })
            .await?;

        info!("Opened {} for {}", pull_request_url, project.name);
        Ok(PullRequestStatus::Success {
            branch_name,
            pull_request_url,
        })
    }
}
