use crate::config::Config;
use crate::error::LyraError;
use crate::git::GitClient;
use crate::github::PullRequestCreator;
use crate::lyra_config::LyraConfig;
use crate::pull_request::{PullRequestStatus, RepoGit, RepoLocks};
use crate::server_config::{ServerConfig, ServerConfigCache, ServerProjectConfig};
use crate::store::{ProjectStore, StoreRegistry};
use std::sync::Arc;

/// Process-wide state shared by every request handler.
pub struct AppContext {
    pub config: Config,
    server_config: ServerConfigCache,
    stores: StoreRegistry,
    repo_git: RepoGit,
}

impl AppContext {
    pub fn new(
        config: Config,
        git: Arc<dyn GitClient>,
        github: Arc<dyn PullRequestCreator>,
    ) -> Self {
        let server_config = ServerConfigCache::new(
            config.server_config_file.clone(),
            config.server_config_ttl,
        );
        Self {
            config,
            server_config,
            stores: StoreRegistry::new(),
            repo_git: RepoGit::new(git, github, Arc::new(RepoLocks::new())),
        }
    }

    pub async fn server_config(&self) -> Result<Arc<ServerConfig>, LyraError> {
        self.server_config.get().await
    }

    pub async fn project(&self, name: &str) -> Result<ServerProjectConfig, LyraError> {
        Ok(self.server_config().await?.project(name)?.clone())
    }

    /// The store of a named project, created from its `lyra.yml` on first
    /// use. Later calls do not re-read `lyra.yml`.
    pub async fn store(
        &self,
        project: &ServerProjectConfig,
    ) -> Result<Arc<ProjectStore>, LyraError> {
        let path = project.project_path();
        if self.stores.has_project_store(&path) {
            return self.stores.project_store(&path);
        }

        let config = LyraConfig::read(project.repo_path())
            .await?
            .project(&project.sub_project_path)?;
        Ok(self.stores.get_or_create(&config))
    }

    /// Re-read `lyra.yml`, rebuilding the store if the project entry
    /// changed, then re-read the project files into it.
    pub async fn refresh(&self, project: &ServerProjectConfig) -> Result<(), LyraError> {
        let config = LyraConfig::read(project.repo_path())
            .await?
            .project(&project.sub_project_path)?;
        self.stores.get_or_create(&config).refresh().await
    }

    pub fn pull_request_status(&self, project: &ServerProjectConfig) -> PullRequestStatus {
        self.repo_git.status(project)
    }

    pub async fn send_pull_request(&self, project: &ServerProjectConfig) -> PullRequestStatus {
        let token = project
            .github_token
            .clone()
            .or_else(|| self.config.github_token.clone());
        self.repo_git
            .send_pull_request(project, &self.stores, token)
            .await
    }
}
