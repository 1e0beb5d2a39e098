//! Server-side list of projects, read from YAML and cached for a short
//! time so edits to the file are picked up without a restart.
//!
//! ```yaml
//! projects:
//!   - name: app
//!     owner: zetkin
//!     repo: app.zetkin.org
//!     base_branch: main
//!     local_path: /var/lyra/repos/app.zetkin.org
//!     sub_project_path: .
//! ```

use crate::error::LyraError;
use crate::lyra_config::normalize_relative;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerProjectConfig {
    pub name: String,
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Root of the repository working copy.
    pub local_path: PathBuf,
    /// Project directory inside the repository.
    #[serde(default = "default_sub_project_path")]
    pub sub_project_path: PathBuf,
    /// Overrides the server-wide GitHub token for this project.
    #[serde(default, skip_serializing)]
    pub github_token: Option<String>,
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_sub_project_path() -> PathBuf {
    PathBuf::from(".")
}

impl ServerProjectConfig {
    pub fn repo_path(&self) -> &Path {
        &self.local_path
    }

    /// Absolute project directory, the key of its project store.
    pub fn project_path(&self) -> PathBuf {
        let joined = self.local_path.join(normalize_relative(&self.sub_project_path));
        std::path::absolute(&joined).unwrap_or(joined)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub projects: Vec<ServerProjectConfig>,
}

impl ServerConfig {
    pub fn project(&self, name: &str) -> Result<&ServerProjectConfig, LyraError> {
        self.projects
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| LyraError::ProjectNotFound(name.to_string()))
    }

    async fn read(path: &Path) -> Result<Self, LyraError> {
        let reading_error = |reason: String| LyraError::ServerConfigReading {
            path: path.to_path_buf(),
            reason,
        };
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| reading_error(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| reading_error(e.to_string()))
    }
}

/// `ServerConfig` re-read from disk once its TTL has expired.
#[derive(Debug)]
pub struct ServerConfigCache {
    path: PathBuf,
    ttl: Duration,
    cached: Mutex<Option<(Instant, Arc<ServerConfig>)>>,
}

impl ServerConfigCache {
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        Self {
            path,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<Arc<ServerConfig>, LyraError> {
        let cached = self.cached.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some((read_at, config)) = cached {
            if read_at.elapsed() < self.ttl {
                return Ok(config);
            }
        }

        debug!("Reading server config from {}", self.path.display());
        let config = Arc::new(ServerConfig::read(&self.path).await?);
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((Instant::now(), Arc::clone(&config)));
        Ok(config)
    }
}
