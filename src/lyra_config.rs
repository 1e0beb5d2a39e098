//! Per-repository `lyra.yml`: which projects a repository contains and
//! where their messages and translations live.
//!
//! ```yaml
//! projects:
//!   - path: .
//!     messages:
//!       format: ts
//!       path: src
//!     translations:
//!       path: src/locale
//!     languages: [sv, de]
//! ```

use crate::error::LyraError;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

pub const LYRA_CONFIG_FILE: &str = "lyra.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    Yaml,
    Ts,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessagesConfig {
    pub format: MessageFormat,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranslationsConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectEntry {
    #[serde(default = "default_project_path")]
    path: PathBuf,
    messages: MessagesConfig,
    translations: TranslationsConfig,
    #[serde(default)]
    languages: Vec<String>,
}

fn default_project_path() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Deserialize)]
struct LyraConfigFile {
    projects: Vec<ProjectEntry>,
}

/// One project of a repository, with paths resolved against the
/// repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Absolute project directory.
    pub root: PathBuf,
    pub messages: MessagesConfig,
    pub translations: TranslationsConfig,
    /// Languages the project is translated into, even before any
    /// translation file exists for them.
    pub languages: Vec<String>,
}

impl ProjectConfig {
    pub fn messages_dir(&self) -> PathBuf {
        self.root.join(&self.messages.path)
    }

    pub fn translations_dir(&self) -> PathBuf {
        self.root.join(&self.translations.path)
    }
}

#[derive(Debug, Clone)]
pub struct LyraConfig {
    repo_path: PathBuf,
    projects: Vec<ProjectEntry>,
}

impl LyraConfig {
    /// Read `lyra.yml` from the root of a repository working copy.
    pub async fn read(repo_path: &Path) -> Result<Self, LyraError> {
        let path = repo_path.join(LYRA_CONFIG_FILE);
        let content =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| LyraError::LyraConfigReading {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
        Self::parse(repo_path, &content).map_err(|reason| LyraError::LyraConfigReading {
            path,
            reason,
        })
    }

    fn parse(repo_path: &Path, content: &str) -> Result<Self, String> {
        let file: LyraConfigFile = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        Ok(Self {
            repo_path: repo_path.to_path_buf(),
            projects: file.projects,
        })
    }

    /// The project whose `path` matches `sub_path` (both relative to the
    /// repository root).
    pub fn project(&self, sub_path: &Path) -> Result<ProjectConfig, LyraError> {
        let wanted = normalize_relative(sub_path);
        self.projects
            .iter()
            .find(|p| normalize_relative(&p.path) == wanted)
            .map(|p| ProjectConfig {
                root: self.repo_path.join(&wanted),
                messages: p.messages.clone(),
                translations: p.translations.clone(),
                languages: p.languages.clone(),
            })
            .ok_or_else(|| LyraError::LyraProjectNotFound(self.repo_path.join(sub_path)))
    }
}

/// Drop `.` components so `./app/`, `app` and `app/.` compare equal.
pub fn normalize_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
