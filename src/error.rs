//! Error types shared by the store, adapters, git workflow and HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::path::PathBuf;
use thiserror::Error;

/// A single language file that could not be written.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteLanguageFileError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum LyraError {
    #[error("language not found: {0}")]
    LanguageNotFound(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// No project with this name in the server config.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// No store registered for this project path.
    #[error("no project store for path {}", .0.display())]
    StoreNotFound(PathBuf),

    /// `lyra.yml` has no entry for the project path.
    #[error("no lyra.yml project entry for path {}", .0.display())]
    LyraProjectNotFound(PathBuf),

    #[error("could not read lyra.yml at {}: {reason}", .path.display())]
    LyraConfigReading { path: PathBuf, reason: String },

    #[error("could not read server config at {}: {reason}", .path.display())]
    ServerConfigReading { path: PathBuf, reason: String },

    #[error("could not read {}: {reason}", .path.display())]
    AdapterRead { path: PathBuf, reason: String },

    #[error("failed to write language files: {}", format_paths(.0))]
    WriteLanguageFiles(Vec<WriteLanguageFileError>),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("GitHub API error: {0}")]
    GitHub(String),

    #[error("no GitHub token configured for project {0}")]
    MissingGitHubToken(String),

    /// A pull request workflow already holds the repository.
    #[error("another request in progress")]
    RequestInProgress,

    /// Writing the translations left the base branch untouched.
    #[error("no changes in base branch")]
    NoChanges,

    #[error("unauthorized")]
    Unauthorized,
}

fn format_paths(errors: &[WriteLanguageFileError]) -> String {
    errors
        .iter()
        .map(|e| e.path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl LyraError {
    pub fn adapter_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::AdapterRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status for this error.
    ///
    /// - Not-found variants: 404
    /// - Unauthorized: 401
    /// - Another pull request in progress: 409
    /// - No changes to propose: 422
    /// - Everything else (config, reading, writing, git, GitHub): 500
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::LanguageNotFound(_)
            | Self::MessageNotFound(_)
            | Self::ProjectNotFound(_)
            | Self::StoreNotFound(_)
            | Self::LyraProjectNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RequestInProgress => StatusCode::CONFLICT,
            Self::NoChanges => StatusCode::UNPROCESSABLE_ENTITY,
            Self::LyraConfigReading { .. }
            | Self::ServerConfigReading { .. }
            | Self::AdapterRead { .. }
            | Self::WriteLanguageFiles(_)
            | Self::Git { .. }
            | Self::GitHub(_)
            | Self::MissingGitHubToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a user.
    ///
    /// Not-found and write errors name the entity or files involved; other
    /// errors stay generic so no internal detail leaks out.
    pub fn user_message(&self) -> String {
        match self {
            Self::LanguageNotFound(_)
            | Self::MessageNotFound(_)
            | Self::ProjectNotFound(_)
            | Self::WriteLanguageFiles(_)
            | Self::Unauthorized
            | Self::RequestInProgress
            | Self::NoChanges
            | Self::MissingGitHubToken(_) => self.to_string(),
            Self::StoreNotFound(_) | Self::LyraProjectNotFound(_) => {
                "project not found".to_string()
            }
            Self::LyraConfigReading { .. } => "could not read lyra.yml".to_string(),
            Self::ServerConfigReading { .. } => "could not read server config".to_string(),
            Self::AdapterRead { .. } => "could not read project files".to_string(),
            Self::Git { command, .. } => format!("git {} failed", command),
            Self::GitHub(_) => "could not create pull request on GitHub".to_string(),
        }
    }
}

impl IntoResponse for LyraError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = serde_json::json!({ "error": self.user_message() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_errors_map_to_404() {
        assert_eq!(
            LyraError::LanguageNotFound("xx".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LyraError::MessageNotFound("a.b".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LyraError::ProjectNotFound("app".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_config_errors_map_to_500() {
        let err = LyraError::ServerConfigReading {
            path: PathBuf::from("config.yaml"),
            reason: "missing".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "could not read server config");
    }

    #[test]
    fn test_write_errors_list_failing_paths() {
        let err = LyraError::WriteLanguageFiles(vec![
            WriteLanguageFileError {
                path: PathBuf::from("/repo/locale/sv.yml"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            },
            WriteLanguageFileError {
                path: PathBuf::from("/repo/locale/de.yml"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            },
        ]);

        let message = err.user_message();
        assert!(message.contains("/repo/locale/sv.yml"));
        assert!(message.contains("/repo/locale/de.yml"));
    }

    #[test]
    fn test_git_error_hides_stderr_from_users() {
        let err = LyraError::Git {
            command: "push".into(),
            stderr: "fatal: secret token rejected".into(),
        };
        assert_eq!(err.user_message(), "git push failed");
        assert!(err.to_string().contains("secret token"));
    }
}
