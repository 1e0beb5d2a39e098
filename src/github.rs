use crate::error::LyraError;
use crate::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Everything needed to open one pull request.
#[derive(Debug, Clone)]
pub struct PullRequestRequest {
    pub owner: String,
    pub repo: String,
    pub base_branch: String,
    pub branch_name: String,
    pub title: String,
    pub body: String,
    pub token: String,
}

/// Opens pull requests; returns the URL of the created PR.
#[async_trait]
pub trait PullRequestCreator: Send + Sync {
    async fn create_pull_request(&self, request: &PullRequestRequest) -> Result<String, LyraError>;
}

/// GitHub REST body for `POST /repos/{owner}/{repo}/pulls`
#[derive(Debug, Serialize)]
struct CreatePullRequestBody<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    html_url: String,
}

#[derive(Debug)]
enum CallError {
    Status(StatusCode, String),
    /// The request never reached GitHub.
    Connect(String),
    /// The request may have been processed: timeouts after sending, broken
    /// connections and unreadable success bodies.
    Transport(String),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status, body) => write!(f, "({}) {}", status, body),
            Self::Connect(e) | Self::Transport(e) => write!(f, "{}", e),
        }
    }
}

/// Retry 429 and 5xx responses and failures to connect.
///
/// Creating a pull request is not idempotent, so anything that may have
/// reached GitHub without a clear error status is final.
fn is_retryable(error: &CallError) -> bool {
    match error {
        CallError::Status(status, _) => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        CallError::Connect(_) => true,
        CallError::Transport(_) => false,
    }
}

fn send_error(error: reqwest::Error) -> CallError {
    if error.is_connect() {
        CallError::Connect(error.to_string())
    } else {
        CallError::Transport(error.to_string())
    }
}

/// `PullRequestCreator` backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    retry: RetryConfig,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>) -> Result<Self, LyraError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lyra/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LyraError::GitHub(e.to_string()))?;
        Ok(Self::with_http_client(client, api_url))
    }

    pub fn with_http_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::github_api(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl PullRequestCreator for GitHubClient {
    async fn create_pull_request(&self, request: &PullRequestRequest) -> Result<String, LyraError> {
        let url = format!(
            "{}/repos/{}/{}/pulls",
            self.api_url, request.owner, request.repo
        );
        let body = CreatePullRequestBody {
            title: &request.title,
            body: &request.body,
            head: &request.branch_name,
            base: &request.base_branch,
        };

        let created = with_retry_if(
            &self.retry,
            "GitHub create pull request",
            || async {
                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(&request.token)
                    .header("Accept", "application/vnd.github+json")
                    .json(&body)
                    .send()
                    .await
                    .map_err(send_error)?;

                let status = response.status();
                if !status.is_success() {
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
                    return Err(CallError::Status(status, text));
                }

                response
                    .json::<PullRequestResponse>()
                    .await
                    .map_err(|e| CallError::Transport(format!("invalid response: {}", e)))
            },
            is_retryable,
        )
        .await
        .map_err(|e| LyraError::GitHub(e.to_string()))?;

        info!(
            "Opened pull request {} for {}/{}",
            created.html_url, request.owner, request.repo
        );
        Ok(created.html_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn request() -> PullRequestRequest {
        PullRequestRequest {
            owner: "zetkin".to_string(),
            repo: "app".to_string(),
            base_branch: "main".to_string(),
            branch_name: "lyra-translate-1".to_string(),
            title: "Translations".to_string(),
            body: "Updated sv".to_string(),
            token: "test-token".to_string(),
        }
    }

    fn client(server: &MockServer) -> GitHubClient {
        GitHubClient::new(server.uri())
            .unwrap()
            .with_retry(RetryConfig::new(3, Duration::from_millis(5)))
    }

    #[tokio::test]
    async fn test_create_pull_request_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/zetkin/app/pulls"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_json(serde_json::json!({
                "title": "Translations",
                "body": "Updated sv",
                "head": "lyra-translate-1",
                "base": "main",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "number": 12,
                "html_url": "https://github.com/zetkin/app/pull/12",
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = client(&mock_server)
            .create_pull_request(&request())
            .await
            .unwrap();

        assert_eq!(url, "https://github.com/zetkin/app/pull/12");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/zetkin/app/pulls"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/zetkin/app/pulls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "html_url": "https://github.com/zetkin/app/pull/13",
            })))
            .mount(&mock_server)
            .await;

        let url = client(&mock_server)
            .create_pull_request(&request())
            .await
            .unwrap();

        assert_eq!(url, "https://github.com/zetkin/app/pull/13");
    }

    #[tokio::test]
    async fn test_validation_errors_are_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/zetkin/app/pulls"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string("A pull request already exists"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client(&mock_server).create_pull_request(&request()).await;

        match result {
            Err(LyraError::GitHub(message)) => {
                assert!(message.contains("422"));
                assert!(message.contains("already exists"));
            }
            other => panic!("expected GitHub error, got {:?}", other),
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&CallError::Status(StatusCode::BAD_GATEWAY, String::new())));
        assert!(is_retryable(&CallError::Status(
            StatusCode::TOO_MANY_REQUESTS,
            String::new()
        )));
        assert!(!is_retryable(&CallError::Status(StatusCode::UNAUTHORIZED, String::new())));
        assert!(is_retryable(&CallError::Connect("refused".into())));
        assert!(!is_retryable(&CallError::Transport("timed out".into())));
    }

    #[tokio::test]
    async fn test_unreadable_success_body_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/zetkin/app/pulls"))
            .respond_with(ResponseTemplate::new(201).set_body_string("not json"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/zetkin/app/pulls"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string("A pull request already exists"),
            )
            .expect(0)
            .mount(&mock_server)
            .await;

        let result = client(&mock_server).create_pull_request(&request()).await;

        match result {
            Err(LyraError::GitHub(message)) => assert!(message.contains("invalid response")),
            other => panic!("expected GitHub error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_after_sending_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/zetkin/app/pulls"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({
                        "html_url": "https://github.com/zetkin/app/pull/14",
                    }))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let github = GitHubClient::with_http_client(
            reqwest::Client::builder()
                .timeout(Duration::from_millis(50))
                .build()
                .unwrap(),
            mock_server.uri(),
        )
        .with_retry(RetryConfig::new(3, Duration::from_millis(5)));

        let result = github.create_pull_request(&request()).await;

        assert!(matches!(result, Err(LyraError::GitHub(_))));
    }

    #[tokio::test]
    async fn test_connection_failures_are_retried() {
        // Nothing listens on the discard port
        let github = GitHubClient::new("http://127.0.0.1:9")
            .unwrap()
            .with_retry(RetryConfig::new(2, Duration::from_millis(5)));

        let result = github.create_pull_request(&request()).await;

        assert!(matches!(result, Err(LyraError::GitHub(_))));
    }
}
