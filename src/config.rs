use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // HTTP
    pub port: u16,
    /// When set, mutating routes require a matching `X-API-Key` header
    pub api_key: Option<String>,

    // Projects
    pub server_config_file: PathBuf,
    pub server_config_ttl: Duration,

    // GitHub
    pub github_token: Option<String>,
    pub github_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: match std::env::var("PORT") {
                Ok(port) => port.parse().context("PORT must be a valid port number")?,
                Err(_) => 3000,
            },
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),

            server_config_file: std::env::var("LYRA_SERVER_CONFIG")
                .unwrap_or_else(|_| "config.yaml".to_string())
                .into(),
            server_config_ttl: Duration::from_secs(
                std::env::var("LYRA_CONFIG_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),

            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            github_api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
        })
    }
}
