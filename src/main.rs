use anyhow::{Context, Result};
use lyra::config::Config;
use lyra::context::AppContext;
use lyra::git::CommandGit;
use lyra::github::GitHubClient;
use lyra::retry::RetryConfig;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lyra=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let port = config.port;
    info!(
        "Starting Lyra with projects from {}",
        config.server_config_file.display()
    );
    if config.api_key.is_none() {
        info!("API_KEY not set, mutating routes are unprotected");
    }

    let github = GitHubClient::new(config.github_api_url.clone())
        .context("Failed to create GitHub client")?
        .with_retry(RetryConfig::github_api());
    let context = Arc::new(AppContext::new(
        config,
        Arc::new(CommandGit),
        Arc::new(github),
    ));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, lyra::api::router(context))
        .await
        .context("Server error")?;
    Ok(())
}
