//! HTTP routes over the project stores and the pull request workflow.

use crate::context::AppContext;
use crate::error::LyraError;
use crate::pull_request::PullRequestStatus;
use crate::security::{is_authorized, API_KEY_HEADER};
use crate::server_config::ServerProjectConfig;
use crate::store::{Message, TextMap};
use axum::async_trait;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

type Ctx = State<Arc<AppContext>>;

pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/projects", get(list_projects))
        .route("/api/projects/:name/messages", get(messages))
        .route("/api/projects/:name/languages", get(languages))
        .route("/api/projects/:name/translations/:lang", get(translations))
        .route(
            "/api/projects/:name/translations/:lang/:message_id",
            put(update_translation),
        )
        .route("/api/projects/:name/refresh", post(refresh))
        .route(
            "/api/projects/:name/pull-request",
            get(pull_request_status).post(send_pull_request),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

/// Extractor guarding mutating routes with the configured API key.
pub struct Authorized;

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for Authorized {
    type Rejection = LyraError;

    async fn from_request_parts(
        parts: &mut Parts,
        context: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if is_authorized(context.config.api_key.as_deref(), provided) {
            Ok(Authorized)
        } else {
            Err(LyraError::Unauthorized)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTranslationBody {
    pub text: String,
}

async fn health() -> &'static str {
    "ok"
}

async fn list_projects(State(context): Ctx) -> Result<Json<Vec<ServerProjectConfig>>, LyraError> {
    Ok(Json(context.server_config().await?.projects.clone()))
}

async fn messages(
    State(context): Ctx,
    Path(name): Path<String>,
) -> Result<Json<Vec<Message>>, LyraError> {
    let project = context.project(&name).await?;
    let store = context.store(&project).await?;
    Ok(Json(store.get_messages().await?))
}

async fn languages(
    State(context): Ctx,
    Path(name): Path<String>,
) -> Result<Json<BTreeMap<String, TextMap>>, LyraError> {
    let project = context.project(&name).await?;
    let store = context.store(&project).await?;
    Ok(Json(store.get_language_data().await?))
}

async fn translations(
    State(context): Ctx,
    Path((name, lang)): Path<(String, String)>,
) -> Result<Json<TextMap>, LyraError> {
    let project = context.project(&name).await?;
    let store = context.store(&project).await?;
    Ok(Json(store.get_translations(&lang).await?))
}

async fn update_translation(
    _: Authorized,
    State(context): Ctx,
    Path((name, lang, message_id)): Path<(String, String, String)>,
    Json(body): Json<UpdateTranslationBody>,
) -> Result<StatusCode, LyraError> {
    let project = context.project(&name).await?;
    let store = context.store(&project).await?;
    store
        .update_translation(&lang, &message_id, &body.text)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh(
    _: Authorized,
    State(context): Ctx,
    Path(name): Path<String>,
) -> Result<StatusCode, LyraError> {
    let project = context.project(&name).await?;
    context.refresh(&project).await?;
    info!("Refreshed {} on request", name);
    Ok(StatusCode::NO_CONTENT)
}

async fn pull_request_status(
    State(context): Ctx,
    Path(name): Path<String>,
) -> Result<Json<PullRequestStatus>, LyraError> {
    let project = context.project(&name).await?;
    Ok(Json(context.pull_request_status(&project)))
}

async fn send_pull_request(
    _: Authorized,
    State(context): Ctx,
    Path(name): Path<String>,
) -> Result<Json<PullRequestStatus>, LyraError> {
    let project = context.project(&name).await?;
    Ok(Json(context.send_pull_request(&project).await))
}
