use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

mod config;
mod critic;
mod error;
mod lexicon;
mod models;
mod moderation;
mod packet;
mod preprocess;
mod redis;
mod repository;
mod scoring;
mod session_state;
mod transport;
mod validation;

use crate::config::Config;
use crate::critic::GroqCritic;
use crate::error::ModeratorError;
use crate::models::ModerateRequest;
use crate::moderation::{ModerationOutcome, ModerationService};
use crate::redis::RedisManager;
use crate::repository::RedisSessionStore;
use crate::transport::GroqTransport;

struct AppState {
    moderator: ModerationService,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Arc::new(Config::load());

    // Initialize RedisManager and the session store on top of it
    let redis_manager = Arc::new(RedisManager::new_with_config(&config).await?);
    let store = Arc::new(RedisSessionStore::new(redis_manager));

    // Groq transport and critic; constructed once, reused per request
    let transport = Arc::new(GroqTransport::new(
        config.groq.api_key.clone(),
        config.get_groq_timeout(),
    )?);
    let critic = Arc::new(GroqCritic::new(transport, config.groq.model.clone()));

    let moderator = ModerationService::new(store, critic, &config)?;
    let app_state = Arc::new(AppState { moderator });

    let router = Router::new()
        .route("/api/moderate", post(moderate_route))
        .route("/health", get(|| async { "ok" }))
        .with_state(app_state);

    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {e}", config.server.bind))?;
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "Starting moderation HTTP server");

    axum::serve(listener, router).await?;
    Ok(())
}

async fn moderate_route(
    State(app): State<Arc<AppState>>,
    Json(request): Json<ModerateRequest>,
) -> axum::response::Response {
    match app.moderator.moderate(request).await {
        Ok(ModerationOutcome::Moderated(response)) => {
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(ModerationOutcome::Skipped(skip)) => (StatusCode::OK, Json(skip)).into_response(),
        Err(e @ ModeratorError::Validation(_)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Moderation cycle failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "moderation failed" })),
            )
                .into_response()
        }
    }
}
