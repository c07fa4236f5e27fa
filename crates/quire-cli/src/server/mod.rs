//! HTTP surface for readers and moderators.
//!
//! Stateless per request: every handler opens its own store connection on
//! the blocking pool, so the shared [`AppState`] never changes after
//! startup.

mod auth;
mod error;
mod handlers;

use anyhow::Context as _;
use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    routing::{delete, get, post},
};
use quire_core::config::QuireConfig;
use quire_core::identity::TokenDirectory;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: PathBuf,
    pub tokens: Arc<TokenDirectory>,
    pub max_reply_depth: usize,
}

impl AppState {
    pub fn from_config(config: &QuireConfig) -> Self {
        Self {
            store: config.store.path.clone(),
            tokens: Arc::new(TokenDirectory::from_config(&config.auth)),
            max_reply_depth: config.server.max_reply_depth,
        }
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(Duration::from_secs(60 * 60)),
    )
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route(
            "/comments",
            get(handlers::read).post(handlers::submit_comment),
        )
        .route("/moderation/comments", get(handlers::queue))
        .route("/moderation/comments/{id}", delete(handlers::delete))
        .route("/moderation/comments/{id}/approve", post(handlers::approve))
        .route("/moderation/comments/{id}/spam", post(handlers::spam))
        .route("/moderation/comments/{id}/trash", post(handlers::trash))
        .route(
            "/moderation/posts/{reference}/orphans",
            get(handlers::orphans),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors_layer(cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// Bind and serve until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(config: &QuireConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    if state.tokens.is_empty() {
        warn!("no bearer tokens configured; only anonymous submissions will be accepted");
    }
    let app = router(state, &config.server.cors_origins);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("bind {}", config.server.bind))?;
    info!(
        addr = %listener.local_addr().context("read bound address")?,
        store = %config.store.path.display(),
        "quire listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(err) => {
                warn!(%err, "cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                warn!(%err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
