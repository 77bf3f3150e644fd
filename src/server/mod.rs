// HTTP front end
// Exposes the answerer and the session store over a small JSON API

pub mod errors;
mod handlers;


pub use errors::ApiError;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::answer::Answerer;
use crate::config::{ServerConfig, SessionConfig};
use crate::session::SessionStore;

/// Request limits applied by the handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub max_question_words: usize,
    pub max_history_turns: usize,
    pub max_sessions: usize,
    pub keep_sessions: usize,
}

impl QueryLimits {
    #[inline]
    pub fn from_config(server: &ServerConfig, session: &SessionConfig) -> Self {
        Self {
            max_question_words: server.max_question_words,
            max_history_turns: session.max_history_turns,
            max_sessions: session.max_sessions,
            keep_sessions: session.keep,
        }
    }
}

impl Default for QueryLimits {
    #[inline]
    fn default() -> Self {
        Self::from_config(&ServerConfig::default(), &SessionConfig::default())
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    answerer: Arc<dyn Answerer>,
    sessions: Arc<dyn SessionStore>,
    limits: QueryLimits,
    expose_error_details: bool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("limits", &self.limits)
            .field("expose_error_details", &self.expose_error_details)
            .finish_non_exhaustive()
    }
}

impl AppState {
    #[inline]
    pub fn new(
        answerer: Arc<dyn Answerer>,
        sessions: Arc<dyn SessionStore>,
        limits: QueryLimits,
    ) -> Self {
        Self {
            answerer,
            sessions,
            limits,
            expose_error_details: false,
        }
    }

    #[inline]
    pub fn with_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }
}

#[inline]
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/query",
            get(handlers::query_usage)
                .post(handlers::query)
                .options(handlers::query_preflight),
        )
        .route("/clear-session", post(handlers::clear_session))
        .route("/sessions-info", get(handlers::sessions_info))
        .layer(cors_layer(server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Development echoes any request origin; production allows only the configured
/// origins. Both send credentials, except a production `"*"` entry, which allows
/// any origin without them.
#[inline]
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if !server.production {
        return base
            .allow_origin(AllowOrigin::mirror_request())
            .allow_credentials(true);
    }
    if server.allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Bind and serve until Ctrl-C
#[inline]
pub async fn serve(router: Router, address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
