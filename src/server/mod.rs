//! HTTP API
//!
//! Thin axum layer over [`HybridSearcher`]. Handlers never fail on malformed
//! paging or ratio parameters; they clamp them.

mod handlers;

use crate::config::Config;
use crate::error::{CineError, Result};
use crate::search::HybridSearcher;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub use handlers::{ErrorBody, GenresResponse, IngestResponse, SimilarResponse};

#[derive(Clone)]
pub struct AppState {
    searcher: Arc<HybridSearcher>,
}

impl AppState {
    pub fn new(searcher: Arc<HybridSearcher>) -> Self {
        Self { searcher }
    }

    pub fn searcher(&self) -> &HybridSearcher {
        &self.searcher
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(handlers::search))
        .route("/movies", post(handlers::ingest))
        .route("/movies/:id", get(handlers::get_movie))
        .route("/movies/:id/similar", get(handlers::similar))
        .route("/genres", get(handlers::genres))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Serve the API until Ctrl-C
pub async fn serve(config: &Config, searcher: Arc<HybridSearcher>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(|e| CineError::Io {
            source: e,
            context: format!("Failed to bind {}", config.server.bind),
        })?;

    tracing::info!("Listening on {}", config.server.bind);

    axum::serve(listener, router(AppState::new(searcher)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CineError::Server(e.to_string()))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
