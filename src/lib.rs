//! Vigil - technical-indicator signal tracker with gated recommendation history

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use axum::Router;
use config::Config;
use services::{AnalysisCache, PollingScheduler, RecommendationStore, SymbolDirectory};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// Re-export commonly used types
pub use types::*;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<AnalysisCache>,
    pub store: Arc<RecommendationStore>,
    pub symbols: Arc<SymbolDirectory>,
    pub scheduler: Arc<PollingScheduler>,
}

/// Build the HTTP application with CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
