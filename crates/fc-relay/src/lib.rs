//! # FrameChat Relay
//!
//! Ordered fan-out relay for chat list mutations and video frames. Keeps the
//! canonical chat log in memory and hands it to every peer on connect.

pub mod api;
pub mod hub;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use hub::{Hub, PeerSender};

/// Shared application state available to all handlers.
pub struct AppState {
    pub hub: Arc<Hub>,
    pub config: fc_common::AppConfig,
}

impl AppState {
    pub fn new(config: fc_common::AppConfig) -> Self {
        Self {
            hub: Arc::new(Hub::new()),
            config,
        }
    }
}

/// Build the relay router: `/ws` for peers, `/api` for inspection.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api::router(state.clone()))
        .merge(ws::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
