//! HTTP surface: the dispatch endpoints plus the two tracking
//! endpoints recipients' mail clients and browsers hit.

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use handlers::{
    bulk_send, click_redirect, health, open_pixel, test_send, AppState, BulkSendBody,
    HealthResponse, TestSendBody, TestSendResponse,
};

/// Assemble the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/send/bulk", post(bulk_send))
        .route("/send/test", post(test_send))
        .route("/open", get(open_pixel))
        .route("/redirect", get(click_redirect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
