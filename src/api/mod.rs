use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::dispatch::DispatchHandle;

pub mod handlers;

/// Shared application state passed to handlers.
pub struct AppState {
    pub dispatch: DispatchHandle,
}

/// Build the HTTP router for login and token verification.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/login", post(handlers::login))
        .route("/tokens/verify", post(handlers::verify_token))
        .route("/tokens", delete(handlers::deactivate_token))
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
        .with_state(state)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
