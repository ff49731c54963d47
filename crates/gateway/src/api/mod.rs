pub mod auth;
pub mod health;
pub mod mcp;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Build the full API router.
///
/// `GET /health` is public. `POST /mcp/message` is gated behind the
/// bearer-token auth middleware.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health::health));

    let protected = Router::new()
        .route("/mcp/message", post(mcp::mcp_message))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
