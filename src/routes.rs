use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the axum Router: WebSocket endpoint, health check, and the static
/// client bundle served from `public_dir` for everything else.
pub fn build_router(state: AppState, public_dir: &str) -> Router {
    let client_bundle = ServeDir::new(public_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/ws", axum::routing::get(ws_handler::ws_upgrade))
        .route("/health", axum::routing::get(health_check))
        .fallback_service(client_bundle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
