use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all custody endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/owner", get(handler::owner_handler))
        .route("/package", post(handler::create_package))
        .route("/package/:id", get(handler::get_package))
        .route("/package/:id/history", get(handler::get_history))
        .route("/package/:id/last", get(handler::get_last_status))
        .route("/package/:id/status", put(handler::update_status))
        .route("/package/:id/tracking", get(handler::get_tracking))
        .route("/package/:id/trail", get(handler::get_trail))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
