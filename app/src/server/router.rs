use axum::extract::State;
use axum::{
    Json, Router,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use super::api;
use crate::app::SharedState;

/// Create the axum router with all routes.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // --- Core ---
        .route("/status", get(status_handler))
        .route("/api/control", post(api::control::post_control))
        // --- Settings ---
        .route(
            "/api/settings",
            get(api::settings::get_settings).put(api::settings::update_settings),
        )
        // --- Channels ---
        .route(
            "/api/channels",
            get(api::channels::list_channels).post(api::channels::add_channel),
        )
        .route(
            "/api/channels/{name}",
            delete(api::channels::remove_channel),
        )
        .route(
            "/api/channels/{name}/active",
            put(api::channels::set_active),
        )
        // --- Player patterns ---
        .route(
            "/api/player-patterns",
            get(api::patterns::list_patterns).post(api::patterns::add_pattern),
        )
        .route(
            "/api/player-patterns/{key}",
            put(api::patterns::set_enabled).delete(api::patterns::delete_pattern),
        )
        // --- Middleware ---
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn status_handler(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "checkInterval": state.scheduler().interval_minutes(),
        "hasToken": state.credentials().has_token().await,
    }))
}
