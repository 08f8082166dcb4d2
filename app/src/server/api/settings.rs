//! Settings API:
//!   GET /api/settings – current settings (secret masked)
//!   PUT /api/settings – partial update

use axum::Json;
use axum::extract::State;
use serde_json::json;

use crate::app::SharedState;
use crate::config::SettingsUpdate;

use super::{ApiResult, err_json};

/// GET /api/settings
pub async fn get_settings(State(state): State<SharedState>) -> ApiResult {
    let view = state
        .settings()
        .view()
        .map_err(|e| err_json(500, &format!("Failed to get settings: {e}")))?;
    Ok(Json(json!({ "settings": view })))
}

/// PUT /api/settings
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(body): Json<SettingsUpdate>,
) -> ApiResult {
    let sm = state.settings();
    let updated = sm.apply_update(&body).map_err(|e| err_json(400, &e.to_string()))?;

    if let Some(minutes) = body.check_interval {
        state.scheduler().reconfigure_if_changed(minutes);
    }
    state
        .reload_config()
        .await
        .map_err(|e| err_json(500, &format!("Failed to reload config: {e}")))?;

    let view = sm
        .view()
        .map_err(|e| err_json(500, &format!("Failed to get settings: {e}")))?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Updated {updated} setting(s) successfully"),
        "settings": view,
    })))
}
