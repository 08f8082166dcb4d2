//! Player pattern CRUD API.

use axum::Json;
use axum::extract::{Path, State};
use notifier_db::player_patterns::PlayerPattern;
use player_patterns::{load_patterns, validate_pattern};
use serde::Deserialize;
use serde_json::json;

use crate::app::SharedState;

use super::{ApiResult, db_err, err_json};

#[derive(Debug, Deserialize)]
pub struct NewPatternBody {
    pub key: String,
    pub name: String,
    pub pattern: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

/// GET /api/player-patterns
pub async fn list_patterns(State(state): State<SharedState>) -> ApiResult {
    let patterns = load_patterns(state.db()).map_err(db_err)?;
    Ok(Json(json!({ "patterns": patterns, "count": patterns.len() })))
}

/// POST /api/player-patterns
pub async fn add_pattern(
    State(state): State<SharedState>,
    Json(body): Json<NewPatternBody>,
) -> ApiResult {
    let key = body.key.trim();
    if key.is_empty() {
        return Err(err_json(400, "key is required"));
    }
    validate_pattern(&body.pattern).map_err(|e| err_json(400, &e.to_string()))?;

    player_patterns::seed_default_patterns(state.db())
        .map_err(|e| err_json(500, &e.to_string()))?;
    let pattern = PlayerPattern {
        key: key.to_string(),
        name: body.name.trim().to_string(),
        enabled: body.enabled,
        pattern: body.pattern,
    };
    if !state
        .db()
        .insert_player_pattern(pattern.clone())
        .map_err(db_err)?
    {
        return Err(err_json(409, &format!("pattern {key} already exists")));
    }
    Ok(Json(json!({ "status": "ok", "pattern": pattern })))
}

/// PUT /api/player-patterns/{key}
pub async fn set_enabled(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(body): Json<EnabledBody>,
) -> ApiResult {
    player_patterns::seed_default_patterns(state.db())
        .map_err(|e| err_json(500, &e.to_string()))?;
    state
        .db()
        .set_player_pattern_enabled(&key, body.enabled)
        .map_err(db_err)?;
    Ok(Json(json!({ "status": "ok", "key": key, "enabled": body.enabled })))
}

/// DELETE /api/player-patterns/{key}
pub async fn delete_pattern(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> ApiResult {
    if !state.db().delete_player_pattern(&key).map_err(db_err)? {
        return Err(err_json(404, &format!("pattern {key} not found")));
    }
    Ok(Json(json!({ "status": "ok" })))
}
