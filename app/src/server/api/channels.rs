//! Channel registry API.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;

use crate::app::SharedState;
use crate::scheduler::PollTrigger;

use super::{ApiResult, db_err, err_json};

#[derive(Debug, Deserialize)]
pub struct AddChannelBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
    pub active: bool,
}

/// GET /api/channels
pub async fn list_channels(State(state): State<SharedState>) -> ApiResult {
    let channels = state.db().list_channels(None).map_err(db_err)?;
    let last_notified = state.db().get_all_last_notified().map_err(db_err)?;
    Ok(Json(json!({
        "channels": channels,
        "lastNotified": last_notified,
        "count": channels.len(),
    })))
}

/// POST /api/channels
pub async fn add_channel(
    State(state): State<SharedState>,
    Json(body): Json<AddChannelBody>,
) -> ApiResult {
    let name = notifier_db::channels::normalize_channel_name(&body.name).map_err(db_err)?;
    let added = state.db().add_channel(&name).map_err(db_err)?;
    if added {
        tracing::info!(channel = %name, "Channel added");
        state.scheduler().trigger(PollTrigger::ChannelAdded(name.clone()));
    }
    Ok(Json(json!({ "status": "ok", "added": added, "name": name })))
}

/// DELETE /api/channels/{name}
pub async fn remove_channel(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult {
    if !state.db().remove_channel(&name).map_err(db_err)? {
        return Err(err_json(404, &format!("channel {name} not found")));
    }
    tracing::info!(channel = %name, "Channel removed");
    Ok(Json(json!({ "status": "ok" })))
}

/// PUT /api/channels/{name}/active
pub async fn set_active(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(body): Json<ActiveBody>,
) -> ApiResult {
    state
        .db()
        .set_channel_active(&name, body.active)
        .map_err(db_err)?;
    if body.active {
        state
            .scheduler()
            .trigger(PollTrigger::ChannelActivated(name.to_ascii_lowercase()));
    }
    Ok(Json(json!({ "status": "ok", "name": name, "active": body.active })))
}
