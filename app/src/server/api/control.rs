//! POST /api/control: control messages tagged by `action`.

use axum::Json;
use axum::extract::State;
use serde_json::Value;

use crate::app::SharedState;
use crate::control::{ControlError, ControlMessage, handle_control};

use super::{ApiResult, err_json};

pub async fn post_control(State(state): State<SharedState>, Json(body): Json<Value>) -> ApiResult {
    let message: ControlMessage = serde_json::from_value(body)
        .map_err(|e| err_json(400, &format!("invalid control message: {e}")))?;

    match handle_control(&state, message).await {
        Ok(reply) => serde_json::to_value(reply)
            .map(Json)
            .map_err(|e| err_json(500, &e.to_string())),
        Err(ControlError::InvalidInput(msg)) => Err(err_json(400, &msg)),
        Err(ControlError::Internal(e)) => {
            tracing::error!("Control message failed: {e}");
            Err(err_json(500, &e.to_string()))
        }
    }
}
