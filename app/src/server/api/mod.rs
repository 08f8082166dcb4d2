//! REST API handlers grouped by domain.

pub mod channels;
pub mod control;
pub mod patterns;
pub mod settings;

use axum::Json;
use axum::http::StatusCode;
use notifier_db::DbError;
use serde_json::{Value, json};

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult = Result<Json<Value>, ApiError>;

/// Standard error response.
pub fn err_json(status: u16, message: &str) -> ApiError {
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({ "status": "error", "error": message })),
    )
}

/// Map store errors: bad input is the caller's fault, the rest is ours.
pub fn db_err(e: DbError) -> ApiError {
    match e {
        DbError::InvalidData(msg) => err_json(400, &msg),
        DbError::NotFound(what) => err_json(404, &format!("{what} not found")),
        other => err_json(500, &other.to_string()),
    }
}
