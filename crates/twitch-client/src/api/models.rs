use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Wrapper for Twitch Helix list responses.
#[derive(Debug, Deserialize)]
pub struct HelixResponse<T> {
    pub data: Vec<T>,
}

/// Stream information from GET /helix/streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_login: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(default)]
    pub started_at: Option<String>,
}

impl StreamInfo {
    /// Stream start as epoch milliseconds, if present and valid RFC 3339.
    pub fn started_at_millis(&self) -> Option<i64> {
        let raw = self.started_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }
}

/// Convenience wrapper returned by [`super::TwitchApiClient::get_stream_by_login`].
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    pub is_live: bool,
    pub info: Option<StreamInfo>,
}
