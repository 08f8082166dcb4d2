//! Default values for settings that may be absent from the store.

/// Minutes between scheduled polls.
pub const DEFAULT_CHECK_INTERVAL: u32 = 1;
pub const MIN_CHECK_INTERVAL: u32 = 1;
pub const MAX_CHECK_INTERVAL: u32 = 60;

pub const DEFAULT_SERVER_PORT: u16 = 8787;
pub const DEFAULT_DEVTOOLS_URL: &str = "http://127.0.0.1:9222";

/// Page opened for a live channel.
pub const CHANNEL_URL_BASE: &str = "https://www.twitch.tv/";

pub fn channel_url(channel: &str) -> String {
    format!("{CHANNEL_URL_BASE}{channel}")
}
