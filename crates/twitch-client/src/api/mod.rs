//! Twitch Helix REST API client.
//!
//! Provides typed access to the stream status endpoint with
//! Bearer token + Client-ID header injection. A 401 is surfaced as
//! [`TwitchError::ApiError`] so the caller can refresh and retry.

mod request;
mod streams;

pub mod models;

pub use models::{HelixResponse, StreamInfo, StreamStatus};

use crate::{Token, TwitchError};

/// Twitch Helix API client with automatic auth header injection.
pub struct TwitchApiClient {
    pub(super) http: reqwest::Client,
    pub(super) client_id: String,
    pub(super) base_url: String,
}
