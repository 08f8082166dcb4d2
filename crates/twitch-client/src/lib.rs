//! Twitch integration client library.
//!
//! Provides the app-access (client credentials) OAuth grant and
//! the Helix stream status endpoint used by the live notifier.

pub mod api;
pub mod auth;

use serde::{Deserialize, Serialize};

/// Default OAuth token endpoint.
pub const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Default Helix REST base URL.
pub const HELIX_BASE: &str = "https://api.twitch.tv/helix";

/// App access token obtained with the client credentials grant.
///
/// No expiry is tracked: a token is used until a request comes back 401,
/// at which point the caller throws it away and asks for a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

/// Unified error type for the twitch-client crate.
#[derive(Debug, thiserror::Error)]
pub enum TwitchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing client credentials")]
    MissingCredentials,

    #[error("Token request failed: {0}")]
    TokenRequestFailed(String),

    #[error("Twitch API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl TwitchError {
    /// True when the server rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TwitchError::ApiError { status: 401, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_only_matches_401() {
        let unauthorized = TwitchError::ApiError {
            status: 401,
            message: "invalid token".into(),
        };
        let forbidden = TwitchError::ApiError {
            status: 403,
            message: "nope".into(),
        };
        assert!(unauthorized.is_unauthorized());
        assert!(!forbidden.is_unauthorized());
        assert!(!TwitchError::MissingCredentials.is_unauthorized());
    }
}
