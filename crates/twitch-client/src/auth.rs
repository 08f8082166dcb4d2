//! OAuth app access tokens for Twitch.
//!
//! The notifier only reads public stream data, so it authenticates with the
//! client credentials grant: no user login, no refresh token.

use serde::Deserialize;

use crate::{TOKEN_URL, Token, TwitchError};

/// Twitch OAuth token response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Twitch OAuth error response.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    message: Option<String>,
}

/// Requests app access tokens for one client identity.
pub struct TwitchAuth {
    client_id: String,
    client_secret: String,
    token_url: String,
    http: reqwest::Client,
}

impl TwitchAuth {
    /// Create a new auth client against the production token endpoint.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self::with_http(reqwest::Client::new(), client_id, client_secret)
    }

    /// Create an auth client sharing an existing HTTP connection pool.
    pub fn with_http(http: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            token_url: TOKEN_URL.to_string(),
            http,
        }
    }

    /// Point the client at a different token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Request a new app access token (client credentials grant).
    pub async fn request_app_token(&self) -> Result<Token, TwitchError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(TwitchError::MissingCredentials);
        }

        tracing::debug!("Requesting Twitch app access token");

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        parse_token_response(resp).await
    }
}

/// Parse the token endpoint response into a `Token`.
async fn parse_token_response(resp: reqwest::Response) -> Result<Token, TwitchError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let err: ErrorResponse = serde_json::from_str(&body).unwrap_or(ErrorResponse {
            status: Some(status.as_u16()),
            message: Some(body.clone()),
        });
        return Err(TwitchError::TokenRequestFailed(format!(
            "{}: {}",
            err.status.unwrap_or(status.as_u16()),
            err.message.unwrap_or_default()
        )));
    }

    let token_resp: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| TwitchError::TokenRequestFailed(format!("failed to parse response: {e}")))?;

    if token_resp.access_token.is_empty() {
        return Err(TwitchError::TokenRequestFailed(
            "empty access_token in response".into(),
        ));
    }

    Ok(Token::new(token_resp.access_token))
}
