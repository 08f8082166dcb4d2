use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use super::*;
use crate::HELIX_BASE;

impl TwitchApiClient {
    pub fn new(client_id: String) -> Self {
        Self::with_http(reqwest::Client::new(), client_id)
    }

    /// Build a client sharing an existing HTTP connection pool.
    pub fn with_http(http: reqwest::Client, client_id: String) -> Self {
        Self {
            http,
            client_id,
            base_url: HELIX_BASE.to_string(),
        }
    }

    /// Point the client at a different Helix base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build auth headers from the given token.
    fn auth_headers(&self, token: &Token) -> Result<HeaderMap, TwitchError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", token.access_token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|_| TwitchError::InvalidHeader("authorization".into()))?,
        );
        headers.insert(
            "Client-Id",
            HeaderValue::from_str(&self.client_id)
                .map_err(|_| TwitchError::InvalidHeader("client-id".into()))?,
        );
        Ok(headers)
    }

    /// Execute a GET request with auth headers.
    pub(super) async fn authenticated_get(
        &self,
        url: &str,
        token: &Token,
    ) -> Result<String, TwitchError> {
        let headers = self.auth_headers(token)?;
        let resp = self.http.get(url).headers(headers).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!(url, "Got 401, caller should refresh token and retry");
            return Err(TwitchError::ApiError {
                status: 401,
                message: body,
            });
        }

        if !status.is_success() {
            return Err(TwitchError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(body)
    }
}
