//! Live status lookups behind a trait so the engine can be driven by fakes.

use async_trait::async_trait;
use twitch_client::TwitchError;
use twitch_client::api::TwitchApiClient;

use crate::credentials::AccessGrant;

/// A channel that is currently broadcasting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStream {
    /// Stream start in epoch ms. `None` when Twitch sent no usable timestamp.
    pub started_at: Option<i64>,
    pub title: String,
    pub game_name: String,
}

#[async_trait]
pub trait StreamStatusSource: Send + Sync {
    /// `Ok(None)` means the channel is offline.
    async fn live_status(
        &self,
        grant: &AccessGrant,
        login: &str,
    ) -> Result<Option<LiveStream>, TwitchError>;
}

/// Helix-backed status source.
pub struct HelixStatusSource {
    http: reqwest::Client,
    base_url: String,
}

impl HelixStatusSource {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl StreamStatusSource for HelixStatusSource {
    async fn live_status(
        &self,
        grant: &AccessGrant,
        login: &str,
    ) -> Result<Option<LiveStream>, TwitchError> {
        let client = TwitchApiClient::with_http(self.http.clone(), grant.client_id.clone())
            .with_base_url(self.base_url.clone());
        let status = client.get_stream_by_login(&grant.token, login).await?;

        Ok(status.info.filter(|_| status.is_live).map(|info| LiveStream {
            started_at: info.started_at_millis(),
            title: info.title,
            game_name: info.game_name,
        }))
    }
}
