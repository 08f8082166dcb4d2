use url::Url;

use super::*;

impl TwitchApiClient {
    /// Get live status for one channel by login name.
    ///
    /// An empty `data` array means the channel is offline.
    pub async fn get_stream_by_login(
        &self,
        token: &Token,
        login: &str,
    ) -> Result<StreamStatus, TwitchError> {
        let url = streams_url(&self.base_url, login)?;
        let body = self.authenticated_get(url.as_str(), token).await?;
        let resp: HelixResponse<StreamInfo> = serde_json::from_str(&body)?;

        match resp.data.into_iter().next() {
            Some(info) => Ok(StreamStatus {
                is_live: true,
                info: Some(info),
            }),
            None => Ok(StreamStatus {
                is_live: false,
                info: None,
            }),
        }
    }
}

pub(super) fn streams_url(base_url: &str, login: &str) -> Result<Url, TwitchError> {
    let url = Url::parse_with_params(&format!("{base_url}/streams"), &[("user_login", login)])?;
    Ok(url)
}
