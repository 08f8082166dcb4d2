//! Client for the browser remote-debugging HTTP endpoints.

use serde::Deserialize;

use super::PlatformError;

/// One entry of `GET /json/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevToolsTarget {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl DevToolsTarget {
    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

pub struct DevToolsClient {
    http: reqwest::Client,
    base_url: String,
}

impl DevToolsClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn list_targets(&self) -> Result<Vec<DevToolsTarget>, PlatformError> {
        let resp = self
            .http
            .get(format!("{}/json/list", self.base_url))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Open a new tab. Recent browsers only accept `PUT` here.
    pub async fn open_tab(&self, url: &str) -> Result<DevToolsTarget, PlatformError> {
        let resp = self
            .http
            .put(format!("{}/json/new?{url}", self.base_url))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(PlatformError::DevTools {
        status: status.as_u16(),
        message,
    })
}
