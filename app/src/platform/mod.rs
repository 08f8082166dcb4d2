//! Browser tab/window and desktop notification primitives.
//!
//! Everything the engine does outside the process goes through
//! [`BrowserPlatform`]. The desktop implementation drives a Chromium-based
//! browser over its remote-debugging HTTP endpoints, falls back to the OS
//! default browser for windows, and raises freedesktop notifications.

pub mod devtools;
pub mod notify;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use player_patterns::MatchPattern;
use serde::Serialize;

use devtools::DevToolsClient;
use notify::DesktopNotifier;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DevTools endpoint returned {status}: {message}")]
    DevTools { status: u16, message: String },

    #[error("invalid URL pattern: {0}")]
    Pattern(#[from] player_patterns::PatternError),

    #[error("failed to launch browser: {0}")]
    Browser(#[from] std::io::Error),

    #[error("notification service error: {0}")]
    Notification(#[from] zbus::Error),
}

/// An open browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabInfo {
    pub id: String,
    pub url: String,
}

/// Content of a "channel went live" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveNotification {
    pub title: String,
    pub message: String,
}

#[async_trait]
pub trait BrowserPlatform: Send + Sync {
    /// Tabs whose URL matches a browser-style match pattern.
    async fn query_tabs(&self, pattern: &str) -> Result<Vec<TabInfo>, PlatformError>;

    /// Open `url` in a new background tab.
    async fn create_tab(&self, url: &str) -> Result<(), PlatformError>;

    /// Open `url` in a new window.
    async fn create_window(&self, url: &str) -> Result<(), PlatformError>;

    /// Show a notification, replacing any earlier one with the same key.
    async fn show_notification(
        &self,
        key: &str,
        notification: &LiveNotification,
    ) -> Result<(), PlatformError>;

    /// Whether a resource can be fetched. Used to detect installed players.
    async fn resource_exists(&self, url: &str) -> bool;
}

/// Desktop implementation of [`BrowserPlatform`].
pub struct DesktopPlatform {
    devtools: DevToolsClient,
    notifier: DesktopNotifier,
    http: reqwest::Client,
}

impl DesktopPlatform {
    pub fn new(http: reqwest::Client, devtools_url: impl Into<String>) -> Self {
        Self {
            devtools: DevToolsClient::new(http.clone(), devtools_url),
            notifier: DesktopNotifier::new(env!("CARGO_PKG_NAME")),
            http,
        }
    }
}

#[async_trait]
impl BrowserPlatform for DesktopPlatform {
    async fn query_tabs(&self, pattern: &str) -> Result<Vec<TabInfo>, PlatformError> {
        let pattern = MatchPattern::parse(pattern)?;
        let tabs = self
            .devtools
            .list_targets()
            .await?
            .into_iter()
            .filter(|t| t.is_page() && pattern.matches(&t.url))
            .map(|t| TabInfo { id: t.id, url: t.url })
            .collect();
        Ok(tabs)
    }

    async fn create_tab(&self, url: &str) -> Result<(), PlatformError> {
        let target = self.devtools.open_tab(url).await?;
        tracing::debug!(id = %target.id, url, "Opened tab");
        Ok(())
    }

    async fn create_window(&self, url: &str) -> Result<(), PlatformError> {
        let url = url.to_string();
        tokio::task::spawn_blocking(move || webbrowser::open(&url))
            .await
            .map_err(|e| PlatformError::Browser(std::io::Error::other(e)))??;
        Ok(())
    }

    async fn show_notification(
        &self,
        key: &str,
        notification: &LiveNotification,
    ) -> Result<(), PlatformError> {
        self.notifier.show(key, notification).await
    }

    async fn resource_exists(&self, url: &str) -> bool {
        if let Some(origin) = extension_origin(url) {
            return match self.devtools.list_targets().await {
                Ok(targets) => targets.iter().any(|t| t.url.starts_with(&origin)),
                Err(e) => {
                    tracing::debug!("DevTools target list unavailable: {e}");
                    false
                }
            };
        }
        match self.http.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url, "Resource probe failed: {e}");
                false
            }
        }
    }
}

/// `chrome-extension://<id>/` for extension resource URLs.
fn extension_origin(url: &str) -> Option<String> {
    let rest = url.strip_prefix("chrome-extension://")?;
    let id = rest.split('/').next().filter(|id| !id.is_empty())?;
    Some(format!("chrome-extension://{id}/"))
}
