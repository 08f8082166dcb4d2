//! In-memory platform for tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use player_patterns::MatchPattern;

use super::{BrowserPlatform, LiveNotification, PlatformError, TabInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    QueryTabs(String),
    CreateTab(String),
    CreateWindow(String),
    Notify { key: String, title: String, message: String },
    Probe(String),
}

#[derive(Default)]
pub struct FakePlatform {
    open_urls: Mutex<Vec<String>>,
    installed: Mutex<HashSet<String>>,
    fail_tab_queries: Mutex<bool>,
    fail_tabs: Mutex<bool>,
    fail_windows: Mutex<bool>,
    calls: Mutex<Vec<PlatformCall>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_tab(self, url: &str) -> Self {
        self.open_urls.lock().unwrap().push(url.to_string());
        self
    }

    pub fn with_installed(self, url: &str) -> Self {
        self.installed.lock().unwrap().insert(url.to_string());
        self
    }

    pub fn failing_tabs(self) -> Self {
        *self.fail_tabs.lock().unwrap() = true;
        self
    }

    pub fn failing_windows(self) -> Self {
        *self.fail_windows.lock().unwrap() = true;
        self
    }

    pub fn failing_tab_queries(self) -> Self {
        *self.fail_tab_queries.lock().unwrap() = true;
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn opened_tabs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::CreateTab(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn opened_windows(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::CreateWindow(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn notification_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Notify { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn io_error(what: &str) -> PlatformError {
        PlatformError::Browser(std::io::Error::other(what.to_string()))
    }
}

#[async_trait]
impl BrowserPlatform for FakePlatform {
    async fn query_tabs(&self, pattern: &str) -> Result<Vec<TabInfo>, PlatformError> {
        self.record(PlatformCall::QueryTabs(pattern.to_string()));
        if *self.fail_tab_queries.lock().unwrap() {
            return Err(Self::io_error("tab query failed"));
        }
        let pattern = MatchPattern::parse(pattern)?;
        let tabs = self
            .open_urls
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(_, url)| pattern.matches(url))
            .map(|(i, url)| TabInfo {
                id: i.to_string(),
                url: url.clone(),
            })
            .collect();
        Ok(tabs)
    }

    async fn create_tab(&self, url: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::CreateTab(url.to_string()));
        if *self.fail_tabs.lock().unwrap() {
            return Err(Self::io_error("tab creation failed"));
        }
        self.open_urls.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn create_window(&self, url: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::CreateWindow(url.to_string()));
        if *self.fail_windows.lock().unwrap() {
            return Err(Self::io_error("window creation failed"));
        }
        self.open_urls.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn show_notification(
        &self,
        key: &str,
        notification: &LiveNotification,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Notify {
            key: key.to_string(),
            title: notification.title.clone(),
            message: notification.message.clone(),
        });
        Ok(())
    }

    async fn resource_exists(&self, url: &str) -> bool {
        self.record(PlatformCall::Probe(url.to_string()));
        self.installed.lock().unwrap().contains(url)
    }
}
