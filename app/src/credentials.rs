//! Client credentials and the cached app access token.
//!
//! `CredentialManager` is the single owner of both caches. The store stays
//! authoritative for the credentials; the token lives only in memory and is
//! thrown away on a 401 or whenever the credentials change.

use std::fmt;

use async_trait::async_trait;
use notifier_db::Database;
use tokio::sync::{Mutex, RwLock};
use twitch_client::Token;
use twitch_client::auth::TwitchAuth;

use crate::config::SettingsManager;

/// Twitch application identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// What a Helix request needs: the client id header and a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub client_id: String,
    pub token: Token,
}

/// Source of access grants for the reconciliation engine.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// True when both halves of the client credentials are available.
    async fn ensure_credentials(&self) -> bool;

    /// Cached grant, or a freshly requested one. `None` on failure.
    async fn grant(&self) -> Option<AccessGrant>;

    /// Replace `rejected` with a new token. When the cache already holds a
    /// different token, that one is returned without a new request.
    async fn refresh_grant(&self, rejected: &Token) -> Option<AccessGrant>;

    /// Drop the cached token if it is still `rejected`.
    async fn invalidate(&self, rejected: &Token);
}

pub struct CredentialManager {
    settings: SettingsManager,
    http: reqwest::Client,
    token_url: String,
    credentials: RwLock<Option<Credentials>>,
    token: RwLock<Option<Token>>,
    refresh_lock: Mutex<()>,
}

impl CredentialManager {
    pub fn new(db: Database, http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            settings: SettingsManager::new(db),
            http,
            token_url: token_url.into(),
            credentials: RwLock::new(None),
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Reconcile the credential cache with the store.
    pub async fn ensure_credentials(&self) -> bool {
        let stored = match self.settings.credentials() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Failed to read credentials: {e}");
                return false;
            }
        };

        let Some(stored) = stored else {
            tracing::debug!("Missing Twitch API credentials");
            return false;
        };

        let mut cached = self.credentials.write().await;
        if cached.as_ref() != Some(&stored) {
            if cached.is_some() {
                tracing::info!("Client credentials changed, dropping cached token");
                *self.token.write().await = None;
            }
            *cached = Some(stored);
        }
        true
    }

    /// Cached token, or a new one from the client credentials grant.
    ///
    /// Failures are logged and reported as `None`.
    pub async fn get_token(&self) -> Option<Token> {
        if !self.ensure_credentials().await {
            return None;
        }
        if let Some(token) = self.token.read().await.clone() {
            return Some(token);
        }

        let creds = self.credentials.read().await.clone()?;
        let auth = TwitchAuth::with_http(self.http.clone(), creds.client_id, creds.client_secret)
            .with_token_url(self.token_url.clone());

        match auth.request_app_token().await {
            Ok(token) => {
                tracing::info!("Obtained Twitch app access token");
                *self.token.write().await = Some(token.clone());
                Some(token)
            }
            Err(e) => {
                tracing::error!("Failed to fetch access token: {e}");
                *self.token.write().await = None;
                None
            }
        }
    }

    pub async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    pub async fn refresh_token(&self) -> Option<Token> {
        let _guard = self.refresh_lock.lock().await;
        self.invalidate_token().await;
        self.get_token().await
    }

    /// Refresh after `rejected` got a 401, unless another caller already
    /// replaced it.
    pub async fn refresh_rejected(&self, rejected: &Token) -> Option<Token> {
        let _guard = self.refresh_lock.lock().await;
        {
            let mut cached = self.token.write().await;
            match cached.as_ref() {
                Some(current) if current != rejected => {
                    tracing::debug!("Token already refreshed by another pass");
                    return Some(current.clone());
                }
                Some(_) => *cached = None,
                None => {}
            }
        }
        self.get_token().await
    }

    /// Drop the cached token only if it is still `rejected`.
    pub async fn invalidate_rejected(&self, rejected: &Token) {
        let mut cached = self.token.write().await;
        if cached.as_ref() == Some(rejected) {
            *cached = None;
        }
    }

    /// Forget credentials and token until the store provides new ones.
    pub async fn clear(&self) {
        *self.credentials.write().await = None;
        *self.token.write().await = None;
        tracing::info!("Credential and token caches cleared");
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    async fn current_grant(&self, token: Option<Token>) -> Option<AccessGrant> {
        let token = token?;
        let client_id = self.credentials.read().await.as_ref()?.client_id.clone();
        Some(AccessGrant { client_id, token })
    }
}

#[async_trait]
impl TokenSource for CredentialManager {
    async fn ensure_credentials(&self) -> bool {
        CredentialManager::ensure_credentials(self).await
    }

    async fn grant(&self) -> Option<AccessGrant> {
        let token = self.get_token().await;
        self.current_grant(token).await
    }

    async fn refresh_grant(&self, rejected: &Token) -> Option<AccessGrant> {
        let token = self.refresh_rejected(rejected).await;
        self.current_grant(token).await
    }

    async fn invalidate(&self, rejected: &Token) {
        self.invalidate_rejected(rejected).await;
    }
}
