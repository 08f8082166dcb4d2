use std::path::PathBuf;
use std::sync::Arc;

use notifier_db::Database;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, SettingsManager};
use crate::credentials::CredentialManager;
use crate::platform::{BrowserPlatform, DesktopPlatform};
use crate::reconcile::Reconciler;
use crate::scheduler::{PollScheduler, PollTrigger};
use crate::status::HelixStatusSource;

/// Application shared state accessible from axum handlers and background tasks.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<SharedStateInner>,
}

struct SharedStateInner {
    /// Application configuration (reloadable)
    config: RwLock<AppConfig>,
    db: Database,
    data_dir: PathBuf,
    credentials: Arc<CredentialManager>,
    reconciler: Arc<Reconciler>,
    scheduler: PollScheduler,
    /// Handed to the poll loop once at start-up
    poll_rx: Mutex<Option<mpsc::UnboundedReceiver<PollTrigger>>>,
    shutdown_token: CancellationToken,
}

impl SharedState {
    /// Build the shared state with the desktop platform and Helix status source.
    pub fn new(db: Database, config: AppConfig, data_dir: PathBuf) -> Self {
        let http = reqwest::Client::new();
        let platform: Arc<dyn BrowserPlatform> =
            Arc::new(DesktopPlatform::new(http.clone(), config.devtools_url.clone()));
        Self::with_platform(db, config, data_dir, http, platform)
    }

    pub fn with_platform(
        db: Database,
        config: AppConfig,
        data_dir: PathBuf,
        http: reqwest::Client,
        platform: Arc<dyn BrowserPlatform>,
    ) -> Self {
        let shutdown_token = CancellationToken::new();
        let credentials = Arc::new(CredentialManager::new(
            db.clone(),
            http.clone(),
            config.token_url.clone(),
        ));
        let status = Arc::new(HelixStatusSource::new(http, config.helix_url.clone()));
        let reconciler = Arc::new(Reconciler::new(
            db.clone(),
            credentials.clone(),
            status,
            platform,
        ));
        let (scheduler, poll_rx) = PollScheduler::new(shutdown_token.clone());

        Self {
            inner: Arc::new(SharedStateInner {
                config: RwLock::new(config),
                db,
                data_dir,
                credentials,
                reconciler,
                scheduler,
                poll_rx: Mutex::new(Some(poll_rx)),
                shutdown_token,
            }),
        }
    }

    pub fn server_port(&self) -> u16 {
        self.inner
            .config
            .try_read()
            .map(|c| c.server_port)
            .unwrap_or(crate::config::defaults::DEFAULT_SERVER_PORT)
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn settings(&self) -> SettingsManager {
        SettingsManager::new(self.inner.db.clone())
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.inner.data_dir
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.inner.credentials
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.inner.reconciler
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.inner.scheduler
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown_token
    }

    /// Take the trigger receiver. Only the first caller gets it.
    pub async fn take_poll_receiver(&self) -> Option<mpsc::UnboundedReceiver<PollTrigger>> {
        self.inner.poll_rx.lock().await.take()
    }

    /// Get a read lock on the current config.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.config.read().await
    }

    /// Reload config from the database.
    pub async fn reload_config(&self) -> Result<(), anyhow::Error> {
        let sm = self.settings();
        let mut config = self.inner.config.write().await;
        config.reload(&sm)?;
        Ok(())
    }
}
