//! Poll scheduling: one recurring timer plus explicit triggers.
//!
//! Triggers go through an unbounded channel to [`run_poll_loop`], which
//! spawns every pass as its own task. Overlapping passes are fine; the
//! reconciler's in-flight set keeps them off each other's channels.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use notifier_db::{StoreChange, keys};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::SettingsManager;
use crate::credentials::CredentialManager;
use crate::reconcile::{ReconcileError, Reconciler};

/// Why a pass is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTrigger {
    Startup,
    Interval,
    ChannelAdded(String),
    ChannelActivated(String),
    Manual(Option<String>),
    TokenRefreshed,
}

impl PollTrigger {
    /// Restrict the pass to one channel, if the trigger names one.
    pub fn channel_filter(&self) -> Option<&str> {
        match self {
            PollTrigger::ChannelAdded(name) | PollTrigger::ChannelActivated(name) => Some(name),
            PollTrigger::Manual(name) => name.as_deref(),
            PollTrigger::Startup | PollTrigger::Interval | PollTrigger::TokenRefreshed => None,
        }
    }
}

struct Recurring {
    minutes: u32,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    tx: mpsc::UnboundedSender<PollTrigger>,
    recurring: Mutex<Option<Recurring>>,
    shutdown: CancellationToken,
}

impl PollScheduler {
    pub fn new(shutdown: CancellationToken) -> (Self, mpsc::UnboundedReceiver<PollTrigger>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            inner: Arc::new(SchedulerInner {
                tx,
                recurring: Mutex::new(None),
                shutdown,
            }),
        };
        (scheduler, rx)
    }

    /// Request an immediate pass.
    pub fn trigger(&self, trigger: PollTrigger) {
        tracing::debug!(?trigger, "Poll triggered");
        if self.inner.tx.send(trigger).is_err() {
            tracing::warn!("Poll loop is not running, trigger dropped");
        }
    }

    /// Replace the recurring timer. The first tick fires one full period
    /// from now.
    pub fn reconfigure(&self, minutes: u32) {
        let mut recurring = self.lock();
        if let Some(old) = recurring.take() {
            old.handle.abort();
        }

        let period = Duration::from_secs(u64::from(minutes.max(1)) * 60);
        let tx = self.inner.tx.clone();
        let shutdown = self.inner.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(PollTrigger::Interval).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        tracing::info!(minutes, "Poll interval set");
        *recurring = Some(Recurring { minutes, handle });
    }

    /// Reconfigure only when `minutes` differs from the running timer.
    pub fn reconfigure_if_changed(&self, minutes: u32) -> bool {
        if self.interval_minutes() == Some(minutes) {
            return false;
        }
        self.reconfigure(minutes);
        true
    }

    pub fn interval_minutes(&self) -> Option<u32> {
        self.lock().as_ref().map(|r| r.minutes)
    }

    pub fn stop(&self) {
        if let Some(old) = self.lock().take() {
            old.handle.abort();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Recurring>> {
        self.inner
            .recurring
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Receive triggers and run each pass as an independent task until shutdown.
pub async fn run_poll_loop(
    reconciler: Arc<Reconciler>,
    mut rx: mpsc::UnboundedReceiver<PollTrigger>,
    shutdown: CancellationToken,
) {
    loop {
        let trigger = tokio::select! {
            _ = shutdown.cancelled() => break,
            trigger = rx.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
        };

        let reconciler = reconciler.clone();
        tokio::spawn(async move {
            let filter = trigger.channel_filter().map(str::to_string);
            match reconciler.run_cycle(filter.as_deref()).await {
                Ok(_) => {}
                Err(ReconcileError::MissingCredentials) => {
                    tracing::debug!(?trigger, "Pass skipped: no credentials");
                }
                Err(e) => tracing::warn!(?trigger, "Pass failed: {e}"),
            }
        });
    }
    tracing::info!("Poll loop stopped (shutdown)");
}

/// Follow store changes that affect scheduling or credentials.
pub async fn watch_store_changes(
    mut changes: broadcast::Receiver<StoreChange>,
    settings: SettingsManager,
    scheduler: PollScheduler,
    credentials: Arc<CredentialManager>,
    shutdown: CancellationToken,
) {
    loop {
        let change = tokio::select! {
            _ = shutdown.cancelled() => break,
            change = changes.recv() => change,
        };
        let change = match change {
            Ok(change) => change,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Store change watcher lagged by {n} events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match change.key.as_str() {
            keys::CHECK_INTERVAL => match settings.check_interval() {
                Ok(minutes) => {
                    scheduler.reconfigure_if_changed(minutes);
                }
                Err(e) => tracing::warn!("Failed to read check interval: {e}"),
            },
            keys::CLIENT_ID | keys::CLIENT_SECRET => {
                tracing::info!(key = %change.key, "Credentials changed in store");
                credentials.clear().await;
            }
            _ => {}
        }
    }
    tracing::info!("Store change watcher stopped (shutdown)");
}

#[cfg(test)]
mod tests {
    use notifier_db::Database;

    use super::*;
    use crate::config::SettingsUpdate;

    #[test]
    fn triggers_carry_channel_filters() {
        assert_eq!(PollTrigger::Startup.channel_filter(), None);
        assert_eq!(PollTrigger::Interval.channel_filter(), None);
        assert_eq!(
            PollTrigger::ChannelAdded("foo_".into()).channel_filter(),
            Some("foo_")
        );
        assert_eq!(
            PollTrigger::Manual(Some("bar_".into())).channel_filter(),
            Some("bar_")
        );
        assert_eq!(PollTrigger::Manual(None).channel_filter(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn recurring_trigger_fires_each_period() {
        let (scheduler, mut rx) = PollScheduler::new(CancellationToken::new());
        let start = Instant::now();
        scheduler.reconfigure(1);

        assert_eq!(rx.recv().await, Some(PollTrigger::Interval));
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        assert_eq!(rx.recv().await, Some(PollTrigger::Interval));
        assert_eq!(start.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_replaces_the_timer() {
        let (scheduler, mut rx) = PollScheduler::new(CancellationToken::new());
        scheduler.reconfigure(1);
        let start = Instant::now();
        scheduler.reconfigure(5);

        assert_eq!(rx.recv().await, Some(PollTrigger::Interval));
        assert_eq!(start.elapsed(), Duration::from_secs(300));
        assert_eq!(scheduler.interval_minutes(), Some(5));
        assert!(!scheduler.reconfigure_if_changed(5));
        assert!(scheduler.reconfigure_if_changed(10));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_triggers_are_immediate() {
        let (scheduler, mut rx) = PollScheduler::new(CancellationToken::new());
        scheduler.reconfigure(60);
        scheduler.trigger(PollTrigger::ChannelAdded("foo_".into()));
        let start = Instant::now();

        assert_eq!(
            rx.recv().await,
            Some(PollTrigger::ChannelAdded("foo_".into()))
        );
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_timer() {
        let shutdown = CancellationToken::new();
        let (scheduler, mut rx) = PollScheduler::new(shutdown.clone());
        scheduler.reconfigure(1);
        shutdown.cancel();

        let waited = tokio::time::timeout(Duration::from_secs(600), rx.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn interval_change_in_store_reconfigures() {
        let db = Database::open_in_memory().unwrap();
        let shutdown = CancellationToken::new();
        let (scheduler, _rx) = PollScheduler::new(shutdown.clone());
        scheduler.reconfigure(1);
        let credentials = Arc::new(CredentialManager::new(
            db.clone(),
            reqwest::Client::new(),
            "http://127.0.0.1:9/token",
        ));

        tokio::spawn(watch_store_changes(
            db.subscribe(),
            SettingsManager::new(db.clone()),
            scheduler.clone(),
            credentials,
            shutdown.clone(),
        ));

        SettingsManager::new(db.clone())
            .apply_update(&SettingsUpdate {
                check_interval: Some(15),
                ..Default::default()
            })
            .unwrap();

        for _ in 0..100 {
            if scheduler.interval_minutes() == Some(15) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(scheduler.interval_minutes(), Some(15));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn credential_change_in_store_clears_token_cache() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use axum::extract::State;
        use axum::routing::post;
        use axum::{Json, Router};
        use serde_json::{Value, json};

        async fn token_handler(State(calls): State<Arc<AtomicUsize>>) -> Json<Value> {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Json(json!({ "access_token": format!("token-{n}") }))
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/oauth2/token", post(token_handler))
            .with_state(calls.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let db = Database::open_in_memory().unwrap();
        let settings = SettingsManager::new(db.clone());
        settings
            .apply_update(&SettingsUpdate {
                client_id: Some("cid".into()),
                client_secret: Some("first".into()),
                ..Default::default()
            })
            .unwrap();

        let shutdown = CancellationToken::new();
        let (scheduler, _rx) = PollScheduler::new(shutdown.clone());
        let credentials = Arc::new(CredentialManager::new(
            db.clone(),
            reqwest::Client::new(),
            format!("http://{addr}/oauth2/token"),
        ));
        tokio::spawn(watch_store_changes(
            db.subscribe(),
            SettingsManager::new(db.clone()),
            scheduler,
            credentials.clone(),
            shutdown.clone(),
        ));

        assert_eq!(credentials.get_token().await.unwrap().access_token, "token-1");
        assert!(credentials.has_token().await);

        settings
            .apply_update(&SettingsUpdate {
                client_secret: Some("second".into()),
                ..Default::default()
            })
            .unwrap();

        for _ in 0..100 {
            if !credentials.has_token().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!credentials.has_token().await);

        assert_eq!(credentials.get_token().await.unwrap().access_token, "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        shutdown.cancel();
    }
}
