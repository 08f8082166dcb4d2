//! Live-status reconciliation.
//!
//! One pass walks the tracked channels, asks Twitch whether each active one
//! is live, and compares the answer with the last-notified bookkeeping:
//!
//! - offline: forget the channel's entry
//! - live and not open anywhere: open a tab (window as fallback), notify if
//!   the stream started after the last notification, record `now`
//! - live and already open: record `now` only if it would have notified
//!
//! Bookkeeping for the whole pass is written in one batch at the end.

mod in_flight;
mod retry;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use notifier_db::channels::NotificationChange;
use notifier_db::{Database, DbError};
use serde::Serialize;
use twitch_client::TwitchError;

pub use in_flight::{InFlight, InFlightGuard};
pub use retry::{AuthAttempt, MAX_AUTH_RETRIES};

use crate::config::defaults::channel_url;
use crate::credentials::{AccessGrant, TokenSource};
use crate::matcher::PatternMatcher;
use crate::platform::{BrowserPlatform, LiveNotification};
use crate::status::{LiveStream, StreamStatusSource};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("missing client credentials")]
    MissingCredentials,

    #[error("no access token available")]
    NoToken,

    #[error("still unauthorized after refreshing the token for {channel}")]
    Unauthorized { channel: String },

    #[error("status request for {channel} failed: {source}")]
    Transient {
        channel: String,
        #[source]
        source: TwitchError,
    },

    #[error("store error: {0}")]
    Store(#[from] DbError),
}

/// What one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Active channels whose status was requested.
    pub checked: u32,
    /// Tabs or fallback windows opened.
    pub opened: u32,
    /// Notifications raised.
    pub notified: u32,
    /// Offline channels whose entry was removed.
    pub cleared: u32,
    /// Channels skipped because of an error.
    pub skipped: u32,
    /// Channels held by another pass.
    pub busy: u32,
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct Reconciler {
    db: Database,
    tokens: Arc<dyn TokenSource>,
    status: Arc<dyn StreamStatusSource>,
    platform: Arc<dyn BrowserPlatform>,
    matcher: PatternMatcher,
    in_flight: InFlight,
    clock: Clock,
}

impl Reconciler {
    pub fn new(
        db: Database,
        tokens: Arc<dyn TokenSource>,
        status: Arc<dyn StreamStatusSource>,
        platform: Arc<dyn BrowserPlatform>,
    ) -> Self {
        Self {
            matcher: PatternMatcher::new(db.clone(), platform.clone()),
            db,
            tokens,
            status,
            platform,
            in_flight: InFlight::new(),
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Replace the wall clock (epoch ms).
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Reconcile every tracked channel, or only `filter` when given.
    pub async fn run_cycle(&self, filter: Option<&str>) -> Result<CycleReport, ReconcileError> {
        if !self.tokens.ensure_credentials().await {
            tracing::info!("Skipping channel check: no valid credentials");
            return Err(ReconcileError::MissingCredentials);
        }
        if self.tokens.grant().await.is_none() {
            tracing::error!("Skipping channel check: no access token available");
            return Err(ReconcileError::NoToken);
        }

        let channels = self.db.list_channels(filter)?;
        let mut report = CycleReport::default();
        let mut changes = Vec::new();
        // Claims are held until the batch below is written.
        let mut claims = Vec::new();

        for channel in channels.iter().filter(|c| c.active) {
            let name = channel.name.as_str();
            let Some(claim) = self.in_flight.try_claim(name) else {
                tracing::debug!(channel = name, "Channel busy in another pass");
                report.busy += 1;
                continue;
            };
            claims.push(claim);

            // Read per channel so a token refreshed by an overlapping pass
            // is picked up instead of the rejected one.
            let Some(grant) = self.tokens.grant().await else {
                tracing::warn!(channel = name, "No access token, skipping channel");
                report.skipped += 1;
                continue;
            };

            report.checked += 1;
            let live = match self.fetch_live_status(grant, name).await {
                Ok(live) => live,
                Err(e) => {
                    tracing::warn!(channel = name, "{e}");
                    report.skipped += 1;
                    continue;
                }
            };

            let last_notified = match self.db.get_last_notified(name) {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!(channel = name, "Failed to read notification state: {e}");
                    report.skipped += 1;
                    continue;
                }
            };

            match live {
                None => {
                    if last_notified.is_some() {
                        report.cleared += 1;
                    }
                    changes.push(NotificationChange::Cleared {
                        channel: name.to_string(),
                    });
                }
                Some(stream) => {
                    if let Some(change) = self
                        .handle_live(name, &stream, last_notified, &mut report)
                        .await
                    {
                        changes.push(change);
                    }
                }
            }
        }

        if let Err(e) = self.db.apply_notification_changes(&changes) {
            tracing::error!("Failed to save notification state: {e}");
        }
        drop(claims);

        tracing::info!(
            checked = report.checked,
            opened = report.opened,
            notified = report.notified,
            cleared = report.cleared,
            skipped = report.skipped,
            busy = report.busy,
            "Channel check completed"
        );
        Ok(report)
    }

    async fn handle_live(
        &self,
        name: &str,
        stream: &LiveStream,
        last_notified: Option<i64>,
        report: &mut CycleReport,
    ) -> Option<NotificationChange> {
        let should_notify = stream
            .started_at
            .is_some_and(|started| started > last_notified.unwrap_or(0));
        let already_open = self.matcher.is_channel_open(name).await;
        let now = (self.clock)();

        if already_open {
            tracing::debug!(channel = name, should_notify, "Channel already open");
            return should_notify.then(|| NotificationChange::Notified {
                channel: name.to_string(),
                at: now,
            });
        }

        if self.open_channel(name).await {
            report.opened += 1;
        }
        if should_notify && self.notify(name, stream).await {
            report.notified += 1;
        }
        Some(NotificationChange::Notified {
            channel: name.to_string(),
            at: now,
        })
    }

    /// Status request with one token refresh on 401.
    async fn fetch_live_status(
        &self,
        mut grant: AccessGrant,
        channel: &str,
    ) -> Result<Option<LiveStream>, ReconcileError> {
        let mut attempt = AuthAttempt::First;
        loop {
            match self.status.live_status(&grant, channel).await {
                Ok(live) => return Ok(live),
                Err(e) if e.is_unauthorized() => {
                    let Some(next) = attempt.after_unauthorized() else {
                        self.tokens.invalidate(&grant.token).await;
                        return Err(ReconcileError::Unauthorized {
                            channel: channel.to_string(),
                        });
                    };
                    tracing::info!(channel, "Token rejected, refreshing and retrying");
                    let Some(fresh) = self.tokens.refresh_grant(&grant.token).await else {
                        return Err(ReconcileError::Unauthorized {
                            channel: channel.to_string(),
                        });
                    };
                    grant = fresh;
                    attempt = next;
                }
                Err(source) => {
                    return Err(ReconcileError::Transient {
                        channel: channel.to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// Open the channel page in a tab, falling back to a new window.
    async fn open_channel(&self, name: &str) -> bool {
        let url = channel_url(name);
        let err = match self.platform.create_tab(&url).await {
            Ok(()) => {
                tracing::info!(channel = name, "Opened tab");
                return true;
            }
            Err(e) => e,
        };
        tracing::warn!(channel = name, "Tab creation failed, opening a window: {err}");
        match self.platform.create_window(&url).await {
            Ok(()) => {
                tracing::info!(channel = name, "Opened window");
                true
            }
            Err(e) => {
                tracing::error!(channel = name, "Failed to open channel page: {e}");
                false
            }
        }
    }

    async fn notify(&self, name: &str, stream: &LiveStream) -> bool {
        let notification = LiveNotification {
            title: format!("{name} is Live!"),
            message: format!("{}\nPlaying: {}", stream.title, stream.game_name),
        };
        match self
            .platform
            .show_notification(&format!("{name}-live"), &notification)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(channel = name, "Failed to show notification: {e}");
                false
            }
        }
    }
}
