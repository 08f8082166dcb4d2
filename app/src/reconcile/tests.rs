use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use async_trait::async_trait;
use twitch_client::Token;

use super::*;
use crate::platform::fake::FakePlatform;

const NOW: i64 = 1_000_000;

#[derive(Default)]
struct FakeTokens {
    missing_credentials: bool,
    grant_fails: bool,
    issued: AtomicU32,
    current: Mutex<Option<AccessGrant>>,
    grants: AtomicU32,
    refreshes: AtomicU32,
    invalidations: AtomicU32,
}

impl FakeTokens {
    fn issue(&self) -> Option<AccessGrant> {
        if self.grant_fails {
            return None;
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let grant = AccessGrant {
            client_id: "cid".into(),
            token: Token::new(format!("tok-{n}")),
        };
        *self.current.lock().unwrap() = Some(grant.clone());
        Some(grant)
    }
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn ensure_credentials(&self) -> bool {
        !self.missing_credentials
    }

    async fn grant(&self) -> Option<AccessGrant> {
        self.grants.fetch_add(1, Ordering::SeqCst);
        let cached = self.current.lock().unwrap().clone();
        cached.or_else(|| self.issue())
    }

    async fn refresh_grant(&self, rejected: &Token) -> Option<AccessGrant> {
        {
            let mut current = self.current.lock().unwrap();
            if let Some(newer) = current.as_ref().filter(|g| g.token != *rejected) {
                return Some(newer.clone());
            }
            *current = None;
        }
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.issue()
    }

    async fn invalidate(&self, rejected: &Token) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock().unwrap();
        if current.as_ref().is_some_and(|g| g.token == *rejected) {
            *current = None;
        }
    }
}

#[derive(Clone)]
enum Reply {
    Live(LiveStream),
    Offline,
    Unauthorized,
    ServerError,
}

#[derive(Default)]
struct FakeStatus {
    replies: Mutex<HashMap<String, Reply>>,
    /// Number of leading 401s per channel before the configured reply.
    unauthorized_first: Mutex<HashMap<String, u32>>,
    /// Tokens answered with 401 on every request.
    rejected_tokens: Mutex<Vec<String>>,
    calls: Mutex<Vec<(String, String)>>,
    yield_first: bool,
}

impl FakeStatus {
    fn set(&self, login: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(login.into(), reply);
    }

    fn live(&self, login: &str, started_at: Option<i64>) {
        self.set(
            login,
            Reply::Live(LiveStream {
                started_at,
                title: format!("{login} stream"),
                game_name: "Celeste".into(),
            }),
        );
    }

    fn reject_first(&self, login: &str, times: u32) {
        self.unauthorized_first
            .lock()
            .unwrap()
            .insert(login.into(), times);
    }

    fn reject_token(&self, token: &str) {
        self.rejected_tokens.lock().unwrap().push(token.into());
    }

    fn calls_for(&self, login: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == login)
            .map(|(_, token)| token.clone())
            .collect()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl StreamStatusSource for FakeStatus {
    async fn live_status(
        &self,
        grant: &AccessGrant,
        login: &str,
    ) -> Result<Option<LiveStream>, TwitchError> {
        if self.yield_first {
            tokio::task::yield_now().await;
        }
        self.calls
            .lock()
            .unwrap()
            .push((login.to_string(), grant.token.access_token.clone()));

        if self
            .rejected_tokens
            .lock()
            .unwrap()
            .contains(&grant.token.access_token)
        {
            return Err(TwitchError::ApiError {
                status: 401,
                message: "Invalid OAuth token".into(),
            });
        }

        {
            let mut rejects = self.unauthorized_first.lock().unwrap();
            if let Some(left) = rejects.get_mut(login).filter(|left| **left > 0) {
                *left -= 1;
                return Err(TwitchError::ApiError {
                    status: 401,
                    message: "Invalid OAuth token".into(),
                });
            }
        }

        let reply = self.replies.lock().unwrap().get(login).cloned();
        match reply.unwrap_or(Reply::Offline) {
            Reply::Live(stream) => Ok(Some(stream)),
            Reply::Offline => Ok(None),
            Reply::Unauthorized => Err(TwitchError::ApiError {
                status: 401,
                message: "Invalid OAuth token".into(),
            }),
            Reply::ServerError => Err(TwitchError::ApiError {
                status: 503,
                message: "unavailable".into(),
            }),
        }
    }
}

struct Harness {
    db: Database,
    tokens: Arc<FakeTokens>,
    status: Arc<FakeStatus>,
    platform: Arc<FakePlatform>,
    reconciler: Reconciler,
    now: Arc<AtomicI64>,
}

impl Harness {
    fn new(platform: FakePlatform) -> Self {
        Self::build(FakeTokens::default(), FakeStatus::default(), platform)
    }

    fn build(tokens: FakeTokens, status: FakeStatus, platform: FakePlatform) -> Self {
        let db = Database::open_in_memory().unwrap();
        let tokens = Arc::new(tokens);
        let status = Arc::new(status);
        let platform = Arc::new(platform);
        let now = Arc::new(AtomicI64::new(NOW));
        let clock = now.clone();
        let reconciler = Reconciler::new(
            db.clone(),
            tokens.clone(),
            status.clone(),
            platform.clone(),
        )
        .with_clock(move || clock.load(Ordering::SeqCst));
        Self {
            db,
            tokens,
            status,
            platform,
            reconciler,
            now,
        }
    }

    fn track(&self, names: &[&str]) {
        for name in names {
            assert!(self.db.add_channel(name).unwrap());
        }
    }

    async fn run(&self) -> CycleReport {
        self.reconciler.run_cycle(None).await.unwrap()
    }
}

#[tokio::test]
async fn live_channel_without_tab_opens_and_notifies() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["foo_"]);
    h.status.live("foo_", Some(1000));

    let report = h.run().await;

    assert_eq!(h.platform.opened_tabs(), ["https://www.twitch.tv/foo_"]);
    assert_eq!(h.platform.notification_keys(), ["foo_-live"]);
    assert_eq!(h.db.get_last_notified("foo_").unwrap(), Some(NOW));
    assert_eq!(report.opened, 1);
    assert_eq!(report.notified, 1);
}

#[tokio::test]
async fn notification_carries_title_and_game() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["foo_"]);
    h.status.live("foo_", Some(1000));
    h.run().await;

    let notify = h
        .platform
        .calls()
        .into_iter()
        .find_map(|c| match c {
            crate::platform::fake::PlatformCall::Notify { title, message, .. } => {
                Some((title, message))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(notify.0, "foo_ is Live!");
    assert_eq!(notify.1, "foo_ stream\nPlaying: Celeste");
}

#[tokio::test]
async fn live_channel_with_open_tab_only_records() {
    let h = Harness::new(FakePlatform::new().with_open_tab("https://www.twitch.tv/bar_"));
    h.track(&["bar_"]);
    h.status.live("bar_", Some(500));

    let report = h.run().await;

    assert!(h.platform.opened_tabs().is_empty());
    assert!(h.platform.notification_keys().is_empty());
    assert_eq!(h.db.get_last_notified("bar_").unwrap(), Some(NOW));
    assert_eq!(report.opened, 0);
    assert_eq!(report.notified, 0);
}

#[tokio::test]
async fn open_tab_without_new_session_leaves_entry_alone() {
    let h = Harness::new(FakePlatform::new().with_open_tab("https://www.twitch.tv/bar_"));
    h.track(&["bar_"]);
    h.db.set_last_notified("bar_", 700).unwrap();
    h.status.live("bar_", Some(500));

    h.run().await;

    assert_eq!(h.db.get_last_notified("bar_").unwrap(), Some(700));
}

#[tokio::test]
async fn offline_channel_clears_entry() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["baz_"]);
    h.db.set_last_notified("baz_", 100).unwrap();
    h.status.set("baz_", Reply::Offline);

    let report = h.run().await;

    assert_eq!(h.db.get_last_notified("baz_").unwrap(), None);
    assert_eq!(report.cleared, 1);
    assert!(h.platform.calls().is_empty());
}

#[tokio::test]
async fn repeated_401_refreshes_once_and_moves_on() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["qux_", "foo_"]);
    h.db.set_last_notified("qux_", 42).unwrap();
    h.status.set("qux_", Reply::Unauthorized);
    h.status.live("foo_", Some(1000));

    let report = h.run().await;

    assert_eq!(h.status.calls_for("qux_").len(), 2);
    assert_eq!(h.tokens.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(h.tokens.invalidations.load(Ordering::SeqCst), 1);
    assert_eq!(h.db.get_last_notified("qux_").unwrap(), Some(42));
    assert_eq!(report.skipped, 1);

    // The next channel still runs, with a token other than the rejected one.
    let rejected = h.status.calls_for("qux_");
    let foo = h.status.calls_for("foo_");
    assert_eq!(foo.len(), 1);
    assert!(!rejected.contains(&foo[0]));
    assert_eq!(h.db.get_last_notified("foo_").unwrap(), Some(NOW));
}

#[tokio::test]
async fn single_401_is_retried_with_fresh_token() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["qux_"]);
    h.status.live("qux_", Some(1000));
    h.status.reject_first("qux_", 1);

    let report = h.run().await;

    let tokens = h.status.calls_for("qux_");
    assert_eq!(tokens.len(), 2);
    assert_ne!(tokens[0], tokens[1]);
    assert_eq!(h.tokens.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(h.tokens.invalidations.load(Ordering::SeqCst), 0);
    assert_eq!(report.notified, 1);
}

#[tokio::test]
async fn other_errors_skip_without_retry() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["down", "foo_"]);
    h.db.set_last_notified("down", 5).unwrap();
    h.status.set("down", Reply::ServerError);
    h.status.live("foo_", Some(1000));

    let report = h.run().await;

    assert_eq!(h.status.calls_for("down").len(), 1);
    assert_eq!(h.tokens.refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(h.db.get_last_notified("down").unwrap(), Some(5));
    assert_eq!(report.skipped, 1);
    assert_eq!(report.notified, 1);
}

#[tokio::test]
async fn inactive_channels_are_untouched() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["idle"]);
    h.db.set_channel_active("idle", false).unwrap();
    h.db.set_last_notified("idle", 9).unwrap();
    h.status.live("idle", Some(1000));

    let report = h.run().await;

    assert_eq!(h.status.total_calls(), 0);
    assert!(h.platform.calls().is_empty());
    assert_eq!(h.db.get_last_notified("idle").unwrap(), Some(9));
    assert_eq!(report, CycleReport::default());
}

#[tokio::test]
async fn same_session_notifies_once() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["foo_"]);
    h.status.live("foo_", Some(1000));

    h.run().await;
    h.now.store(NOW + 60_000, Ordering::SeqCst);
    h.run().await;

    assert_eq!(h.platform.notification_keys().len(), 1);
    assert_eq!(h.platform.opened_tabs().len(), 1);
}

#[tokio::test]
async fn each_offline_to_live_transition_notifies_once() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["foo_"]);

    h.status.live("foo_", Some(1000));
    h.run().await;
    h.run().await;

    h.status.set("foo_", Reply::Offline);
    h.run().await;
    assert_eq!(h.db.get_last_notified("foo_").unwrap(), None);

    h.now.store(NOW + 10_000, Ordering::SeqCst);
    h.status.live("foo_", Some(NOW + 5_000));
    h.run().await;
    h.run().await;

    assert_eq!(h.platform.notification_keys(), ["foo_-live", "foo_-live"]);
}

#[tokio::test]
async fn equal_start_and_last_notified_does_not_notify() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["foo_"]);
    h.db.set_last_notified("foo_", 1000).unwrap();
    h.status.live("foo_", Some(1000));

    h.run().await;

    assert!(h.platform.notification_keys().is_empty());
    // No tab was open, so one is opened and the entry refreshed anyway.
    assert_eq!(h.platform.opened_tabs().len(), 1);
    assert_eq!(h.db.get_last_notified("foo_").unwrap(), Some(NOW));
}

#[tokio::test]
async fn unknown_start_time_never_notifies() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["foo_"]);
    h.status.live("foo_", None);

    h.run().await;

    assert!(h.platform.notification_keys().is_empty());
    assert_eq!(h.platform.opened_tabs().len(), 1);
    assert_eq!(h.db.get_last_notified("foo_").unwrap(), Some(NOW));
}

#[tokio::test]
async fn tab_failure_falls_back_to_window() {
    let h = Harness::new(FakePlatform::new().failing_tabs());
    h.track(&["foo_"]);
    h.status.live("foo_", Some(1000));

    let report = h.run().await;

    assert_eq!(h.platform.opened_windows(), ["https://www.twitch.tv/foo_"]);
    assert_eq!(report.opened, 1);
    assert_eq!(report.notified, 1);
}

#[tokio::test]
async fn failed_window_still_records_the_decision() {
    let h = Harness::new(FakePlatform::new().failing_tabs().failing_windows());
    h.track(&["foo_"]);
    h.status.live("foo_", Some(1000));

    let report = h.run().await;

    assert_eq!(report.opened, 0);
    assert_eq!(report.notified, 1);
    assert_eq!(h.db.get_last_notified("foo_").unwrap(), Some(NOW));
}

#[tokio::test]
async fn missing_credentials_skip_the_cycle() {
    let tokens = FakeTokens {
        missing_credentials: true,
        ..Default::default()
    };
    let h = Harness::build(tokens, FakeStatus::default(), FakePlatform::new());
    h.track(&["foo_"]);

    let err = h.reconciler.run_cycle(None).await.unwrap_err();
    assert!(matches!(err, ReconcileError::MissingCredentials));
    assert_eq!(h.status.total_calls(), 0);
}

#[tokio::test]
async fn no_token_skips_the_cycle() {
    let tokens = FakeTokens {
        grant_fails: true,
        ..Default::default()
    };
    let h = Harness::build(tokens, FakeStatus::default(), FakePlatform::new());
    h.track(&["foo_"]);

    let err = h.reconciler.run_cycle(None).await.unwrap_err();
    assert!(matches!(err, ReconcileError::NoToken));
    assert_eq!(h.status.total_calls(), 0);
}

#[tokio::test]
async fn filter_limits_the_cycle_to_one_channel() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["foo_", "bar_"]);
    h.status.live("foo_", Some(1000));
    h.status.live("bar_", Some(1000));

    let report = h.reconciler.run_cycle(Some("FOO_")).await.unwrap();

    assert_eq!(report.checked, 1);
    assert_eq!(h.status.calls_for("bar_").len(), 0);
    assert_eq!(h.db.get_last_notified("bar_").unwrap(), None);
}

#[tokio::test]
async fn claimed_channel_is_reported_busy() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["foo_", "bar_"]);
    h.status.live("foo_", Some(1000));
    h.status.live("bar_", Some(1000));

    let _claim = h.reconciler.in_flight().try_claim("foo_").unwrap();
    let report = h.run().await;

    assert_eq!(report.busy, 1);
    assert_eq!(report.checked, 1);
    assert!(h.status.calls_for("foo_").is_empty());
    assert_eq!(h.platform.notification_keys(), ["bar_-live"]);
}

#[tokio::test]
async fn overlapping_passes_notify_once() {
    let status = FakeStatus {
        yield_first: true,
        ..Default::default()
    };
    let h = Harness::build(FakeTokens::default(), status, FakePlatform::new());
    h.track(&["foo_"]);
    h.status.live("foo_", Some(1000));

    let (a, b) = tokio::join!(
        h.reconciler.run_cycle(None),
        h.reconciler.run_cycle(None)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.busy + b.busy, 1);
    assert_eq!(h.platform.notification_keys().len(), 1);
    assert!(!h.reconciler.in_flight().is_claimed("foo_"));
}

#[tokio::test]
async fn removed_channel_leaves_inert_entry() {
    let h = Harness::new(FakePlatform::new());
    h.track(&["gone"]);
    h.db.set_last_notified("gone", 77).unwrap();
    assert!(h.db.remove_channel("gone").unwrap());
    assert!(h.db.list_channels(Some("gone")).unwrap().is_empty());

    h.status.live("gone", Some(1000));
    let report = h.run().await;

    assert_eq!(report, CycleReport::default());
    assert_eq!(h.status.total_calls(), 0);
    assert_eq!(h.db.get_last_notified("gone").unwrap(), Some(77));
}

#[tokio::test]
async fn overlapping_passes_share_one_refresh() {
    let h = Harness::build(
        FakeTokens::default(),
        FakeStatus {
            yield_first: true,
            ..Default::default()
        },
        FakePlatform::new(),
    );
    h.track(&["aaaa", "bbbb"]);
    h.status.live("aaaa", Some(1000));
    h.status.live("bbbb", Some(1000));
    h.status.reject_token("tok-1");
    // Both passes start out holding tok-1.
    h.tokens.grant().await.unwrap();

    let (a, b) = tokio::join!(h.reconciler.run_cycle(None), h.reconciler.run_cycle(None));
    a.unwrap();
    b.unwrap();

    assert_eq!(h.tokens.refreshes.load(Ordering::SeqCst), 1);
    for channel in ["aaaa", "bbbb"] {
        let tokens = h.status.calls_for(channel);
        assert!(!tokens.is_empty(), "{channel} was never checked");
        assert_eq!(tokens.last().map(String::as_str), Some("tok-2"));
        assert!(tokens.iter().filter(|t| *t == "tok-1").count() <= 1);
        assert!(!tokens.iter().any(|t| t == "tok-3"));
    }

    // Once tok-2 is in use, tok-1 is never sent again.
    let calls = h.status.calls.lock().unwrap().clone();
    let first_fresh = calls.iter().position(|(_, t)| t == "tok-2").unwrap();
    assert!(calls[first_fresh..].iter().all(|(_, t)| t != "tok-1"));
    assert_eq!(h.db.get_last_notified("aaaa").unwrap(), Some(NOW));
    assert_eq!(h.db.get_last_notified("bbbb").unwrap(), Some(NOW));
}
