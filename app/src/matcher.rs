//! "Is this channel already open somewhere?" and player auto-detection.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use notifier_db::{Database, DbError};
use player_patterns::defaults::{KNOWN_PLAYERS, KnownPlayer};
use player_patterns::{build_url_patterns, load_patterns, seed_default_patterns};

use crate::platform::BrowserPlatform;

pub struct PatternMatcher {
    db: Database,
    platform: Arc<dyn BrowserPlatform>,
    known_players: &'static [KnownPlayer],
}

impl PatternMatcher {
    pub fn new(db: Database, platform: Arc<dyn BrowserPlatform>) -> Self {
        Self {
            db,
            platform,
            known_players: KNOWN_PLAYERS,
        }
    }

    pub fn with_known_players(mut self, known_players: &'static [KnownPlayer]) -> Self {
        self.known_players = known_players;
        self
    }

    /// URL patterns that identify a tab showing `channel`.
    pub fn build_url_patterns(&self, channel: &str) -> Result<BTreeSet<String>, DbError> {
        Ok(build_url_patterns(&load_patterns(&self.db)?, channel))
    }

    /// Query every pattern concurrently. A failed query counts as no match.
    pub async fn is_channel_open(&self, channel: &str) -> bool {
        let patterns = match self.build_url_patterns(channel) {
            Ok(patterns) => patterns,
            Err(e) => {
                tracing::warn!(channel, "Failed to load player patterns: {e}");
                return false;
            }
        };
        if patterns.is_empty() {
            return false;
        }

        let queries = patterns.iter().map(|pattern| async move {
            match self.platform.query_tabs(pattern).await {
                Ok(tabs) => !tabs.is_empty(),
                Err(e) => {
                    tracing::debug!(pattern = %pattern, "Tab query failed: {e}");
                    false
                }
            }
        });
        join_all(queries).await.into_iter().any(|open| open)
    }

    /// Probe known third-party players and add a pattern for each one
    /// found. Returns the keys that were newly added.
    pub async fn detect_installed_players(&self) -> Result<Vec<String>, DbError> {
        seed_default_patterns(&self.db).map_err(|player_patterns::SeedError::Db(e)| e)?;

        let probes = self.known_players.iter().map(|player| async move {
            (player, self.platform.resource_exists(player.probe_url).await)
        });

        let mut added = Vec::new();
        for (player, installed) in join_all(probes).await {
            if !installed {
                continue;
            }
            if self.db.insert_player_pattern(player.to_pattern())? {
                tracing::info!(key = player.key, "Detected player: {}", player.name);
                added.push(player.key.to_string());
            }
        }
        Ok(added)
    }
}
