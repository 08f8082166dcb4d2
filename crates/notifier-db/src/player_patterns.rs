//! Persisted player URL patterns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keys::PLAYER_PATTERNS;
use crate::{Database, DbError};

/// Key of the built-in pattern for the official Twitch player.
pub const OFFICIAL_PATTERN_KEY: &str = "official";

/// Placeholder substituted with the channel login.
pub const CHANNEL_NAME_PLACEHOLDER: &str = "CHANNEL_NAME";

/// A URL pattern identifying a player page for some channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPattern {
    pub key: String,
    pub name: String,
    pub enabled: bool,
    pub pattern: String,
}

pub type PlayerPatterns = BTreeMap<String, PlayerPattern>;

impl Database {
    /// Stored patterns, or `None` if nothing was ever stored.
    pub fn get_player_patterns(&self) -> Result<Option<PlayerPatterns>, DbError> {
        let patterns: Option<PlayerPatterns> = self.get_typed(PLAYER_PATTERNS)?;
        Ok(patterns.map(|mut map| {
            // The map key is authoritative.
            for (key, pattern) in map.iter_mut() {
                pattern.key.clone_from(key);
            }
            map
        }))
    }

    pub fn save_player_patterns(&self, patterns: &PlayerPatterns) -> Result<(), DbError> {
        if !patterns.contains_key(OFFICIAL_PATTERN_KEY) {
            return Err(DbError::InvalidData(format!(
                "pattern set must contain '{OFFICIAL_PATTERN_KEY}'"
            )));
        }
        self.set_typed(PLAYER_PATTERNS, patterns)
    }

    /// Insert a pattern if its key is unused. Returns `false` if it exists.
    pub fn insert_player_pattern(&self, pattern: PlayerPattern) -> Result<bool, DbError> {
        self.update_typed(PLAYER_PATTERNS, |map: &mut PlayerPatterns| {
            if map.contains_key(&pattern.key) {
                return Ok((false, false));
            }
            map.insert(pattern.key.clone(), pattern);
            Ok((true, true))
        })
    }

    pub fn set_player_pattern_enabled(&self, key: &str, enabled: bool) -> Result<(), DbError> {
        self.update_typed(PLAYER_PATTERNS, |map: &mut PlayerPatterns| {
            let pattern = map
                .get_mut(key)
                .ok_or_else(|| DbError::NotFound(format!("player pattern {key}")))?;
            let dirty = pattern.enabled != enabled;
            pattern.enabled = enabled;
            Ok(((), dirty))
        })
    }

    /// Delete a pattern. The official pattern cannot be deleted.
    pub fn delete_player_pattern(&self, key: &str) -> Result<bool, DbError> {
        if key == OFFICIAL_PATTERN_KEY {
            return Err(DbError::InvalidData(
                "the official player pattern cannot be deleted".into(),
            ));
        }
        self.update_typed(PLAYER_PATTERNS, |map: &mut PlayerPatterns| {
            let removed = map.remove(key).is_some();
            Ok((removed, removed))
        })
    }
}
