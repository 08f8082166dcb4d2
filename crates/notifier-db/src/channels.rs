//! Channel registry and per-channel notification bookkeeping.
//!
//! Channels are stored as an ordered JSON array under `channels`; the
//! last-notified timestamps (epoch ms) as an object under `lastNotified`.
//! A `lastNotified` entry whose channel was removed is left in place and
//! simply never read again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keys::{CHANNELS, LAST_NOTIFIED};
use crate::{Database, DbError};

const MIN_NAME_LEN: usize = 4;
const MAX_NAME_LEN: usize = 25;

/// A tracked channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub active: bool,
}

/// One bookkeeping mutation produced by a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationChange {
    /// The channel's current live session has been acted on at `at`.
    Notified { channel: String, at: i64 },
    /// The channel was seen offline.
    Cleared { channel: String },
}

/// Validate a channel login and normalise it to lowercase.
pub fn normalize_channel_name(raw: &str) -> Result<String, DbError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(DbError::InvalidData(format!(
            "channel name must be {MIN_NAME_LEN}-{MAX_NAME_LEN} characters: {name:?}"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::InvalidData(format!(
            "channel name may only contain letters, digits and '_': {name:?}"
        )));
    }
    Ok(name.to_ascii_lowercase())
}

impl Database {
    /// List tracked channels in insertion order. With a filter, only the
    /// (case-insensitively) matching channel is returned.
    pub fn list_channels(&self, filter: Option<&str>) -> Result<Vec<Channel>, DbError> {
        let channels: Vec<Channel> = self.get_typed(CHANNELS)?.unwrap_or_default();
        Ok(match filter {
            Some(name) => {
                let name = name.trim();
                channels
                    .into_iter()
                    .filter(|c| c.name.eq_ignore_ascii_case(name))
                    .take(1)
                    .collect()
            }
            None => channels,
        })
    }

    /// Track a new channel (active). Returns `false` if it already exists.
    pub fn add_channel(&self, name: &str) -> Result<bool, DbError> {
        let name = normalize_channel_name(name)?;
        self.update_typed(CHANNELS, |channels: &mut Vec<Channel>| {
            if channels.iter().any(|c| c.name.eq_ignore_ascii_case(&name)) {
                return Ok((false, false));
            }
            channels.push(Channel {
                name: name.clone(),
                active: true,
            });
            Ok((true, true))
        })
    }

    /// Stop tracking a channel. Returns `false` if it was not tracked.
    pub fn remove_channel(&self, name: &str) -> Result<bool, DbError> {
        let name = name.trim().to_string();
        self.update_typed(CHANNELS, |channels: &mut Vec<Channel>| {
            let before = channels.len();
            channels.retain(|c| !c.name.eq_ignore_ascii_case(&name));
            let removed = channels.len() != before;
            Ok((removed, removed))
        })
    }

    /// Enable or disable polling for a channel.
    pub fn set_channel_active(&self, name: &str, active: bool) -> Result<(), DbError> {
        let name = name.trim().to_string();
        self.update_typed(CHANNELS, |channels: &mut Vec<Channel>| {
            let channel = channels
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(&name))
                .ok_or_else(|| DbError::NotFound(format!("channel {name}")))?;
            let dirty = channel.active != active;
            channel.active = active;
            Ok(((), dirty))
        })
    }

    pub fn get_all_last_notified(&self) -> Result<BTreeMap<String, i64>, DbError> {
        Ok(self.get_typed(LAST_NOTIFIED)?.unwrap_or_default())
    }

    pub fn get_last_notified(&self, name: &str) -> Result<Option<i64>, DbError> {
        let key = bookkeeping_key(name);
        Ok(self.get_all_last_notified()?.get(&key).copied())
    }

    pub fn set_last_notified(&self, name: &str, at: i64) -> Result<(), DbError> {
        self.apply_notification_changes(&[NotificationChange::Notified {
            channel: name.to_string(),
            at,
        }])
    }

    pub fn clear_last_notified(&self, name: &str) -> Result<(), DbError> {
        self.apply_notification_changes(&[NotificationChange::Cleared {
            channel: name.to_string(),
        }])
    }

    /// Apply a batch of bookkeeping changes in one durable write.
    ///
    /// Only the listed channels are touched, so two passes that processed
    /// different channels do not overwrite each other's entries.
    pub fn apply_notification_changes(
        &self,
        changes: &[NotificationChange],
    ) -> Result<(), DbError> {
        if changes.is_empty() {
            return Ok(());
        }
        self.update_typed(LAST_NOTIFIED, |map: &mut BTreeMap<String, i64>| {
            let mut dirty = false;
            for change in changes {
                match change {
                    NotificationChange::Notified { channel, at } => {
                        let previous = map.insert(bookkeeping_key(channel), *at);
                        dirty |= previous != Some(*at);
                    }
                    NotificationChange::Cleared { channel } => {
                        dirty |= map.remove(&bookkeeping_key(channel)).is_some();
                    }
                }
            }
            Ok(((), dirty))
        })
    }
}

fn bookkeeping_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
