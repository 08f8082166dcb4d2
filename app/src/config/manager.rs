//! SettingsManager: store-backed settings with defaults, validation and env migration.

use notifier_db::{Database, Record, keys};
use serde_json::Value;

use super::defaults::DEFAULT_CHECK_INTERVAL;
use super::validation::{validate_check_interval, validate_client_id, validate_client_secret};
use super::{SettingsUpdate, SettingsView};
use crate::credentials::Credentials;

/// Wraps [`Database`] to provide high-level settings operations.
pub struct SettingsManager {
    db: Database,
}

impl SettingsManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Poll interval in minutes. Absent or out-of-range values fall back
    /// to the default.
    pub fn check_interval(&self) -> Result<u32, anyhow::Error> {
        let stored: Option<u32> = match self.db.get_value(keys::CHECK_INTERVAL)? {
            Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        Ok(match stored {
            Some(m) if validate_check_interval(m).is_ok() => m,
            Some(m) => {
                tracing::warn!(value = m, "Stored check interval out of range, using default");
                DEFAULT_CHECK_INTERVAL
            }
            None => DEFAULT_CHECK_INTERVAL,
        })
    }

    pub fn set_check_interval(&self, minutes: u32) -> Result<(), anyhow::Error> {
        validate_check_interval(minutes)
            .map_err(|e| anyhow::anyhow!("validation error for checkInterval: {e}"))?;
        self.db.set_typed(keys::CHECK_INTERVAL, &minutes)?;
        Ok(())
    }

    /// Stored credentials, if both halves are present and non-empty.
    pub fn credentials(&self) -> Result<Option<Credentials>, anyhow::Error> {
        let record = self.db.get(&[keys::CLIENT_ID, keys::CLIENT_SECRET])?;
        let text = |key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Ok(match (text(keys::CLIENT_ID), text(keys::CLIENT_SECRET)) {
            (Some(client_id), Some(client_secret)) => Some(Credentials {
                client_id,
                client_secret,
            }),
            _ => None,
        })
    }

    /// Validate and apply a partial update in one store write.
    pub fn apply_update(&self, update: &SettingsUpdate) -> Result<u32, anyhow::Error> {
        let mut record = Record::new();

        if let Some(id) = &update.client_id {
            let id = id.trim();
            validate_client_id(id).map_err(|e| anyhow::anyhow!("validation error for clientId: {e}"))?;
            record.insert(keys::CLIENT_ID.into(), Value::String(id.to_string()));
        }
        if let Some(secret) = &update.client_secret {
            let secret = secret.trim();
            validate_client_secret(secret)
                .map_err(|e| anyhow::anyhow!("validation error for clientSecret: {e}"))?;
            record.insert(keys::CLIENT_SECRET.into(), Value::String(secret.to_string()));
        }
        if let Some(minutes) = update.check_interval {
            validate_check_interval(minutes)
                .map_err(|e| anyhow::anyhow!("validation error for checkInterval: {e}"))?;
            record.insert(keys::CHECK_INTERVAL.into(), Value::from(minutes));
        }

        let updated = record.len() as u32;
        if updated > 0 {
            self.db.set(record)?;
        }
        Ok(updated)
    }

    /// Forget the stored client credentials. Channels and bookkeeping stay.
    pub fn clear_credentials(&self) -> Result<(), anyhow::Error> {
        self.db.remove(&[keys::CLIENT_ID, keys::CLIENT_SECRET])?;
        Ok(())
    }

    pub fn view(&self) -> Result<SettingsView, anyhow::Error> {
        let record = self.db.get(&[keys::CLIENT_ID, keys::CLIENT_SECRET])?;
        let client_id = record
            .get(keys::CLIENT_ID)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let has_client_secret = record
            .get(keys::CLIENT_SECRET)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        Ok(SettingsView {
            credentials_configured: !client_id.is_empty() && has_client_secret,
            client_id,
            has_client_secret,
            check_interval: self.check_interval()?,
        })
    }

    /// Migrate settings from environment variables to the store (one-time).
    pub fn migrate_from_env(&self) -> Result<u32, anyhow::Error> {
        let mut migrated = 0u32;
        for (env_key, store_key) in [
            ("CLIENT_ID", keys::CLIENT_ID),
            ("CLIENT_SECRET", keys::CLIENT_SECRET),
            ("CHECK_INTERVAL", keys::CHECK_INTERVAL),
        ] {
            if self.db.get_value(store_key)?.is_some() {
                continue;
            }
            let Ok(env_val) = std::env::var(env_key) else {
                continue;
            };
            let env_val = env_val.trim();
            if env_val.is_empty() {
                continue;
            }
            let update = match store_key {
                keys::CHECK_INTERVAL => SettingsUpdate {
                    check_interval: Some(env_val.parse().map_err(|_| {
                        anyhow::anyhow!("{env_key} must be an integer, got {env_val:?}")
                    })?),
                    ..Default::default()
                },
                keys::CLIENT_ID => SettingsUpdate {
                    client_id: Some(env_val.to_string()),
                    ..Default::default()
                },
                _ => SettingsUpdate {
                    client_secret: Some(env_val.to_string()),
                    ..Default::default()
                },
            };
            self.apply_update(&update)?;
            tracing::info!("Migrated setting from env: {env_key}");
            migrated += 1;
        }
        if migrated > 0 {
            tracing::info!("Migration completed: {migrated} settings migrated");
            if std::env::var("CLIENT_SECRET").is_ok_and(|v| !v.is_empty()) {
                tracing::warn!(
                    "SECURITY WARNING: Sensitive data in env vars. \
                     Remove from .env after confirming migration."
                );
            }
        }
        Ok(migrated)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}
