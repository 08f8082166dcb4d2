//! Runtime application configuration loaded from DB + environment overrides.

use super::defaults::{DEFAULT_DEVTOOLS_URL, DEFAULT_SERVER_PORT};
use super::manager::SettingsManager;

/// Runtime configuration populated from the settings DB and the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub devtools_url: String,
    pub token_url: String,
    pub helix_url: String,
    pub check_interval: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
            devtools_url: DEFAULT_DEVTOOLS_URL.into(),
            token_url: twitch_client::TOKEN_URL.into(),
            helix_url: twitch_client::HELIX_BASE.into(),
            check_interval: super::defaults::DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl AppConfig {
    /// Load configuration from the settings manager (DB-first, env overrides).
    pub fn load(sm: &SettingsManager) -> Result<Self, anyhow::Error> {
        let env = |key: &str| -> String {
            std::env::var(key)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        let or_default = |v: String, default: &str| -> String {
            if v.is_empty() { default.into() } else { v }
        };

        Ok(Self {
            server_port: parse_u16(&env("SERVER_PORT"), DEFAULT_SERVER_PORT),
            devtools_url: or_default(env("BROWSER_DEVTOOLS_URL"), DEFAULT_DEVTOOLS_URL),
            token_url: or_default(env("TWITCH_TOKEN_URL"), twitch_client::TOKEN_URL),
            helix_url: or_default(env("TWITCH_HELIX_URL"), twitch_client::HELIX_BASE),
            check_interval: sm.check_interval()?,
        })
    }

    /// Reload config from the settings manager.
    pub fn reload(&mut self, sm: &SettingsManager) -> Result<(), anyhow::Error> {
        *self = Self::load(sm)?;
        Ok(())
    }
}

fn parse_u16(s: &str, default: u16) -> u16 {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or_else(|_| {
        tracing::warn!(value = s, "Invalid port, using default {default}");
        default
    })
}
