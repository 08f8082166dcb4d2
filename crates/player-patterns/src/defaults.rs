//! Built-in and auto-detectable player patterns.

use notifier_db::player_patterns::{OFFICIAL_PATTERN_KEY, PlayerPattern};

/// Official twitch.tv channel page, any subdomain, http or https.
pub const OFFICIAL_PATTERN: &str = "*://*.twitch.tv/CHANNEL_NAME";

/// A third-party player extension that can be detected by probing
/// one of its packaged resources.
pub struct KnownPlayer {
    pub key: &'static str,
    pub name: &'static str,
    pub probe_url: &'static str,
    pub pattern: &'static str,
}

/// Player extensions probed on start-up and on request.
pub const KNOWN_PLAYERS: &[KnownPlayer] = &[KnownPlayer {
    key: "alternate-player",
    name: "Alternate Player for Twitch.tv",
    probe_url: "chrome-extension://bhplkbgoehhhddaoolmakpocnenplmhf/manifest.json",
    pattern: "chrome-extension://bhplkbgoehhhddaoolmakpocnenplmhf/player.html?channel=CHANNEL_NAME",
}];

pub fn official_pattern() -> PlayerPattern {
    PlayerPattern {
        key: OFFICIAL_PATTERN_KEY.to_string(),
        name: "Twitch".to_string(),
        enabled: true,
        pattern: OFFICIAL_PATTERN.to_string(),
    }
}

impl KnownPlayer {
    /// The pattern entry added once the player is detected.
    pub fn to_pattern(&self) -> PlayerPattern {
        PlayerPattern {
            key: self.key.to_string(),
            name: self.name.to_string(),
            enabled: true,
            pattern: self.pattern.to_string(),
        }
    }
}
