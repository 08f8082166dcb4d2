//! Player URL patterns: built-in defaults, first-run seeding, and
//! browser-style match-pattern matching.
//!
//! A player pattern is a URL match pattern containing the `CHANNEL_NAME`
//! placeholder. Substituting a channel login yields the pattern for tabs
//! showing that channel in that player.

pub mod defaults;
pub mod match_pattern;
pub mod seed;

use std::collections::BTreeSet;

use notifier_db::player_patterns::{CHANNEL_NAME_PLACEHOLDER, PlayerPatterns};

pub use match_pattern::{MatchPattern, PatternError};
pub use seed::{SeedError, load_patterns, seed_default_patterns};

/// Substitute `channel` into every enabled pattern.
pub fn build_url_patterns(patterns: &PlayerPatterns, channel: &str) -> BTreeSet<String> {
    patterns
        .values()
        .filter(|p| p.enabled)
        .map(|p| p.pattern.replace(CHANNEL_NAME_PLACEHOLDER, channel))
        .collect()
}

/// Check a user-supplied pattern before it is stored.
pub fn validate_pattern(pattern: &str) -> Result<(), PatternError> {
    if !pattern.contains(CHANNEL_NAME_PLACEHOLDER) {
        return Err(PatternError::MissingPlaceholder);
    }
    MatchPattern::parse(&pattern.replace(CHANNEL_NAME_PLACEHOLDER, "channel_name"))?;
    Ok(())
}
