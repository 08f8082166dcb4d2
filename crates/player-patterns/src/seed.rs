//! First-run seeding of player patterns.

use notifier_db::Database;
use notifier_db::player_patterns::{OFFICIAL_PATTERN_KEY, PlayerPatterns};

use crate::defaults::official_pattern;

/// Make sure the stored pattern set exists and contains the official pattern.
/// Existing entries, including a disabled official pattern, are kept as-is.
pub fn seed_default_patterns(db: &Database) -> Result<(), SeedError> {
    match db.get_player_patterns().map_err(SeedError::Db)? {
        None => {
            tracing::info!("Seeding default player patterns");
            let mut patterns = PlayerPatterns::new();
            patterns.insert(OFFICIAL_PATTERN_KEY.to_string(), official_pattern());
            db.save_player_patterns(&patterns).map_err(SeedError::Db)?;
        }
        Some(patterns) if !patterns.contains_key(OFFICIAL_PATTERN_KEY) => {
            tracing::warn!("Official player pattern missing, restoring it");
            db.insert_player_pattern(official_pattern())
                .map_err(SeedError::Db)?;
        }
        Some(_) => {}
    }
    Ok(())
}

/// Current pattern set. Falls back to the built-in official pattern in
/// memory when nothing usable is stored.
pub fn load_patterns(db: &Database) -> Result<PlayerPatterns, notifier_db::DbError> {
    let mut patterns = db.get_player_patterns()?.unwrap_or_default();
    patterns
        .entry(OFFICIAL_PATTERN_KEY.to_string())
        .or_insert_with(official_pattern);
    Ok(patterns)
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Db(notifier_db::DbError),
}
