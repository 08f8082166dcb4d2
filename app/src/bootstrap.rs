use std::path::PathBuf;

use notifier_db::Database;
use player_patterns::seed_default_patterns;
use tokio::task::JoinHandle;

use crate::app::SharedState;
use crate::config::{AppConfig, SettingsManager};
use crate::scheduler::{self, PollTrigger};
use crate::server;

/// Foundation init (fatal on error): env, data dir, DB, seeding, config.
pub fn init_foundation() -> Result<(Database, AppConfig, PathBuf), anyhow::Error> {
    load_dotenv();
    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;

    let db_path = dir.join("notifier.db");
    tracing::info!("Opening database at {}", db_path.display());
    let db = Database::open(&db_path)?;

    if let Err(e) = seed_default_patterns(&db) {
        tracing::error!("Failed to seed player patterns: {e}");
    }

    let sm = SettingsManager::new(db.clone());
    if let Err(e) = sm.migrate_from_env() {
        tracing::error!("Failed to migrate from env: {e}");
    }

    let config = AppConfig::load(&sm)?;

    if sm.credentials()?.is_none() {
        tracing::warn!("Twitch credentials not configured; set them with PUT /api/settings");
    }

    tracing::info!(
        "Settings loaded (port={}, interval={}m)",
        config.server_port,
        config.check_interval
    );
    Ok((db, config, dir))
}

/// Spawn the server and background loops (non-fatal). Returns the server task.
pub async fn spawn_background_tasks(state: &SharedState) -> JoinHandle<()> {
    let s = state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::start_server(s).await {
            tracing::error!("Server failed: {e}");
        }
    });

    match state.take_poll_receiver().await {
        Some(rx) => {
            let reconciler = state.reconciler().clone();
            let shutdown = state.shutdown_token().clone();
            tokio::spawn(scheduler::run_poll_loop(reconciler, rx, shutdown));
        }
        None => tracing::warn!("Poll loop already started"),
    }

    tokio::spawn(scheduler::watch_store_changes(
        state.db().subscribe(),
        state.settings(),
        state.scheduler().clone(),
        state.credentials().clone(),
        state.shutdown_token().clone(),
    ));

    let interval = state.config().await.check_interval;
    state.scheduler().reconfigure(interval);

    // Detect players first so the initial pass already sees their tabs.
    let s = state.clone();
    tokio::spawn(async move {
        if let Err(e) = s.reconciler().matcher().detect_installed_players().await {
            tracing::warn!("Player detection failed: {e}");
        }
        s.scheduler().trigger(PollTrigger::Startup);
    });

    server_handle
}

/// Determine the data directory for the application.
/// Priority: LIVE_NOTIFIER_DATA_DIR env var > ~/.live-notifier
fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LIVE_NOTIFIER_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".live-notifier")
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}
