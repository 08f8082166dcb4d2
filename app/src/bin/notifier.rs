//! Live notifier binary: control server, poll scheduler and signal handling.

use tracing_subscriber::EnvFilter;

use live_notifier_lib::app::SharedState;
use live_notifier_lib::shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting live notifier");

    let (db, config, dir) = live_notifier_lib::init_foundation()?;
    let state = SharedState::new(db, config, dir);

    let server_handle = live_notifier_lib::spawn_background_tasks(&state).await;

    tracing::info!(
        port = state.server_port(),
        "Live notifier running. Press Ctrl+C to stop."
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    shutdown::graceful_shutdown(&state).await;
    if let Err(e) = server_handle.await {
        tracing::warn!("Server task ended abnormally: {e}");
    }
    Ok(())
}
