use std::time::Duration;

use tokio::time::sleep;

use crate::app::SharedState;

pub async fn graceful_shutdown(state: &SharedState) {
    tracing::info!("Shutdown sequence started");

    state.scheduler().stop();
    tracing::info!("Shutdown: poll timer stopped");

    state.shutdown_token().cancel();
    tracing::info!("Shutdown: background loops cancelled");

    // Let in-flight passes write their bookkeeping.
    sleep(Duration::from_millis(200)).await;
    tracing::info!("Shutdown sequence completed");
}
