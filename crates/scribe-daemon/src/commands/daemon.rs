//! Daemon lifecycle commands.

use std::sync::Arc;

use tracing::info;

use crate::DaemonState;

/// Ask the main loop to stop. Pending reconcilers resume on the next start.
pub fn shutdown(state: &Arc<DaemonState>) -> super::Result {
    info!("shutdown requested over IPC");
    let _ = state.shutdown_tx.send(());
    Ok(serde_json::json!({ "stopping": true }))
}
