use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::state::SessionRegistry;
use crate::sync::manager::SyncManager;

/// Periodically ask each session's backend for a fresh snapshot.
///
/// Off unless configured. Sessions without a known server are skipped.
pub fn start_resync(
    manager: SyncManager,
    sessions: Arc<SessionRegistry>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), "Periodic resync enabled");
        let mut shutdown_rx = manager.subscribe_shutdown();
        let mut interval = tokio::time::interval(every);
        // First tick completes immediately.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let mut requested = 0usize;
                    for player in sessions.all() {
                        if player.current_server().is_some() && manager.request_sync(&player).is_ok() {
                            requested += 1;
                        }
                    }
                    debug!(requested, "Resync round");
                }
                _ = shutdown_rx.recv() => {
                    info!("Periodic resync stopping");
                    break;
                }
            }
        }
    })
}
