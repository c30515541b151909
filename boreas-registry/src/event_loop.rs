//! Long-running event loop driving a strategy runner.
//!
//! Dispatch hands a configured [`Runner`] to [`run_forever`], which blocks
//! the caller until shutdown. Event production (journal replay, live
//! feeds) belongs to the collaborators that hold the [`RunnerHandle`].

use crate::shutdown::ShutdownController;
use boreas_strategy::{Runner, RunnerHandle};
use tracing::info;

/// Runs the strategy runner until shutdown.
///
/// The runner is spawned onto its own task; this function returns after
/// a shutdown signal has been observed and the runner has drained and
/// stopped its strategies, or after the runner terminates on its own (a
/// failed strategy start, every feeding handle dropped). A runner that
/// terminates first initiates shutdown so the hosting process follows.
/// The handle keeps the runner's command channel open for the
/// collaborators feeding it events.
pub async fn run_forever(runner: Runner, handle: RunnerHandle, shutdown: ShutdownController) {
    let mut task = tokio::spawn(runner.run());

    tokio::select! {
        () = shutdown.wait() => {
            info!("event loop shutting down");
            // The runner may already be gone when every other handle
            // dropped.
            let _ = handle.stop().await;
            let _ = (&mut task).await;
        }
        _ = &mut task => {
            info!("runner terminated, shutting down");
            shutdown.initiate();
        }
    }
    shutdown.mark_complete();
}
