//! Graceful shutdown coordination.
//!
//! A single [`ShutdownController`] is shared by the dispatch layer and the
//! role's run loop. Dispatch blocks until the loop observes the shutdown
//! signal and terminates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Coordinates shutdown between the host process and its run loop.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    initiated: Arc<AtomicBool>,
    signal_tx: broadcast::Sender<()>,
    done_tx: Arc<watch::Sender<bool>>,
    done_rx: watch::Receiver<bool>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Creates a controller with no shutdown pending.
    #[must_use]
    pub fn new() -> Self {
        let (signal_tx, _) = broadcast::channel(1);
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            initiated: Arc::new(AtomicBool::new(false)),
            signal_tx,
            done_tx: Arc::new(done_tx),
            done_rx,
        }
    }

    /// Signals shutdown to every listener. Idempotent.
    pub fn initiate(&self) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("shutdown initiated");
            let _ = self.signal_tx.send(());
        }
    }

    /// Returns whether shutdown has been signalled.
    #[must_use]
    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Completes when shutdown is signalled.
    pub async fn wait(&self) {
        // Subscribe before checking the flag so a signal arriving between
        // the two is not missed.
        let mut rx = self.signal_tx.subscribe();
        if self.is_initiated() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Returns a receiver for the shutdown signal.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.signal_tx.subscribe()
    }

    /// Marks the run loop as fully terminated.
    pub fn mark_complete(&self) {
        let _ = self.done_tx.send(true);
    }

    /// Waits for the run loop to terminate, up to `timeout`.
    ///
    /// Returns false when the loop did not complete in time.
    pub async fn wait_for_completion(&self, timeout: Duration) -> bool {
        let mut rx = self.done_rx.clone();
        if *rx.borrow() {
            return true;
        }
        tokio::select! {
            result = rx.changed() => result.is_ok() && *rx.borrow(),
            () = tokio::time::sleep(timeout) => {
                warn!(?timeout, "run loop did not complete before the timeout");
                false
            }
        }
    }
}

/// Wires OS termination signals into the controller.
///
/// Listens for SIGINT and SIGTERM on unix, Ctrl+C elsewhere, and resolves
/// once a signal has been translated into a shutdown.
pub async fn listen_for_signals(controller: ShutdownController) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (Ok(mut sigint), Ok(mut sigterm)) = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) else {
            warn!("cannot install signal handlers; shutdown must be requested programmatically");
            return;
        };
        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
        controller.initiate();
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C");
            controller.initiate();
        }
    }
}
