//! Runner command types.

use crate::r#trait::Event;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Commands accepted by a strategy runner.
#[derive(Debug, Clone)]
pub enum RunnerCommand {
    /// Dispatch an event to every registered strategy.
    OnEvent(Arc<Event>),

    /// Gracefully stop the run.
    ///
    /// `on_stop` is called on every registered strategy before the runner
    /// terminates.
    Stop,
}

impl RunnerCommand {
    /// Creates a new `OnEvent` command.
    #[must_use]
    pub fn event(event: Event) -> Self {
        Self::OnEvent(Arc::new(event))
    }

    /// Creates a new `Stop` command.
    #[must_use]
    pub const fn stop() -> Self {
        Self::Stop
    }

    /// Returns true if this is a stop command.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Sending half of a runner's command channel.
///
/// Cloneable; the runner terminates once every handle is dropped or a stop
/// command arrives, whichever comes first.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    cmd_tx: mpsc::Sender<RunnerCommand>,
}

impl RunnerHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<RunnerCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Sends an event for dispatch.
    ///
    /// # Errors
    ///
    /// Fails when the runner has already terminated.
    pub async fn send_event(&self, event: Event) -> Result<(), mpsc::error::SendError<RunnerCommand>> {
        self.cmd_tx.send(RunnerCommand::event(event)).await
    }

    /// Requests a graceful stop.
    ///
    /// # Errors
    ///
    /// Fails when the runner has already terminated.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<RunnerCommand>> {
        self.cmd_tx.send(RunnerCommand::stop()).await
    }
}
