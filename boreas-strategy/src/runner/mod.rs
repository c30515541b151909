//! Strategy runner actor.
//!
//! A `Runner` owns every strategy registered for one session and drives
//! their callbacks from a single Tokio task. Commands arrive over an mpsc
//! channel through the [`RunnerHandle`]:
//! - `OnEvent`: dispatch an event to every enabled strategy
//! - `Stop`: call `on_stop` everywhere and terminate
//!
//! Panics in strategy callbacks are caught per strategy; a strategy that
//! keeps failing is disabled while the rest of the session continues.
//!
//! # Example
//!
//! ```ignore
//! use boreas_strategy::{Event, Runner};
//!
//! let (mut runner, handle) = Runner::new(ctx);
//! runner.add_strategy(strategy);
//! tokio::spawn(runner.run());
//!
//! handle.send_event(event).await?;
//! handle.stop().await?;
//! ```

mod command;
#[allow(clippy::module_inception)]
mod runner;

pub use command::{RunnerCommand, RunnerHandle};
pub use runner::{DEFAULT_ERROR_THRESHOLD, Runner};
