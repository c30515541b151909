//! The strategy callback interface.
//!
//! Strategies are consumed through this narrow trait only; how callbacks
//! are produced (journal replay, live market data) is the event loop
//! collaborator's concern.

use crate::context::StrategyContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One event delivered to a strategy.
///
/// The payload is opaque to the dispatch layer; strategies decode the
/// frames they care about and ignore the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event time in nanoseconds since the epoch.
    pub time: i64,
    /// Frame tag identifying the payload type.
    pub tag: String,
    /// Frame payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Creates an event.
    #[must_use]
    pub fn new(time: i64, tag: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            time,
            tag: tag.into(),
            payload,
        }
    }
}

/// Trait implemented by every trading strategy.
///
/// The runner guarantees `on_start` is called once before any event and
/// `on_stop` once after the last event, even when event handlers failed.
pub trait Strategy: Send {
    /// Returns the strategy instance name.
    fn name(&self) -> &str;

    /// Called once before the first event.
    ///
    /// # Errors
    ///
    /// A failing `on_start` aborts the run before any event is delivered.
    fn on_start(&mut self, ctx: &StrategyContext) -> Result<()>;

    /// Called for each event delivered by the event loop.
    fn on_event(&mut self, event: &Event, ctx: &StrategyContext);

    /// Called once after the last event.
    ///
    /// # Errors
    ///
    /// Stop errors are logged by the runner; they do not change the exit
    /// path.
    fn on_stop(&mut self, ctx: &StrategyContext) -> Result<()>;
}
