//! Context passed into strategy callbacks.

use boreas_core::{Location, Mode};

/// State a strategy can read during its callbacks.
///
/// This is explicit state handed to the strategy constructor and callback
/// invocations; strategies never read their identity from the process
/// environment.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    /// The strategy's own location.
    pub location: Location,
    /// Run mode the runner is bound to.
    pub mode: Mode,
    /// Whether the hosting process runs in low-latency mode.
    pub low_latency: bool,
}

impl StrategyContext {
    /// Creates a context for the given strategy location.
    #[must_use]
    pub fn new(location: Location, low_latency: bool) -> Self {
        let mode = location.mode;
        Self {
            location,
            mode,
            low_latency,
        }
    }
}
