//! Strategy runner actor implementation.
//!
//! The `Runner` owns every strategy registered for a session and drives
//! their callbacks from a single command channel.

use crate::context::StrategyContext;
use crate::runner::{RunnerCommand, RunnerHandle};
use crate::r#trait::{Event, Strategy};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Default error threshold before disabling a strategy.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 10;

/// Command channel depth.
const COMMAND_BUFFER: usize = 100;

/// One registered strategy plus its dispatch bookkeeping.
struct Slot {
    strategy: Box<dyn Strategy>,
    error_count: u32,
    disabled: bool,
}

/// Strategy runner actor.
///
/// Holds every registered strategy for the lifetime of the run and
/// dispatches commands to all of them in registration order. Panics in
/// strategy callbacks are caught and counted per strategy; a strategy
/// exceeding its error threshold is disabled, the rest keep running.
///
/// `on_start` is called once per strategy before any event, and `on_stop`
/// once per started strategy after the last event, including strategies
/// disabled mid-run.
pub struct Runner {
    ctx: StrategyContext,
    slots: Vec<Slot>,
    cmd_rx: mpsc::Receiver<RunnerCommand>,
    error_threshold: u32,
}

impl Runner {
    /// Creates a runner bound to the given context.
    ///
    /// Returns the runner together with the handle used to feed it
    /// commands.
    #[must_use]
    pub fn new(ctx: StrategyContext) -> (Self, RunnerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let runner = Self {
            ctx,
            slots: Vec::new(),
            cmd_rx,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
        };
        (runner, RunnerHandle::new(cmd_tx))
    }

    /// Overrides the per-strategy error threshold.
    #[must_use]
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// Registers a strategy for this run.
    ///
    /// Strategies receive events in registration order.
    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy>) {
        info!(
            runner = %self.ctx.location,
            strategy = strategy.name(),
            "registered strategy"
        );
        self.slots.push(Slot {
            strategy,
            error_count: 0,
            disabled: false,
        });
    }

    /// Number of registered strategies.
    #[must_use]
    pub fn strategy_count(&self) -> usize {
        self.slots.len()
    }

    /// Runs the session to completion.
    ///
    /// Starts every strategy, dispatches commands until a stop command
    /// arrives or every handle is dropped, then stops every started
    /// strategy. A failing `on_start` aborts the run before any event is
    /// delivered; strategies started up to that point are still stopped.
    pub async fn run(mut self) {
        let runner = self.ctx.location.clone();
        info!(runner = %runner, strategies = self.slots.len(), "starting runner");

        let mut started = 0;
        for slot in &mut self.slots {
            if let Err(e) = slot.strategy.on_start(&self.ctx) {
                error!(
                    runner = %runner,
                    strategy = slot.strategy.name(),
                    error = %e,
                    "strategy start failed"
                );
                Self::stop_all(&mut self.slots[..started], &self.ctx);
                return;
            }
            started += 1;
        }

        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                RunnerCommand::OnEvent(event) => {
                    Self::dispatch(&mut self.slots, &self.ctx, &event, self.error_threshold);
                }
                RunnerCommand::Stop => {
                    info!(runner = %runner, "received stop command");
                    break;
                }
            }
        }

        Self::stop_all(&mut self.slots, &self.ctx);
        info!(runner = %runner, "runner terminated");
    }

    fn dispatch(slots: &mut [Slot], ctx: &StrategyContext, event: &Event, threshold: u32) {
        for slot in slots.iter_mut().filter(|s| !s.disabled) {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                slot.strategy.on_event(event, ctx);
            }));
            if let Err(payload) = result {
                slot.error_count += 1;
                error!(
                    strategy = slot.strategy.name(),
                    error_count = slot.error_count,
                    threshold,
                    "panic in event handler: {}",
                    panic_message(&payload)
                );
                if slot.error_count >= threshold {
                    slot.disabled = true;
                    error!(
                        strategy = slot.strategy.name(),
                        "strategy disabled after repeated errors"
                    );
                }
            }
        }
    }

    fn stop_all(slots: &mut [Slot], ctx: &StrategyContext) {
        for slot in slots {
            if let Err(e) = slot.strategy.on_stop(ctx) {
                error!(
                    strategy = slot.strategy.name(),
                    error = %e,
                    "strategy stop error"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload.downcast_ref::<&str>().map_or_else(
        || {
            payload
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_else(|| "unknown panic".to_string())
        },
        |s| (*s).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use boreas_core::{Category, Location, Mode, RuntimeDir};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct MockStrategy {
        name: String,
        start_called: Arc<AtomicBool>,
        stop_called: Arc<AtomicBool>,
        event_count: Arc<AtomicU32>,
        should_panic: bool,
        start_should_fail: bool,
    }

    impl MockStrategy {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                start_called: Arc::new(AtomicBool::new(false)),
                stop_called: Arc::new(AtomicBool::new(false)),
                event_count: Arc::new(AtomicU32::new(0)),
                should_panic: false,
                start_should_fail: false,
            }
        }

        fn with_panic(mut self) -> Self {
            self.should_panic = true;
            self
        }

        fn with_start_failure(mut self) -> Self {
            self.start_should_fail = true;
            self
        }

        fn start_called(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.start_called)
        }

        fn stop_called(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.stop_called)
        }

        fn event_count(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.event_count)
        }
    }

    impl Strategy for MockStrategy {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_start(&mut self, _ctx: &StrategyContext) -> anyhow::Result<()> {
            self.start_called.store(true, Ordering::SeqCst);
            if self.start_should_fail {
                anyhow::bail!("start failed");
            }
            Ok(())
        }

        fn on_event(&mut self, _event: &Event, _ctx: &StrategyContext) {
            assert!(!self.should_panic, "test panic in on_event");
            self.event_count.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stop(&mut self, _ctx: &StrategyContext) -> anyhow::Result<()> {
            self.stop_called.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_ctx() -> StrategyContext {
        let location = Location::new(
            Mode::Backtest,
            Category::Strategy,
            "default",
            "alpha",
            Arc::new(RuntimeDir::new("/tmp/boreas-test")),
        );
        StrategyContext::new(location, false)
    }

    fn test_event() -> Event {
        Event::new(1_704_067_200_000_000_000, "quote", serde_json::json!({"px": 42.0}))
    }

    #[test]
    fn test_runner_registration() {
        let (mut runner, _handle) = Runner::new(test_ctx());
        assert_eq!(runner.strategy_count(), 0);
        runner.add_strategy(Box::new(MockStrategy::new("alpha")));
        assert_eq!(runner.strategy_count(), 1);
    }

    #[tokio::test]
    async fn test_runner_lifecycle() {
        let strategy = MockStrategy::new("alpha");
        let start_called = strategy.start_called();
        let stop_called = strategy.stop_called();
        let event_count = strategy.event_count();

        let (mut runner, handle) = Runner::new(test_ctx());
        runner.add_strategy(Box::new(strategy));
        let task = tokio::spawn(runner.run());

        handle.send_event(test_event()).await.unwrap();
        handle.send_event(test_event()).await.unwrap();
        handle.stop().await.unwrap();
        task.await.unwrap();

        assert!(start_called.load(Ordering::SeqCst));
        assert!(stop_called.load(Ordering::SeqCst));
        assert_eq!(event_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_runner_dropped_handles_end_the_run() {
        let strategy = MockStrategy::new("alpha");
        let stop_called = strategy.stop_called();

        let (mut runner, handle) = Runner::new(test_ctx());
        runner.add_strategy(Box::new(strategy));
        let task = tokio::spawn(runner.run());

        drop(handle);
        task.await.unwrap();

        assert!(stop_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_runner_start_failure_aborts_before_events() {
        let failing = MockStrategy::new("bad").with_start_failure();
        let healthy = MockStrategy::new("good");
        let healthy_started = healthy.start_called();
        let healthy_stopped = healthy.stop_called();
        let failing_stopped = failing.stop_called();

        let (mut runner, _handle) = Runner::new(test_ctx());
        runner.add_strategy(Box::new(healthy));
        runner.add_strategy(Box::new(failing));
        runner.run().await;

        assert!(healthy_started.load(Ordering::SeqCst));
        // The strategy started before the failure is still stopped; the
        // failing one never started so it is not.
        assert!(healthy_stopped.load(Ordering::SeqCst));
        assert!(!failing_stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_runner_panic_isolation() {
        let panicking = MockStrategy::new("panicky").with_panic();
        let healthy = MockStrategy::new("steady");
        let panicking_stopped = panicking.stop_called();
        let healthy_events = healthy.event_count();

        let (runner, handle) = Runner::new(test_ctx());
        let mut runner = runner.with_error_threshold(3);
        runner.add_strategy(Box::new(panicking));
        runner.add_strategy(Box::new(healthy));
        let task = tokio::spawn(runner.run());

        handle.send_event(test_event()).await.unwrap();
        handle.send_event(test_event()).await.unwrap();
        handle.stop().await.unwrap();
        task.await.unwrap();

        // The panicking strategy never blocks the healthy one and is
        // still stopped at the end.
        assert_eq!(healthy_events.load(Ordering::SeqCst), 2);
        assert!(panicking_stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_runner_error_threshold_disables_strategy() {
        let panicking = MockStrategy::new("panicky").with_panic();
        let events = panicking.event_count();

        let (mut runner, handle) = Runner::new(test_ctx());
        runner.add_strategy(Box::new(panicking));
        let runner = runner.with_error_threshold(2);
        let task = tokio::spawn(runner.run());

        for _ in 0..5 {
            handle.send_event(test_event()).await.unwrap();
        }
        handle.stop().await.unwrap();
        task.await.unwrap();

        // Every dispatch panicked before the counter bumped.
        assert_eq!(events.load(Ordering::SeqCst), 0);
    }
}
