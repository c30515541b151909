//! Built-in system roles: the master and the named system services.
//!
//! These are thin run-loop shells; the journal and coordination internals
//! behind them are collaborators outside the dispatch layer. Each role
//! rebuilds its own `Location` from the host context before running, so a
//! sub-role never inherits the tuple the process was launched under.

use crate::shutdown::ShutdownController;
use boreas_core::{Category, Location, RoleContext};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, trace};

/// Built-in service names resolvable under (system, service).
pub const BUILTIN_SERVICES: &[&str] = &["cached", "ledger"];

/// Heartbeat cadence of the built-in run loops.
const HEARTBEAT: Duration = Duration::from_secs(1);

/// Errors raised when constructing a built-in system role.
#[derive(Debug, Error)]
pub enum SystemError {
    /// The requested name matches no built-in service.
    #[error("unknown system service '{name}' (expected one of: cached, ledger)")]
    UnknownService {
        /// Requested service name.
        name: String,
    },
}

/// The system master role.
///
/// Coordinates process registration and journal allocation for the whole
/// runtime; this shell owns its identity and run loop only.
#[derive(Debug)]
pub struct Master {
    location: Location,
    low_latency: bool,
}

impl Master {
    /// Creates the master for the host context.
    ///
    /// The master always runs as (system, master, master) in the
    /// context's mode, regardless of the tuple the process was launched
    /// under.
    #[must_use]
    pub fn new(ctx: &RoleContext) -> Self {
        let location = Location::new(
            ctx.mode,
            Category::System,
            "master",
            "master",
            Arc::clone(&ctx.locator),
        );
        Self {
            location,
            low_latency: ctx.low_latency,
        }
    }

    /// The master's own location.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Runs the master until shutdown.
    pub async fn run(self, shutdown: ShutdownController) {
        info!(role = %self.location, low_latency = self.low_latency, "master running");
        run_heartbeat_loop(&self.location, self.low_latency, &shutdown).await;
        info!(role = %self.location, "master stopped");
        shutdown.mark_complete();
    }
}

/// A named built-in system service (cached or ledger).
#[derive(Debug)]
pub struct SystemService {
    location: Location,
    low_latency: bool,
}

impl SystemService {
    /// Creates the service named by `ctx.name`.
    ///
    /// The service runs as (system, service, name) in the context's mode.
    ///
    /// # Errors
    ///
    /// Returns `SystemError::UnknownService` when the name is not a
    /// member of the built-in service set.
    pub fn new(ctx: &RoleContext) -> Result<Self, SystemError> {
        if !BUILTIN_SERVICES.contains(&ctx.name.as_str()) {
            return Err(SystemError::UnknownService {
                name: ctx.name.clone(),
            });
        }
        let location = Location::new(
            ctx.mode,
            Category::System,
            "service",
            ctx.name.clone(),
            Arc::clone(&ctx.locator),
        );
        Ok(Self {
            location,
            low_latency: ctx.low_latency,
        })
    }

    /// The service's own location.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Runs the service until shutdown.
    pub async fn run(self, shutdown: ShutdownController) {
        info!(role = %self.location, low_latency = self.low_latency, "system service running");
        run_heartbeat_loop(&self.location, self.low_latency, &shutdown).await;
        info!(role = %self.location, "system service stopped");
        shutdown.mark_complete();
    }
}

async fn run_heartbeat_loop(
    location: &Location,
    low_latency: bool,
    shutdown: &ShutdownController,
) {
    while !shutdown.is_initiated() {
        trace!(role = %location, "heartbeat");
        if low_latency {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                () = shutdown.wait() => {}
                () = tokio::time::sleep(HEARTBEAT) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boreas_core::{Mode, RuntimeDir};

    fn ctx(category: Category, group: &str, name: &str) -> RoleContext {
        RoleContext::new(
            Mode::Live,
            category,
            group,
            name,
            Arc::new(RuntimeDir::new("/tmp/boreas-test")),
        )
    }

    #[test]
    fn test_master_rebuilds_its_location() {
        // Launch tuple differs from the master's own identity.
        let master = Master::new(&ctx(Category::System, "master", "node7"));
        assert_eq!(master.location().uname(), "system/master/master/live");
    }

    #[test]
    fn test_service_location_uses_name() {
        let service = SystemService::new(&ctx(Category::System, "service", "cached")).unwrap();
        assert_eq!(service.location().uname(), "system/service/cached/live");
    }

    #[test]
    fn test_unknown_service_is_rejected() {
        let err = SystemService::new(&ctx(Category::System, "service", "archiver")).unwrap_err();
        assert!(matches!(err, SystemError::UnknownService { .. }));
        assert!(err.to_string().contains("archiver"));
    }

    #[tokio::test]
    async fn test_master_stops_on_shutdown() {
        let master = Master::new(&ctx(Category::System, "master", "master"));
        let shutdown = ShutdownController::new();
        let task = tokio::spawn(master.run(shutdown.clone()));

        shutdown.initiate();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown.wait_for_completion(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_service_stops_on_shutdown() {
        let service = SystemService::new(&ctx(Category::System, "service", "ledger")).unwrap();
        let shutdown = ShutdownController::new();
        let task = tokio::spawn(service.run(shutdown.clone()));

        shutdown.initiate();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
