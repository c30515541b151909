//! Broker extension interface and vendor objects.
//!
//! A broker extension supplies the service behind a market-data or trader
//! role. Which capability an extension implements is part of its
//! compile-time interface: [`BrokerExtension`] has one builder per
//! category and the default builders report the capability as
//! unsupported. Extensions are found in the compile-time registry first,
//! then in the extension directory's native module.

use crate::shutdown::ShutdownController;
use boreas_core::{Category, Location};
use libloading::Library;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Factory symbol every native broker module exports.
pub const BROKER_ENTRY_SYMBOL: &[u8] = b"boreas_broker_entry";

/// Signature of the exported broker factory.
pub type BrokerEntryFn = unsafe fn() -> Box<dyn BrokerExtension>;

/// Idle delay between service polls when not in low-latency mode.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Errors raised while building or running a broker role.
///
/// All of these are fatal for the hosting process; a vendor role has no
/// fallback implementation.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No extension provides the requested group.
    #[error("no broker extension provides group '{group}'")]
    NotFound {
        /// Requested vendor group.
        group: String,
    },

    /// The extension does not implement the requested capability.
    #[error("broker extension '{group}' does not implement '{category}'")]
    Unsupported {
        /// Vendor group.
        group: String,
        /// Requested capability.
        category: Category,
    },

    /// The extension's native module could not be opened.
    #[error("failed to open broker module '{path}': {source}")]
    Open {
        /// Module path.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },

    /// The native module does not export the broker factory.
    #[error("broker module '{path}' does not export the broker factory: {source}")]
    MissingSymbol {
        /// Module path.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },

    /// The service failed while running.
    #[error("broker service '{location}' failed: {source}")]
    Service {
        /// The vendor's location.
        location: String,
        /// Underlying service error.
        #[source]
        source: anyhow::Error,
    },

    /// The vendor was run before a service was attached.
    #[error("broker vendor '{location}' has no service attached")]
    NoService {
        /// The vendor's location.
        location: String,
    },
}

/// The service object driven by a vendor's run loop.
///
/// `poll` performs one bounded step of work; the vendor calls it
/// repeatedly until shutdown. Internals (matching, transport) are the
/// extension's concern.
pub trait BrokerService: Send {
    /// Service display name.
    fn name(&self) -> &str;

    /// Performs one step of work.
    ///
    /// # Errors
    ///
    /// An error terminates the vendor; broker roles do not degrade.
    fn poll(&mut self) -> anyhow::Result<()>;
}

/// Compile-time interface implemented by every broker extension.
///
/// Implementations override the builders for the capabilities they ship;
/// the defaults answer `Unsupported` so a market-data-only extension
/// needs no trader stub. Extensions are held across await points by the
/// dispatching task, hence the `Send` bound.
pub trait BrokerExtension: Send + Sync {
    /// Vendor group this extension provides.
    fn group(&self) -> &str;

    /// Builds the market-data service for the given vendor.
    ///
    /// # Errors
    ///
    /// The default reports the capability as unsupported.
    fn build_market_data(
        &self,
        vendor: &BrokerVendor,
    ) -> Result<Box<dyn BrokerService>, BrokerError> {
        Err(BrokerError::Unsupported {
            group: vendor.location().group.clone(),
            category: Category::Md,
        })
    }

    /// Builds the trader service for the given vendor.
    ///
    /// # Errors
    ///
    /// The default reports the capability as unsupported.
    fn build_trader(&self, vendor: &BrokerVendor) -> Result<Box<dyn BrokerService>, BrokerError> {
        Err(BrokerError::Unsupported {
            group: vendor.location().group.clone(),
            category: Category::Td,
        })
    }
}

/// Registration record for compile-time built-in broker extensions.
pub struct BrokerRegistration(pub &'static dyn BrokerExtension);

inventory::collect!(BrokerRegistration);

/// Looks up a built-in broker extension by group.
#[must_use]
pub fn find_builtin(group: &str) -> Option<&'static dyn BrokerExtension> {
    inventory::iter::<BrokerRegistration>
        .into_iter()
        .find(|reg| reg.0.group() == group)
        .map(|reg| reg.0)
}

/// A broker extension loaded from a native module.
///
/// Field order keeps the extension alive no longer than its library.
pub struct LoadedBrokerExtension {
    inner: Box<dyn BrokerExtension>,
    _lib: Library,
}

impl LoadedBrokerExtension {
    /// Loads `lib<group>.<ext>` (or `<group>.<ext>`) from the extension
    /// directory.
    ///
    /// # Errors
    ///
    /// Fails when no module artifact exists, the module cannot be opened,
    /// or it does not export the broker factory.
    pub fn load(dir: &Path, group: &str) -> Result<Self, BrokerError> {
        let candidate = module_candidates(dir, group)
            .into_iter()
            .find(|c| c.is_file())
            .ok_or_else(|| BrokerError::NotFound {
                group: group.to_string(),
            })?;

        // SAFETY: the module is trusted platform extension code selected
        // by configuration; loading runs its initializers.
        let lib = unsafe { Library::new(&candidate) }.map_err(|e| BrokerError::Open {
            path: candidate.clone(),
            source: e,
        })?;
        let inner = unsafe {
            let entry: libloading::Symbol<'_, BrokerEntryFn> =
                lib.get(BROKER_ENTRY_SYMBOL)
                    .map_err(|e| BrokerError::MissingSymbol {
                        path: candidate.clone(),
                        source: e,
                    })?;
            entry()
        };
        debug!(module = %candidate.display(), group, "loaded native broker module");
        Ok(Self { inner, _lib: lib })
    }

    /// Returns the loaded extension interface.
    #[must_use]
    pub fn extension(&self) -> &dyn BrokerExtension {
        self.inner.as_ref()
    }
}

impl std::fmt::Debug for LoadedBrokerExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedBrokerExtension")
            .field("group", &self.inner.group())
            .finish_non_exhaustive()
    }
}

const DLL_EXT: &str = if cfg!(target_os = "macos") {
    "dylib"
} else if cfg!(windows) {
    "dll"
} else {
    "so"
};

fn module_candidates(dir: &Path, group: &str) -> Vec<PathBuf> {
    vec![
        dir.join(format!("lib{group}.{DLL_EXT}")),
        dir.join(format!("{group}.{DLL_EXT}")),
    ]
}

/// The native runtime object for one market-data or trader role.
///
/// Owns the role's location and, once attached, the service the extension
/// built for it. `run` blocks the caller until shutdown.
pub struct BrokerVendor {
    location: Location,
    low_latency: bool,
    service: Option<Box<dyn BrokerService>>,
}

impl BrokerVendor {
    /// Creates a vendor for the given location.
    #[must_use]
    pub fn new(location: Location, low_latency: bool) -> Self {
        Self {
            location,
            low_latency,
            service: None,
        }
    }

    /// The vendor's location.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Whether the vendor busy-polls its service.
    #[must_use]
    pub fn low_latency(&self) -> bool {
        self.low_latency
    }

    /// Attaches the service built by the extension.
    pub fn set_service(&mut self, service: Box<dyn BrokerService>) {
        self.service = Some(service);
    }

    /// Runs the vendor until shutdown.
    ///
    /// Polls the attached service in a loop; in low-latency mode the loop
    /// spins with cooperative yields, otherwise it sleeps between polls.
    ///
    /// # Errors
    ///
    /// Fails when no service is attached or the service's poll fails;
    /// both terminate the role.
    pub async fn run(mut self, shutdown: ShutdownController) -> Result<(), BrokerError> {
        let location = self.location.uname();
        let mut service = self
            .service
            .take()
            .ok_or_else(|| BrokerError::NoService {
                location: location.clone(),
            })?;
        info!(
            vendor = %location,
            service = service.name(),
            low_latency = self.low_latency,
            "broker vendor running"
        );

        while !shutdown.is_initiated() {
            service.poll().map_err(|e| BrokerError::Service {
                location: location.clone(),
                source: e,
            })?;
            if self.low_latency {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        info!(vendor = %location, "broker vendor stopped");
        shutdown.mark_complete();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boreas_core::{Mode, RuntimeDir};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingService {
        polls: Arc<AtomicU32>,
        fail_at: Option<u32>,
    }

    impl BrokerService for CountingService {
        fn name(&self) -> &str {
            "counting"
        }

        fn poll(&mut self) -> anyhow::Result<()> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_at == Some(n) {
                anyhow::bail!("poll {n} failed");
            }
            Ok(())
        }
    }

    struct MdOnlyExtension;

    impl BrokerExtension for MdOnlyExtension {
        fn group(&self) -> &str {
            "sim"
        }

        fn build_market_data(
            &self,
            _vendor: &BrokerVendor,
        ) -> Result<Box<dyn BrokerService>, BrokerError> {
            Ok(Box::new(CountingService {
                polls: Arc::new(AtomicU32::new(0)),
                fail_at: None,
            }))
        }
    }

    fn test_location(category: Category) -> Location {
        Location::new(
            Mode::Live,
            category,
            "sim",
            "feed1",
            Arc::new(RuntimeDir::new("/tmp/boreas-test")),
        )
    }

    #[test]
    fn test_default_builders_are_unsupported() {
        let ext = MdOnlyExtension;
        let vendor = BrokerVendor::new(test_location(Category::Td), false);
        let err = ext.build_trader(&vendor).err().unwrap();
        assert!(matches!(err, BrokerError::Unsupported { .. }));
        assert!(err.to_string().contains("td"));
    }

    #[test]
    fn test_native_module_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoadedBrokerExtension::load(dir.path(), "ghost").unwrap_err();
        assert!(matches!(err, BrokerError::NotFound { .. }));
    }

    #[test]
    fn test_native_module_invalid_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("libsim.{DLL_EXT}")), b"junk").unwrap();
        let err = LoadedBrokerExtension::load(dir.path(), "sim").unwrap_err();
        assert!(matches!(err, BrokerError::Open { .. }));
    }

    #[tokio::test]
    async fn test_vendor_without_service_fails() {
        let vendor = BrokerVendor::new(test_location(Category::Md), false);
        let err = vendor.run(ShutdownController::new()).await.unwrap_err();
        assert!(matches!(err, BrokerError::NoService { .. }));
    }

    #[tokio::test]
    async fn test_vendor_polls_until_shutdown() {
        let polls = Arc::new(AtomicU32::new(0));
        let mut vendor = BrokerVendor::new(test_location(Category::Md), false);
        vendor.set_service(Box::new(CountingService {
            polls: Arc::clone(&polls),
            fail_at: None,
        }));

        let shutdown = ShutdownController::new();
        let task = tokio::spawn(vendor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.initiate();
        task.await.unwrap().unwrap();

        assert!(polls.load(Ordering::SeqCst) > 0);
        assert!(shutdown.wait_for_completion(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_service_failure_terminates_vendor() {
        let mut vendor = BrokerVendor::new(test_location(Category::Md), false);
        vendor.set_service(Box::new(CountingService {
            polls: Arc::new(AtomicU32::new(0)),
            fail_at: Some(3),
        }));

        let err = vendor.run(ShutdownController::new()).await.unwrap_err();
        assert!(matches!(err, BrokerError::Service { .. }));
    }
}
