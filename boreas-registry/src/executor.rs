//! Role dispatch.
//!
//! An [`Executor`] binds a resolved loader to the request context and runs
//! the role. Dispatch is keyed on the context's category: built-in system
//! roles run their own shells, market-data and trader roles build a
//! vendor from a broker extension, strategy roles resolve an entry source
//! and hand off to the runner's event loop. Every path blocks until the
//! role terminates.

use crate::broker::{self, BrokerError, BrokerVendor, LoadedBrokerExtension};
use crate::event_loop;
use crate::loader::{ExtensionLoader, Loader};
use crate::manifest::Manifest;
use crate::shutdown::ShutdownController;
use crate::system::{Master, SystemError, SystemService};
use boreas_core::{Category, RoleContext};
use boreas_strategy::{LoadError, Runner, StrategyContext, load_strategy};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors that terminate dispatch.
///
/// Each carries enough context to name the missing extension, category,
/// or group in the process's exit diagnostic.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Building or running a broker role failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Constructing a built-in system role failed.
    #[error(transparent)]
    System(#[from] SystemError),

    /// Loading the strategy failed.
    #[error(transparent)]
    Strategy(#[from] LoadError),

    /// The role needs an entry path and the context carries none.
    #[error("role '{role}' requires an entry path and none was given")]
    MissingPath {
        /// Role display name.
        role: String,
    },

    /// The loader cannot serve the requested category.
    #[error("loader '{loader}' cannot serve category '{category}'")]
    CategoryMismatch {
        /// Loader display name.
        loader: String,
        /// Requested category.
        category: Category,
    },
}

/// A dispatch request bound to its resolved loader.
///
/// Transient; constructed per request by [`Loader::resolve`] and consumed
/// by `run`.
pub struct Executor {
    loader: Loader,
    ctx: RoleContext,
}

impl Executor {
    pub(crate) fn new(loader: Loader, ctx: RoleContext) -> Self {
        Self { loader, ctx }
    }

    /// Runs the role until it terminates.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the hosting process; see [`DispatchError`].
    pub async fn run(self, shutdown: ShutdownController) -> Result<(), DispatchError> {
        match &self.loader {
            Loader::Master => {
                Master::new(&self.ctx).run(shutdown).await;
                Ok(())
            }
            Loader::Service => {
                SystemService::new(&self.ctx)?.run(shutdown).await;
                Ok(())
            }
            Loader::Extension(ext) => match self.ctx.category {
                Category::Md | Category::Td => self.run_broker(ext, shutdown).await,
                Category::Strategy => self.run_strategy(ext, shutdown).await,
                Category::System => Err(DispatchError::CategoryMismatch {
                    loader: self.loader.display_name().to_string(),
                    category: Category::System,
                }),
            },
        }
    }

    /// Builds and runs a market-data or trader vendor.
    ///
    /// The extension comes from the compile-time registry when one is
    /// registered for the group, else from the extension directory's
    /// native module. All failures are fatal.
    async fn run_broker(
        &self,
        ext: &ExtensionLoader,
        shutdown: ShutdownController,
    ) -> Result<(), DispatchError> {
        let location = self.ctx.location();
        let group = self.ctx.group.clone();
        let mut vendor = BrokerVendor::new(location, self.ctx.low_latency);

        // Keeps a native module mapped for the life of the vendor.
        let loaded;
        let extension = match broker::find_builtin(&group) {
            Some(builtin) => builtin,
            None => {
                let dir = ext.dir.as_deref().ok_or_else(|| BrokerError::NotFound {
                    group: group.clone(),
                })?;
                loaded = LoadedBrokerExtension::load(dir, &group)?;
                loaded.extension()
            }
        };

        let service = match self.ctx.category {
            Category::Md => extension.build_market_data(&vendor)?,
            Category::Td => extension.build_trader(&vendor)?,
            // `run` routes only broker categories here.
            Category::System | Category::Strategy => {
                return Err(DispatchError::CategoryMismatch {
                    loader: self.loader.display_name().to_string(),
                    category: self.ctx.category,
                });
            }
        };
        info!(
            vendor = %vendor.location(),
            service = service.name(),
            "broker service built"
        );
        vendor.set_service(service);
        vendor.run(shutdown).await?;
        Ok(())
    }

    /// Resolves and runs a strategy role.
    ///
    /// The entry key comes from the loader's manifest when it carries
    /// one, else from a manifest next to the entry path. Construction
    /// follows the native-to-script fallback chain, with the loader's
    /// extension directory searched ahead of the entry path's own; the
    /// constructed strategy is handed to the runner and the event loop
    /// blocks until shutdown.
    async fn run_strategy(
        &self,
        ext: &ExtensionLoader,
        shutdown: ShutdownController,
    ) -> Result<(), DispatchError> {
        let path = self
            .ctx
            .path
            .clone()
            .ok_or_else(|| DispatchError::MissingPath {
                role: self.ctx.location().uname(),
            })?;
        let key = strategy_key(ext, &path);

        let strategy_ctx = StrategyContext::new(self.ctx.location(), self.ctx.low_latency);
        let strategy = load_strategy(&strategy_ctx, &path, key.as_deref(), ext.dir.as_deref())?;
        info!(
            role = %strategy_ctx.location,
            strategy = strategy.name(),
            "strategy loaded"
        );

        let (mut runner, handle) = Runner::new(strategy_ctx);
        runner.add_strategy(strategy);
        event_loop::run_forever(runner, handle, shutdown).await;
        Ok(())
    }
}

/// Determines the entry key for a strategy request.
///
/// Prefers the loader's manifest; a loader without one (the bare default
/// strategy loader) looks for a manifest in the entry path's directory.
fn strategy_key(ext: &ExtensionLoader, path: &Path) -> Option<String> {
    if let Some(manifest) = &ext.manifest {
        return Some(manifest.key.clone());
    }
    let dir = path.parent()?;
    Manifest::read(dir).ok().map(|m| m.key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerExtension, BrokerRegistration, BrokerService};
    use crate::manifest::MANIFEST_FILE;
    use crate::registry::ExecutorRegistry;
    use boreas_core::{Mode, RuntimeDir};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    struct IdleService;

    impl BrokerService for IdleService {
        fn name(&self) -> &str {
            "idle"
        }

        fn poll(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct TraderOnlyExtension;

    impl BrokerExtension for TraderOnlyExtension {
        fn group(&self) -> &str {
            "tdonly"
        }

        fn build_trader(
            &self,
            _vendor: &BrokerVendor,
        ) -> Result<Box<dyn BrokerService>, BrokerError> {
            Ok(Box::new(IdleService))
        }
    }

    inventory::submit!(BrokerRegistration(&TraderOnlyExtension));

    fn ctx(category: Category, group: &str, name: &str) -> RoleContext {
        RoleContext::new(
            Mode::Backtest,
            category,
            group,
            name,
            Arc::new(RuntimeDir::new("/tmp/boreas-test")),
        )
    }

    fn write_script(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        writeln!(std::fs::File::create(&path).unwrap(), "# strategy").unwrap();
        path
    }

    #[tokio::test]
    async fn test_master_dispatch_blocks_until_shutdown() {
        let registry = ExecutorRegistry::new();
        let ctx = ctx(Category::System, "master", "master");
        let executor = registry
            .resolve(Category::System, "master")
            .unwrap()
            .resolve(&ctx);

        let shutdown = ShutdownController::new();
        let task = tokio::spawn(executor.run(shutdown.clone()));

        shutdown.initiate();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_service_dispatch_fails() {
        let registry = ExecutorRegistry::new();
        let ctx = ctx(Category::System, "service", "archiver");
        let executor = registry
            .resolve(Category::System, "service")
            .unwrap()
            .resolve(&ctx);

        let err = executor.run(ShutdownController::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::System(_)));
    }

    #[tokio::test]
    async fn test_default_strategy_dispatch_runs_script() {
        // Scenario: category=strategy, group=default, a direct script
        // path and no extension path.
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "alpha.py");

        let mut registry = ExecutorRegistry::new();
        let ctx = ctx(Category::Strategy, "default", "alpha").with_path(&script);
        registry.load_extensions(&ctx).unwrap();

        let executor = registry
            .resolve(Category::Strategy, "default")
            .unwrap()
            .resolve(&ctx);

        let shutdown = ShutdownController::new();
        let task = tokio::spawn(executor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.initiate();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_strategy_dispatch_without_path_fails() {
        let registry = ExecutorRegistry::new();
        let ctx = ctx(Category::Strategy, "default", "alpha");
        let executor = registry
            .resolve(Category::Strategy, "default")
            .unwrap()
            .resolve(&ctx);

        let err = executor.run(ShutdownController::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingPath { .. }));
    }

    #[tokio::test]
    async fn test_broker_dispatch_without_module_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let ext_dir = root.path().join("foo");
        std::fs::create_dir_all(&ext_dir).unwrap();
        std::fs::write(
            ext_dir.join(MANIFEST_FILE),
            r#"{"boreas":{"name":"foo","key":"fooimpl","config":{"md":"fooimpl"}}}"#,
        )
        .unwrap();

        let mut registry = ExecutorRegistry::new();
        let ctx = ctx(Category::Md, "fooimpl", "feed1")
            .with_extension_path(root.path().to_str().unwrap());
        registry.load_extensions(&ctx).unwrap();

        let executor = registry
            .resolve(Category::Md, "fooimpl")
            .unwrap()
            .resolve(&ctx);
        let err = executor.run(ShutdownController::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Broker(_)));
    }

    #[tokio::test]
    async fn test_td_dispatch_builds_trader_service() {
        let root = tempfile::tempdir().unwrap();
        let ext_dir = root.path().join("tdonly");
        std::fs::create_dir_all(&ext_dir).unwrap();
        std::fs::write(
            ext_dir.join(MANIFEST_FILE),
            r#"{"boreas":{"name":"tdonly","key":"tdonly","config":{"td":"tdonly"}}}"#,
        )
        .unwrap();

        let mut registry = ExecutorRegistry::new();
        let ctx = ctx(Category::Td, "tdonly", "acct1")
            .with_extension_path(root.path().to_str().unwrap());
        registry.load_extensions(&ctx).unwrap();

        let executor = registry
            .resolve(Category::Td, "tdonly")
            .unwrap()
            .resolve(&ctx);
        let shutdown = ShutdownController::new();
        let task = tokio::spawn(executor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.initiate();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_md_dispatch_never_reaches_trader_builder() {
        // The extension only ships a trader; a market-data request must
        // surface the missing capability instead of running the trader.
        let root = tempfile::tempdir().unwrap();
        let ext_dir = root.path().join("tdonly");
        std::fs::create_dir_all(&ext_dir).unwrap();
        std::fs::write(
            ext_dir.join(MANIFEST_FILE),
            r#"{"boreas":{"name":"tdonly","key":"tdonly","config":{"md":"tdonly"}}}"#,
        )
        .unwrap();

        let mut registry = ExecutorRegistry::new();
        let ctx = ctx(Category::Md, "tdonly", "feed1")
            .with_extension_path(root.path().to_str().unwrap());
        registry.load_extensions(&ctx).unwrap();

        let executor = registry
            .resolve(Category::Md, "tdonly")
            .unwrap()
            .resolve(&ctx);
        let err = executor.run(ShutdownController::new()).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Broker(BrokerError::Unsupported {
                category: Category::Md,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_strategy_dispatch_uses_extension_dir_script() {
        // The keyed script ships inside the extension directory; the
        // entry path itself names a native module that does not exist.
        let root = tempfile::tempdir().unwrap();
        let ext_dir = root.path().join("mine");
        std::fs::create_dir_all(&ext_dir).unwrap();
        std::fs::write(
            ext_dir.join(MANIFEST_FILE),
            r#"{"boreas":{"name":"mine","key":"ref_impl"}}"#,
        )
        .unwrap();
        write_script(&ext_dir, "ref_impl");

        let request_dir = tempfile::tempdir().unwrap();
        let mut registry = ExecutorRegistry::new();
        let ctx = ctx(Category::Strategy, "ref_impl", "alpha")
            .with_path(request_dir.path().join("strat.so"))
            .with_extension_path(root.path().to_str().unwrap());
        registry.load_extensions(&ctx).unwrap();

        let executor = registry
            .resolve(Category::Strategy, "ref_impl")
            .unwrap()
            .resolve(&ctx);
        let shutdown = ShutdownController::new();
        let task = tokio::spawn(executor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.initiate();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_strategy_key_prefers_loader_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"boreas":{"name":"near","key":"near_key"}}"#,
        )
        .unwrap();

        let with_manifest = ExtensionLoader {
            dir: Some(dir.path().to_path_buf()),
            manifest: Some(Manifest {
                name: "mine".to_string(),
                key: "loader_key".to_string(),
                config: None,
            }),
        };
        let bare = ExtensionLoader::default();
        let path = dir.path().join("bundle");

        assert_eq!(
            strategy_key(&with_manifest, &path).as_deref(),
            Some("loader_key")
        );
        assert_eq!(strategy_key(&bare, &path).as_deref(), Some("near_key"));
    }
}
