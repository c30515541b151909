//! Native strategy modules.
//!
//! A native strategy is a shared library exporting the
//! [`STRATEGY_ENTRY_SYMBOL`] factory. The loaded library must stay mapped
//! for as long as the constructed strategy lives; `NativeStrategy` ties the
//! two lifetimes together.

use crate::context::StrategyContext;
use crate::r#trait::{Event, Strategy};
use anyhow::Result;
use libloading::Library;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Factory symbol every native strategy module exports.
pub const STRATEGY_ENTRY_SYMBOL: &[u8] = b"boreas_strategy_entry";

/// Signature of the exported factory.
///
/// Loader and module are built by the same toolchain, so the factory uses
/// the default Rust ABI and hands ownership across with a plain `Box`.
pub type StrategyEntryFn = unsafe fn() -> Box<dyn Strategy>;

/// Errors raised while attempting a native load.
///
/// These never escape the fallback chain; they exist so the fallback
/// diagnostic can say precisely what went wrong.
#[derive(Debug, Error)]
pub enum NativeLoadError {
    /// No module artifact named by the key exists next to the request
    /// path.
    #[error("no native module for key '{key}' under '{dir}'")]
    NotFound {
        /// Entry key that was searched for.
        key: String,
        /// Directory that was searched.
        dir: String,
    },

    /// The shared library could not be opened.
    #[error("failed to open native module '{path}': {source}")]
    Open {
        /// Library path.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },

    /// The library does not export the strategy factory.
    #[error("native module '{path}' does not export the strategy factory: {source}")]
    MissingSymbol {
        /// Library path.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },
}

/// A strategy constructed from a native shared library.
///
/// Field order matters: the inner strategy must drop before the library
/// unmaps.
pub struct NativeStrategy {
    inner: Box<dyn Strategy>,
    _lib: Library,
}

impl NativeStrategy {
    /// Loads the native module named by `key` for the request at `path`.
    ///
    /// The extension directory, when given, is searched before the
    /// request path's own directory. Candidate artifacts, in order:
    /// `lib<key>.<ext>` then `<key>.<ext>` under each searched
    /// directory, then the request path itself.
    ///
    /// # Errors
    ///
    /// Returns a `NativeLoadError` describing the first unrecoverable
    /// step; callers recover via the script fallback.
    pub fn load(path: &Path, key: &str, ext_dir: Option<&Path>) -> Result<Self, NativeLoadError> {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let candidate = candidates(ext_dir, dir, key, path)
            .into_iter()
            .find(|c| c.is_file())
            .ok_or_else(|| NativeLoadError::NotFound {
                key: key.to_string(),
                dir: dir.display().to_string(),
            })?;

        // SAFETY: loading a module runs its initializers; the module is
        // trusted platform extension code selected by configuration.
        let lib = unsafe { Library::new(&candidate) }.map_err(|e| NativeLoadError::Open {
            path: candidate.clone(),
            source: e,
        })?;
        let inner = unsafe {
            let entry: libloading::Symbol<'_, StrategyEntryFn> = lib
                .get(STRATEGY_ENTRY_SYMBOL)
                .map_err(|e| NativeLoadError::MissingSymbol {
                    path: candidate.clone(),
                    source: e,
                })?;
            entry()
        };
        debug!(module = %candidate.display(), key, "loaded native strategy module");
        Ok(Self { inner, _lib: lib })
    }
}

/// Platform shared-library suffix.
const DLL_EXT: &str = if cfg!(target_os = "macos") {
    "dylib"
} else if cfg!(windows) {
    "dll"
} else {
    "so"
};

fn candidates(ext_dir: Option<&Path>, dir: &Path, key: &str, request: &Path) -> Vec<PathBuf> {
    let mut list = Vec::with_capacity(5);
    for searched in ext_dir.into_iter().chain(std::iter::once(dir)) {
        list.push(searched.join(format!("lib{key}.{DLL_EXT}")));
        list.push(searched.join(format!("{key}.{DLL_EXT}")));
    }
    list.push(request.to_path_buf());
    list
}

impl std::fmt::Debug for NativeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeStrategy")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}

impl Strategy for NativeStrategy {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn on_start(&mut self, ctx: &StrategyContext) -> Result<()> {
        self.inner.on_start(ctx)
    }

    fn on_event(&mut self, event: &Event, ctx: &StrategyContext) {
        self.inner.on_event(event, ctx);
    }

    fn on_stop(&mut self, ctx: &StrategyContext) -> Result<()> {
        self.inner.on_stop(ctx)
    }
}
