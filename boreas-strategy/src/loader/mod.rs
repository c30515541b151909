//! Strategy entry resolution and loading.
//!
//! A strategy request is a filesystem path plus an optional entry key. The
//! request resolves to one of two entry sources:
//! - a **script** run in-process by the embedded interpreter session
//! - a **native** shared library exporting a strategy factory
//!
//! Resolution follows a fixed priority order (see [`EntrySource::resolve`]),
//! and native loading degrades to the keyed fallback script (next to the
//! request path, else in the extension directory) on any failure. The degradation is deliberate: a native build is an
//! optimization of the reference script implementation, and a broken
//! optimization must never keep the reference from running.

mod native;
mod script;

pub use native::{NativeLoadError, NativeStrategy, STRATEGY_ENTRY_SYMBOL};
pub use script::ScriptStrategy;

use crate::context::StrategyContext;
use crate::r#trait::Strategy;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors surfaced by strategy loading.
///
/// Native load failures are not represented here: they are recovered by
/// the fallback chain and logged, never propagated.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A non-script path was requested without an entry key.
    #[error("strategy path '{path}' is not a script and no entry key was given")]
    MissingKey {
        /// The request path.
        path: PathBuf,
    },

    /// The resolved script could not be opened.
    #[error("failed to open strategy script '{path}': {source}")]
    ScriptUnreadable {
        /// The resolved script path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Resolved strategy entry source.
///
/// Resolution is pure: it looks only at the path shape and the key, never
/// at the filesystem, so the same request always resolves the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Construct the in-process script strategy at this path.
    Script(PathBuf),
    /// Load the native module named by `key`, falling back to the keyed
    /// script on failure.
    Native {
        /// The request path (a shared library artifact).
        path: PathBuf,
        /// Entry key naming the native module and the fallback script.
        key: String,
    },
}

impl EntrySource {
    /// Resolves a request path and optional entry key.
    ///
    /// Priority order:
    /// 1. script paths construct directly;
    /// 2. shared-library paths with a key attempt the native module;
    /// 3. a path already ending with the key constructs directly;
    /// 4. any other keyed path is rewritten to `dirname(path)/key`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::MissingKey` when a non-script path has no key
    /// to resolve against.
    pub fn resolve(path: &Path, key: Option<&str>) -> Result<Self, LoadError> {
        if is_script(path) {
            return Ok(Self::Script(path.to_path_buf()));
        }
        let Some(key) = key else {
            return Err(LoadError::MissingKey {
                path: path.to_path_buf(),
            });
        };
        if is_native(path) {
            return Ok(Self::Native {
                path: path.to_path_buf(),
                key: key.to_string(),
            });
        }
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n == key)
        {
            return Ok(Self::Script(path.to_path_buf()));
        }
        Ok(Self::Script(sibling(path, key)))
    }
}

/// Returns true for paths the embedded interpreter runs directly.
fn is_script(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "py")
}

/// Returns true for native shared-library artifacts.
fn is_native(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "so" | "dylib" | "dll"))
}

/// Returns `dirname(path)/key`.
fn sibling(path: &Path, key: &str) -> PathBuf {
    path.parent().unwrap_or_else(|| Path::new("")).join(key)
}

/// Loads a strategy for the given request.
///
/// Applies [`EntrySource::resolve`] and constructs the resolved strategy.
/// `ext_dir` is the extension directory the request's manifest came from;
/// it is searched before the request path's own directory, both for
/// native module artifacts and for the fallback script. Native failures
/// (missing module, missing symbol, factory panic surface) are logged at
/// informational level and recovered by constructing the fallback script
/// instead.
///
/// # Errors
///
/// Returns an error only when resolution itself fails or the final script
/// cannot be opened; native-load failures never propagate.
pub fn load_strategy(
    ctx: &StrategyContext,
    path: &Path,
    key: Option<&str>,
    ext_dir: Option<&Path>,
) -> Result<Box<dyn Strategy>, LoadError> {
    match EntrySource::resolve(path, key)? {
        EntrySource::Script(script) => {
            let strategy = ScriptStrategy::open(&script, ctx)?;
            Ok(Box::new(strategy))
        }
        EntrySource::Native { path, key } => match NativeStrategy::load(&path, &key, ext_dir) {
            Ok(strategy) => Ok(Box::new(strategy)),
            Err(e) => {
                info!(
                    strategy = %ctx.location,
                    key = %key,
                    "falling back to script loader: {e}"
                );
                let script = fallback_script(&path, &key, ext_dir);
                let strategy = ScriptStrategy::open(&script, ctx)?;
                Ok(Box::new(strategy))
            }
        },
    }
}

/// Picks the script a failed native load degrades to.
///
/// The sibling `dirname(path)/key` wins when it exists; otherwise the
/// extension directory's `key` script is used when present. A request
/// with neither resolves to the sibling so the error names it.
fn fallback_script(path: &Path, key: &str, ext_dir: Option<&Path>) -> PathBuf {
    let sib = sibling(path, key);
    if sib.is_file() {
        return sib;
    }
    match ext_dir.map(|dir| dir.join(key)) {
        Some(candidate) if candidate.is_file() => candidate,
        _ => sib,
    }
}
