//! In-process script strategies.
//!
//! A script strategy keeps its source resident for the whole session: the
//! loaded text (and, with the `python` feature, the interpreter module
//! built from it) must live as long as the event loop, not just the load
//! call, because callback dispatch borrows into it.

use crate::context::StrategyContext;
use crate::loader::LoadError;
use crate::r#trait::{Event, Strategy};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A strategy backed by an interpreted script.
///
/// Construction validates and reads the script; interpretation starts at
/// `on_start`. Without the `python` feature the session holds the source
/// but callback dispatch is inert - the strategy participates in the
/// runner lifecycle without executing script code.
pub struct ScriptStrategy {
    name: String,
    path: PathBuf,
    /// Script text, held for the lifetime of the session.
    #[allow(dead_code)]
    source: String,
    #[cfg(feature = "python")]
    module: Option<Py<PyModule>>,
}

impl ScriptStrategy {
    /// Opens the script at `path` for the given strategy context.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::ScriptUnreadable` when the script is missing
    /// or unreadable - script strategies have no further fallback.
    pub fn open(path: &Path, ctx: &StrategyContext) -> Result<Self, LoadError> {
        let source =
            std::fs::read_to_string(path).map_err(|e| LoadError::ScriptUnreadable {
                path: path.to_path_buf(),
                source: e,
            })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map_or_else(|| ctx.location.name.clone(), ToString::to_string);
        debug!(strategy = %ctx.location, path = %path.display(), "opened script strategy");
        Ok(Self {
            name,
            path: path.to_path_buf(),
            source,
            #[cfg(feature = "python")]
            module: None,
        })
    }

    /// Returns the script path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(feature = "python")]
    fn call_hook(&self, hook: &str, arg: Option<String>) -> Result<()> {
        let Some(module) = &self.module else {
            return Ok(());
        };
        Python::with_gil(|py| {
            let module = module.bind(py);
            if let Ok(func) = module.getattr(hook) {
                match arg {
                    Some(arg) => func.call1((arg,))?,
                    None => func.call0()?,
                };
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for ScriptStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptStrategy")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Strategy for ScriptStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    #[cfg(feature = "python")]
    fn on_start(&mut self, ctx: &StrategyContext) -> Result<()> {
        use std::ffi::CString;

        let source = CString::new(self.source.as_str())?;
        let filename = CString::new(self.path.display().to_string())?;
        let module_name = CString::new(self.name.as_str())?;
        let module = Python::with_gil(|py| -> PyResult<Py<PyModule>> {
            Ok(PyModule::from_code(py, &source, &filename, &module_name)?.unbind())
        })?;
        self.module = Some(module);
        self.call_hook("on_start", Some(ctx.location.uname()))
    }

    #[cfg(not(feature = "python"))]
    fn on_start(&mut self, ctx: &StrategyContext) -> Result<()> {
        debug!(
            strategy = %ctx.location,
            path = %self.path.display(),
            "script session started without interpreter dispatch (python feature disabled)"
        );
        Ok(())
    }

    fn on_event(&mut self, event: &Event, ctx: &StrategyContext) {
        trace!(strategy = %ctx.location, tag = %event.tag, "script event");
        #[cfg(feature = "python")]
        if let Err(e) = self.call_hook(
            "on_event",
            serde_json::to_string(event).ok(),
        ) {
            tracing::error!(strategy = %ctx.location, error = %e, "script on_event failed");
        }
    }

    #[cfg(feature = "python")]
    fn on_stop(&mut self, _ctx: &StrategyContext) -> Result<()> {
        let result = self.call_hook("on_stop", None);
        self.module = None;
        result
    }

    #[cfg(not(feature = "python"))]
    fn on_stop(&mut self, _ctx: &StrategyContext) -> Result<()> {
        Ok(())
    }
}
