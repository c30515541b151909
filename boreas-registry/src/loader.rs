//! Loader variants bound into the executor registry.

use crate::executor::Executor;
use crate::manifest::Manifest;
use boreas_core::RoleContext;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::path::PathBuf;

/// Loader for an externally supplied extension.
///
/// `dir` is absent for the default in-process strategy loader; `manifest`
/// is absent when the caller supplies the entry key directly instead of
/// shipping a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionLoader {
    /// Extension directory on disk.
    pub dir: Option<PathBuf>,
    /// Parsed manifest, when the extension ships one.
    pub manifest: Option<Manifest>,
}

impl ExtensionLoader {
    /// Creates a loader for a discovered extension directory.
    #[must_use]
    pub fn discovered(dir: PathBuf, manifest: Manifest) -> Self {
        Self {
            dir: Some(dir),
            manifest: Some(manifest),
        }
    }

    /// Returns the entry key declared by the manifest, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.manifest.as_ref().map(|m| m.key.as_str())
    }
}

/// A resolved binding from (category, group) to the means of running that
/// role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loader {
    /// Built-in system master.
    Master,
    /// Built-in system services (cached, ledger).
    Service,
    /// Externally supplied extension.
    Extension(ExtensionLoader),
}

impl Loader {
    /// The default in-process strategy loader.
    #[must_use]
    pub fn default_strategy() -> Self {
        Self::Extension(ExtensionLoader::default())
    }

    /// Stable display name used when serializing the registry.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Master => "master",
            Self::Service => "service",
            Self::Extension(ext) => ext
                .manifest
                .as_ref()
                .map_or("default", |m| m.name.as_str()),
        }
    }

    /// Binds this loader to a request context, producing the executor
    /// that runs the role.
    #[must_use]
    pub fn resolve(&self, ctx: &RoleContext) -> Executor {
        Executor::new(self.clone(), ctx.clone())
    }
}

impl Serialize for Loader {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Master | Self::Service => serializer.serialize_str(self.display_name()),
            Self::Extension(ext) => match &ext.manifest {
                None => serializer.serialize_str(self.display_name()),
                Some(manifest) => {
                    let mut state = serializer.serialize_struct("ExtensionLoader", 2)?;
                    state.serialize_field(
                        "dir",
                        &ext.dir.as_ref().map(|d| d.display().to_string()),
                    )?;
                    state.serialize_field("manifest", manifest)?;
                    state.end()
                }
            },
        }
    }
}
