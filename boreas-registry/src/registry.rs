//! The executor registry.
//!
//! Owns the loader set mapping (category, group) to a [`Loader`]. The set
//! is seeded with the built-in system roles and the default in-process
//! strategy loader, then populated once at startup by extension discovery.
//! After discovery the registry is read-only; callers must not run
//! `load_extensions` twice concurrently on the same instance.

use crate::loader::{ExtensionLoader, Loader};
use crate::manifest::{self, Manifest};
use boreas_core::{Category, RoleContext};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Built-in group name of the system master.
pub const MASTER_GROUP: &str = "master";

/// Built-in group name of the system services.
pub const SERVICE_GROUP: &str = "service";

/// Group name of the default in-process strategy loader.
pub const DEFAULT_STRATEGY_GROUP: &str = "default";

/// Errors raised by registry population and resolution.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No loader is registered for the requested pair.
    #[error("no extension found for category '{category}' group '{group}'")]
    GroupNotFound {
        /// Requested category.
        category: Category,
        /// Requested group.
        group: String,
    },

    /// Two extensions claim the same (category, group) pair.
    ///
    /// Registration order must not decide which implementation runs, so
    /// the conflict is a configuration error.
    #[error("duplicate extension registration for category '{category}' group '{group}' (from '{dir}')")]
    DuplicateGroup {
        /// Conflicting category.
        category: Category,
        /// Conflicting group.
        group: String,
        /// Directory of the extension that lost the registration.
        dir: PathBuf,
    },
}

/// Registry resolving (category, group) requests to loaders.
#[derive(Debug)]
pub struct ExecutorRegistry {
    loaders: BTreeMap<Category, BTreeMap<String, Loader>>,
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorRegistry {
    /// Creates a registry seeded with the built-in loaders:
    /// (system, master), (system, service) and (strategy, default).
    #[must_use]
    pub fn new() -> Self {
        let mut loaders: BTreeMap<Category, BTreeMap<String, Loader>> = BTreeMap::new();
        let system = loaders.entry(Category::System).or_default();
        system.insert(MASTER_GROUP.to_string(), Loader::Master);
        system.insert(SERVICE_GROUP.to_string(), Loader::Service);
        loaders.entry(Category::Strategy).or_default().insert(
            DEFAULT_STRATEGY_GROUP.to_string(),
            Loader::default_strategy(),
        );
        Self { loaders }
    }

    /// Discovers extensions relevant to the given context and registers
    /// their loaders.
    ///
    /// Search roots come from `ctx.extension_path` (split on the OS path
    /// separator) when present, else from the directory containing
    /// `ctx.path`. A context with neither leaves the registry with its
    /// built-ins only.
    ///
    /// When the context's own role is exactly (strategy, default), the
    /// strategy entry of a discovered multi-role manifest attaches to the
    /// existing default loader instead of registering a new group, so a
    /// strategy invoked directly by path picks up the vendor bundle's
    /// config. Single-strategy manifests always register under their own
    /// key.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateGroup` when two extensions claim
    /// the same (category, group) pair, including a second manifest
    /// attaching to the default strategy loader.
    pub fn load_extensions(&mut self, ctx: &RoleContext) -> Result<(), RegistryError> {
        let roots = search_roots(ctx);
        if roots.is_empty() {
            debug!(role = %ctx.location(), "no extension search roots");
            return Ok(());
        }
        for (dir, manifest) in manifest::discover(&roots) {
            self.register_manifest(ctx, dir, manifest)?;
        }
        Ok(())
    }

    fn register_manifest(
        &mut self,
        ctx: &RoleContext,
        dir: PathBuf,
        manifest: Manifest,
    ) -> Result<(), RegistryError> {
        // Only a multi-role manifest's strategy entry may claim the
        // default slot; a scalar-key manifest keeps its own group.
        let multi_role = manifest.config.is_some();
        for (category, group) in manifest.roles() {
            if category == Category::Strategy && multi_role && ctx.is_default_strategy() {
                self.attach_default_strategy(&dir, &manifest)?;
                continue;
            }
            self.register(
                category,
                group,
                Loader::Extension(ExtensionLoader::discovered(dir.clone(), manifest.clone())),
                &dir,
            )?;
        }
        Ok(())
    }

    /// Attaches a strategy manifest to the default in-process loader.
    ///
    /// A second matching manifest is a duplicate claim on the default
    /// slot.
    fn attach_default_strategy(
        &mut self,
        dir: &Path,
        manifest: &Manifest,
    ) -> Result<(), RegistryError> {
        let groups = self.loaders.entry(Category::Strategy).or_default();
        match groups.get_mut(DEFAULT_STRATEGY_GROUP) {
            Some(Loader::Extension(ext)) if ext.manifest.is_none() => {
                info!(
                    dir = %dir.display(),
                    key = %manifest.key,
                    "attached manifest to default strategy loader"
                );
                ext.dir = Some(dir.to_path_buf());
                ext.manifest = Some(manifest.clone());
                Ok(())
            }
            Some(_) => Err(RegistryError::DuplicateGroup {
                category: Category::Strategy,
                group: DEFAULT_STRATEGY_GROUP.to_string(),
                dir: dir.to_path_buf(),
            }),
            None => {
                groups.insert(
                    DEFAULT_STRATEGY_GROUP.to_string(),
                    Loader::Extension(ExtensionLoader::discovered(
                        dir.to_path_buf(),
                        manifest.clone(),
                    )),
                );
                Ok(())
            }
        }
    }

    fn register(
        &mut self,
        category: Category,
        group: String,
        loader: Loader,
        dir: &Path,
    ) -> Result<(), RegistryError> {
        let groups = self.loaders.entry(category).or_default();
        if groups.contains_key(&group) {
            return Err(RegistryError::DuplicateGroup {
                category,
                group,
                dir: dir.to_path_buf(),
            });
        }
        info!(%category, %group, dir = %dir.display(), "registered extension loader");
        groups.insert(group, loader);
        Ok(())
    }

    /// Resolves the loader registered for (category, group).
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::GroupNotFound` naming both coordinates
    /// when nothing is registered for the pair.
    pub fn resolve(&self, category: Category, group: &str) -> Result<&Loader, RegistryError> {
        self.loaders
            .get(&category)
            .and_then(|groups| groups.get(group))
            .ok_or_else(|| RegistryError::GroupNotFound {
                category,
                group: group.to_string(),
            })
    }

    /// Returns the groups registered under a category.
    #[must_use]
    pub fn groups(&self, category: Category) -> Vec<&str> {
        self.loaders
            .get(&category)
            .map(|groups| groups.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Renders the loader tree as pretty-printed JSON for diagnostics.
    ///
    /// # Errors
    ///
    /// Fails only if serialization itself fails.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for ExecutorRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.loaders.len()))?;
        for (category, groups) in &self.loaders {
            map.serialize_entry(category, groups)?;
        }
        map.end()
    }
}

fn search_roots(ctx: &RoleContext) -> Vec<PathBuf> {
    if let Some(list) = &ctx.extension_path {
        return std::env::split_paths(list).collect();
    }
    if let Some(path) = &ctx.path {
        if let Some(parent) = path.parent() {
            return vec![parent.to_path_buf()];
        }
    }
    Vec::new()
}
