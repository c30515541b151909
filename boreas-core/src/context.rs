//! Role context handed to the dispatch layer by the host process.
//!
//! The context is explicit state passed into loaders and strategy
//! constructors. Nothing in the dispatch layer signals through the process
//! environment; a component that needs the role identity receives it as an
//! argument.

use crate::location::{Category, Location, Mode};
use crate::locator::RuntimeLocator;
use std::path::PathBuf;
use std::sync::Arc;

/// Descriptor of the role a host process was started with.
///
/// Built by the host entry point, read by the registry and executors. The
/// dispatch layer never mutates a context; sub-roles that need a different
/// identity (master, named services) build their own `Location` instead.
#[derive(Debug, Clone)]
pub struct RoleContext {
    /// Run mode.
    pub mode: Mode,
    /// Role category.
    pub category: Category,
    /// Vendor or strategy family.
    pub group: String,
    /// Instance name within the group.
    pub name: String,
    /// Entry script or module path, when the role was invoked by path.
    pub path: Option<PathBuf>,
    /// OS-path-separator-delimited list of extension directories.
    pub extension_path: Option<String>,
    /// Whether the role should run in low-latency (busy-polling) mode.
    pub low_latency: bool,
    /// Resolver for runtime paths, shared by every location this process
    /// builds.
    pub locator: Arc<dyn RuntimeLocator>,
}

impl RoleContext {
    /// Creates a context for the given role tuple.
    #[must_use]
    pub fn new(
        mode: Mode,
        category: Category,
        group: impl Into<String>,
        name: impl Into<String>,
        locator: Arc<dyn RuntimeLocator>,
    ) -> Self {
        Self {
            mode,
            category,
            group: group.into(),
            name: name.into(),
            path: None,
            extension_path: None,
            low_latency: false,
            locator,
        }
    }

    /// Sets the entry script or module path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the extension search path.
    #[must_use]
    pub fn with_extension_path(mut self, extension_path: impl Into<String>) -> Self {
        self.extension_path = Some(extension_path.into());
        self
    }

    /// Sets the low-latency flag.
    #[must_use]
    pub fn with_low_latency(mut self, low_latency: bool) -> Self {
        self.low_latency = low_latency;
        self
    }

    /// Builds the location for this context's own role tuple.
    #[must_use]
    pub fn location(&self) -> Location {
        Location::new(
            self.mode,
            self.category,
            self.group.clone(),
            self.name.clone(),
            Arc::clone(&self.locator),
        )
    }

    /// Returns true if this context requests the default in-process
    /// strategy loader.
    #[must_use]
    pub fn is_default_strategy(&self) -> bool {
        self.category == Category::Strategy && self.group == "default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::RuntimeDir;

    fn ctx(category: Category, group: &str) -> RoleContext {
        RoleContext::new(
            Mode::Live,
            category,
            group,
            "test",
            Arc::new(RuntimeDir::new("/tmp/boreas-test")),
        )
    }

    #[test]
    fn test_location_matches_tuple() {
        let ctx = ctx(Category::Md, "sim");
        let location = ctx.location();
        assert_eq!(location.uname(), "md/sim/test/live");
    }

    #[test]
    fn test_default_strategy_detection() {
        assert!(ctx(Category::Strategy, "default").is_default_strategy());
        assert!(!ctx(Category::Strategy, "demo").is_default_strategy());
        assert!(!ctx(Category::Md, "default").is_default_strategy());
    }

    #[test]
    fn test_builder_setters() {
        let ctx = ctx(Category::Strategy, "default")
            .with_path("/srv/strategies/alpha.py")
            .with_extension_path("/opt/ext")
            .with_low_latency(true);
        assert_eq!(ctx.path.as_deref().unwrap().to_str(), Some("/srv/strategies/alpha.py"));
        assert_eq!(ctx.extension_path.as_deref(), Some("/opt/ext"));
        assert!(ctx.low_latency);
    }
}
