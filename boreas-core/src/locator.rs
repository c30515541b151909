//! Runtime path resolution.
//!
//! A `RuntimeLocator` turns a `Location` into concrete filesystem paths.
//! The default implementation, `RuntimeDir`, places every unit's files
//! under `<root>/<category>/<group>/<name>/<layout>/<mode>` so that two
//! distinct locations can never collide on disk.

use crate::location::Location;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the default runtime root.
///
/// Read once when `RuntimeDir::from_env` is called; the locator never
/// consults the environment afterwards.
pub const RUNTIME_DIR_ENV: &str = "BOREAS_RUNTIME_DIR";

/// Storage layout kinds under a location's directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Append-only journal files.
    Journal,
    /// Log output.
    Log,
    /// SQLite state databases.
    Sqlite,
}

impl Layout {
    /// Returns the directory (and file extension) name of this layout.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Journal => "journal",
            Self::Log => "log",
            Self::Sqlite => "db",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolver from locations to runtime paths.
///
/// Supplied by the host process when it builds its `RoleContext`; shared by
/// every component that needs to place or find files for a location.
pub trait RuntimeLocator: Send + Sync {
    /// Returns the runtime root directory.
    fn root(&self) -> &Path;

    /// Returns (and creates if missing) the directory for one layout of a
    /// location.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn layout_dir(&self, location: &Location, layout: Layout) -> io::Result<PathBuf>;

    /// Returns the path of a named file inside a layout directory.
    ///
    /// The layout directory is created if missing; the file itself is not
    /// touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout directory cannot be created.
    fn layout_file(&self, location: &Location, layout: Layout, name: &str) -> io::Result<PathBuf> {
        let dir = self.layout_dir(location, layout)?;
        Ok(dir.join(format!("{name}.{layout}")))
    }
}

impl fmt::Debug for dyn RuntimeLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeLocator")
            .field("root", &self.root())
            .finish()
    }
}

/// Default filesystem locator rooted at a single runtime directory.
#[derive(Debug, Clone)]
pub struct RuntimeDir {
    root: PathBuf,
}

impl RuntimeDir {
    /// Creates a locator rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a locator from the process environment.
    ///
    /// Honors `BOREAS_RUNTIME_DIR` when set, otherwise falls back to the
    /// platform default under the user's configuration directory.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var_os(RUNTIME_DIR_ENV) {
            Some(dir) => Self::new(PathBuf::from(dir)),
            None => Self::new(Self::default_root()),
        }
    }

    /// Returns the platform default runtime root.
    #[must_use]
    pub fn default_root() -> PathBuf {
        let base = if cfg!(target_os = "macos") {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join("Library")
                .join("Application Support")
        } else if cfg!(windows) {
            std::env::var_os("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_default()
        } else {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(".config")
        };
        base.join("boreas").join("runtime")
    }
}

impl RuntimeLocator for RuntimeDir {
    fn root(&self) -> &Path {
        &self.root
    }

    fn layout_dir(&self, location: &Location, layout: Layout) -> io::Result<PathBuf> {
        let dir = self
            .root
            .join(location.category.as_str())
            .join(&location.group)
            .join(&location.name)
            .join(layout.as_str())
            .join(location.mode.as_str());
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }
}
