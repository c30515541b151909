//! Host configuration file.
//!
//! A `boreas.toml` supplies per-host defaults for the role descriptor;
//! command-line arguments always win over file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the host configuration file.
pub const CONFIG_ENV: &str = "BOREAS_CONFIG";

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "boreas.toml";

/// Host-level defaults applied beneath command-line arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    /// Runtime root directory.
    #[serde(default)]
    pub runtime_dir: Option<PathBuf>,

    /// Extension search path.
    #[serde(default)]
    pub extension_path: Option<String>,

    /// Busy-poll run loops by default.
    #[serde(default)]
    pub low_latency: bool,
}

impl HostConfig {
    /// Loads the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable or not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading host config '{}'", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("parsing host config '{}'", path.display()))
    }

    /// Loads the configuration from the conventional locations.
    ///
    /// Tries the explicit `path` argument first, then `BOREAS_CONFIG`,
    /// then `boreas.toml` in the working directory. With none of those
    /// present the defaults apply.
    ///
    /// # Errors
    ///
    /// A file that was named but cannot be read or parsed is an error;
    /// only absence falls back to defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        let local = Path::new(CONFIG_FILE);
        if local.is_file() {
            return Self::load(local);
        }
        Ok(Self::default())
    }
}
