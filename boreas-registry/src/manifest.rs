//! Extension manifest discovery and parsing.
//!
//! Every installable extension ships an `extension.json` at its directory
//! root. The file carries a reserved top-level `"boreas"` section; a
//! directory whose manifest lacks that section is not an extension and is
//! skipped. Discovery re-reads the filesystem on every process start, no
//! state is carried across restarts.

use boreas_core::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// File name of the per-extension manifest.
pub const MANIFEST_FILE: &str = "extension.json";

/// Reserved top-level key marking a manifest as a platform extension.
pub const MANIFEST_SECTION: &str = "boreas";

/// Errors raised while reading a single manifest.
///
/// Discovery recovers from all of these by skipping the directory; they
/// surface only when a manifest is requested explicitly.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file is missing or unreadable.
    #[error("cannot read manifest '{path}': {source}")]
    Read {
        /// Manifest file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest file is not valid JSON or declares an unknown
    /// category.
    #[error("cannot parse manifest '{path}': {source}")]
    Parse {
        /// Manifest file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The file parses but carries no extension section.
    #[error("manifest '{path}' has no '{MANIFEST_SECTION}' section")]
    MissingSection {
        /// Manifest file path.
        path: PathBuf,
    },
}

/// A parsed extension manifest.
///
/// With a `config` map the extension declares one role per listed
/// category, all registered under the manifest's top-level `key` as their
/// group. Without one the manifest declares a single strategy entry point
/// whose group is the key itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Extension display name.
    pub name: String,
    /// Entry-point identifier used for module resolution.
    pub key: String,
    /// Role declarations for multi-role extensions.
    ///
    /// Maps each provided category to the implementation artifact it
    /// ships. Unknown category strings fail the parse, rejecting the
    /// whole manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<Category, String>>,
}

#[derive(Deserialize)]
struct ManifestFile {
    #[serde(rename = "boreas")]
    section: Option<Manifest>,
}

impl Manifest {
    /// Reads the manifest of the extension directory `dir`.
    ///
    /// # Errors
    ///
    /// Fails when the manifest file is missing, unparsable, declares an
    /// unknown category, or lacks the extension section.
    pub fn read(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| ManifestError::Read {
            path: path.clone(),
            source: e,
        })?;
        let file: ManifestFile =
            serde_json::from_str(&text).map_err(|e| ManifestError::Parse {
                path: path.clone(),
                source: e,
            })?;
        file.section
            .ok_or(ManifestError::MissingSection { path })
    }

    /// Returns the (category, group) pairs this manifest declares.
    ///
    /// Every declared role shares the manifest's top-level key as its
    /// group.
    #[must_use]
    pub fn roles(&self) -> Vec<(Category, String)> {
        match &self.config {
            Some(config) => config
                .keys()
                .map(|category| (*category, self.key.clone()))
                .collect(),
            None => vec![(Category::Strategy, self.key.clone())],
        }
    }

    /// Returns true when the manifest declares a strategy role.
    #[must_use]
    pub fn provides_strategy(&self) -> bool {
        match &self.config {
            Some(config) => config.contains_key(&Category::Strategy),
            None => true,
        }
    }
}

/// Discovers extensions under the given search roots.
///
/// A root that itself carries a manifest is treated as a single extension
/// directory; any other root is a container whose immediate child
/// directories are probed one by one. Directories without a valid
/// manifest are skipped with a diagnostic. The result is ordered by root,
/// then by directory name, so an unchanged filesystem always yields the
/// same sequence.
#[must_use]
pub fn discover(roots: &[PathBuf]) -> Vec<(PathBuf, Manifest)> {
    let mut found = Vec::new();
    for root in roots {
        if root.join(MANIFEST_FILE).is_file() {
            probe(root, &mut found);
            continue;
        }
        let Ok(entries) = std::fs::read_dir(root) else {
            info!(root = %root.display(), "extension root is not readable, skipping");
            continue;
        };
        let mut children: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        children.sort();
        for child in children {
            probe(&child, &mut found);
        }
    }
    found
}

fn probe(dir: &Path, found: &mut Vec<(PathBuf, Manifest)>) {
    match Manifest::read(dir) {
        Ok(manifest) => {
            debug!(
                dir = %dir.display(),
                name = %manifest.name,
                key = %manifest.key,
                "discovered extension"
            );
            found.push((dir.to_path_buf(), manifest));
        }
        Err(e) => {
            info!(dir = %dir.display(), "not an extension, skipping: {e}");
        }
    }
}
