//! Location addressing for runnable units.
//!
//! A `Location` names one runnable unit by (mode, category, group, name)
//! and carries the runtime locator that resolves the unit's filesystem and
//! IPC footprint. Equality is structural over the four identifying fields;
//! the locator is a resolver, not an identity component.

use crate::locator::RuntimeLocator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Errors produced when constructing a location from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The mode string is not a member of the known mode set.
    #[error("unknown mode '{0}' (expected one of: live, data, replay, backtest)")]
    InvalidMode(String),

    /// The category string is not a member of the known category set.
    #[error("unknown category '{0}' (expected one of: system, md, td, strategy)")]
    InvalidCategory(String),
}

/// Run mode of a process.
///
/// The mode is part of a unit's identity: the same strategy run live and in
/// backtest occupies two distinct on-disk footprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Live trading against real counterparties.
    Live,
    /// Data collection only.
    Data,
    /// Replay of recorded journals.
    Replay,
    /// Backtesting against historical data.
    Backtest,
}

impl Mode {
    /// Returns the wire name of this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Data => "data",
            Self::Replay => "replay",
            Self::Backtest => "backtest",
        }
    }

    /// Parses a wire name into a mode.
    ///
    /// Matching is case-sensitive; the mode set is closed.
    ///
    /// # Errors
    ///
    /// Returns `LocationError::InvalidMode` for unknown names.
    pub fn parse(s: &str) -> Result<Self, LocationError> {
        match s {
            "live" => Ok(Self::Live),
            "data" => Ok(Self::Data),
            "replay" => Ok(Self::Replay),
            "backtest" => Ok(Self::Backtest),
            other => Err(LocationError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Role category of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Built-in system roles (master, services).
    System,
    /// Market-data vendor.
    Md,
    /// Trader (order routing) vendor.
    Td,
    /// Trading strategy.
    Strategy,
}

impl Category {
    /// Returns the wire name of this category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Md => "md",
            Self::Td => "td",
            Self::Strategy => "strategy",
        }
    }

    /// Parses a wire name into a category.
    ///
    /// Matching is case-sensitive; the category set is closed. Manifest
    /// readers rely on this to reject unknown categories instead of
    /// silently ignoring them.
    ///
    /// # Errors
    ///
    /// Returns `LocationError::InvalidCategory` for unknown names.
    pub fn parse(s: &str) -> Result<Self, LocationError> {
        match s {
            "system" => Ok(Self::System),
            "md" => Ok(Self::Md),
            "td" => Ok(Self::Td),
            "strategy" => Ok(Self::Strategy),
            other => Err(LocationError::InvalidCategory(other.to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identity and placement of one runnable unit.
///
/// The (mode, category, group, name) tuple uniquely identifies the unit's
/// on-disk and IPC footprint. The attached locator resolves that footprint
/// to concrete paths and is supplied by the host process; it is never
/// mutated after construction.
#[derive(Clone)]
pub struct Location {
    /// Run mode.
    pub mode: Mode,
    /// Role category.
    pub category: Category,
    /// Vendor or strategy family.
    pub group: String,
    /// Instance name within the group.
    pub name: String,
    /// Resolver for this location's runtime paths.
    pub locator: Arc<dyn RuntimeLocator>,
}

impl Location {
    /// Creates a location from already-validated parts.
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
            locator,
        }
    }

    /// Creates a location from wire-name strings.
    ///
    /// # Errors
    ///
    /// Returns `LocationError` if the mode or category string is not a
    /// member of its closed set.
    pub fn parse(
        mode: &str,
        category: &str,
        group: impl Into<String>,
        name: impl Into<String>,
        locator: Arc<dyn RuntimeLocator>,
    ) -> Result<Self, LocationError> {
        Ok(Self::new(
            Mode::parse(mode)?,
            Category::parse(category)?,
            group,
            name,
            locator,
        ))
    }

    /// Returns the unique display name `category/group/name/mode`.
    #[must_use]
    pub fn uname(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.category, self.group, self.name, self.mode
        )
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.mode == other.mode
            && self.category == other.category
            && self.group == other.group
            && self.name == other.name
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mode.hash(state);
        self.category.hash(state);
        self.group.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("mode", &self.mode)
            .field("category", &self.category)
            .field("group", &self.group)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uname())
    }
}
