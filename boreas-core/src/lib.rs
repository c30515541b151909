//! # Boreas Core
//!
//! Core value types for the Boreas trading platform.
//!
//! This crate provides:
//! - `Location` - the (mode, category, group, name) tuple identifying a
//!   runnable unit and its storage/IPC placement
//! - `RuntimeLocator` - resolver from a location to filesystem paths
//! - `RoleContext` - the role descriptor a host process is started with
//!
//! Everything here is constructed once at process startup and treated as
//! immutable afterwards. A process that needs a different identity (for
//! example a system service refining "system/service" into its own name)
//! builds a new `Location` rather than mutating the old one.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod location;
pub mod locator;

pub use context::RoleContext;
pub use location::{Category, Location, LocationError, Mode};
pub use locator::{Layout, RuntimeDir, RuntimeLocator};
