//! # Boreas Registry
//!
//! Extension registry and dynamic dispatch for the Boreas trading
//! platform.
//!
//! This crate turns static configuration (manifest files on disk) into a
//! runtime topology: which code runs, under which identity, against which
//! runtime endpoint. It provides:
//! - `manifest` - discovery and parsing of per-extension `extension.json`
//!   descriptors
//! - `Loader` - the tagged binding from (category, group) to a runnable
//!   role: built-in master, built-in services, or an extension
//! - `ExecutorRegistry` - the loader set, seeded with built-ins,
//!   populated once by discovery, introspectable as JSON
//! - `Executor` - per-request dispatch: system shells, broker vendors
//!   built through the [`broker::BrokerExtension`] interface, and the
//!   strategy fallback chain handed to the runner's event loop
//! - `ShutdownController` - coordination between the blocking run loops
//!   and OS termination signals
//!
//! Discovery runs once, single-threaded, at process start; after it the
//! registry is read-only for the life of the process.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod broker;
pub mod event_loop;
pub mod executor;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod shutdown;
pub mod system;

pub use executor::{DispatchError, Executor};
pub use loader::{ExtensionLoader, Loader};
pub use manifest::{Manifest, ManifestError};
pub use registry::{ExecutorRegistry, RegistryError};
pub use shutdown::{ShutdownController, listen_for_signals};
