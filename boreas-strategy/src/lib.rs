//! # Boreas Strategy
//!
//! Strategy loading and execution for the Boreas trading platform.
//!
//! This crate provides:
//! - the `Strategy` trait - the narrow callback interface a trading
//!   strategy implements
//! - `loader` - resolution of a strategy entry source (script, native
//!   shared library, or rewritten sibling path) including the
//!   native-to-script fallback chain
//! - `Runner` - the actor that owns registered strategies and drives their
//!   callbacks until shutdown
//!
//! # Loading
//!
//! A strategy request arrives as a path plus an optional entry key. The
//! loader resolves it in priority order: script paths are constructed
//! directly; native shared libraries are loaded via their exported factory
//! symbol and degrade to the sibling script `dirname(path)/key` on any
//! failure; other paths are rewritten against the key. A broken native
//! build therefore never prevents the reference implementation from
//! running.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod loader;
pub mod runner;
pub mod r#trait;

pub use context::StrategyContext;
pub use loader::{EntrySource, LoadError, load_strategy};
pub use runner::{Runner, RunnerCommand, RunnerHandle};
pub use r#trait::{Event, Strategy};
