//! # Boreas
//!
//! Host-process entry point for the Boreas trading platform.
//!
//! The binary is started once per role: given a role descriptor (mode,
//! category, group, name) it discovers installable extensions, resolves
//! the loader for its own role, and blocks inside that role's run loop
//! until shutdown. Configuration problems exit with a non-zero status and
//! a diagnostic naming the role, category, or group that failed.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod logging;

use crate::config::HostConfig;
use anyhow::{Context, Result};
use boreas_core::{Category, Mode, RoleContext, RuntimeDir, RuntimeLocator};
use boreas_registry::{ExecutorRegistry, ShutdownController, listen_for_signals};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Boreas - multi-process trading platform host
#[derive(Parser)]
#[command(name = "boreas")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Host configuration file (defaults to BOREAS_CONFIG or ./boreas.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a role until shutdown
    Run(RoleArgs),

    /// Discover extensions and print the registry as JSON
    Registry(RoleArgs),
}

/// Role descriptor shared by every command.
#[derive(Args)]
struct RoleArgs {
    /// Run mode (live, data, replay, backtest)
    #[arg(short, long, env = "BOREAS_MODE", default_value = "live")]
    mode: String,

    /// Role category (system, md, td, strategy)
    #[arg(short, long)]
    category: String,

    /// Vendor or strategy family
    #[arg(short, long, default_value = "default")]
    group: String,

    /// Instance name within the group
    #[arg(short, long)]
    name: String,

    /// Entry script or module path
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// OS-path-separator-delimited list of extension directories
    #[arg(short = 'x', long, env = "BOREAS_EXTENSION_PATH")]
    extension_path: Option<String>,

    /// Busy-poll the run loop instead of sleeping
    #[arg(long)]
    low_latency: bool,

    /// Runtime root directory (defaults to BOREAS_RUNTIME_DIR or the
    /// platform config dir)
    #[arg(long)]
    runtime_dir: Option<PathBuf>,
}

impl RoleArgs {
    /// Builds the role context, with the host config supplying defaults
    /// beneath the command-line arguments.
    fn context(&self, config: &HostConfig) -> Result<RoleContext> {
        let mode = Mode::parse(&self.mode)?;
        let category = Category::parse(&self.category)?;
        let runtime_dir = self.runtime_dir.as_ref().or(config.runtime_dir.as_ref());
        let locator: Arc<dyn RuntimeLocator> =
            Arc::new(runtime_dir.map_or_else(RuntimeDir::from_env, RuntimeDir::new));
        let mut ctx = RoleContext::new(mode, category, &self.group, &self.name, locator)
            .with_low_latency(self.low_latency || config.low_latency);
        if let Some(path) = &self.path {
            ctx = ctx.with_path(path);
        }
        if let Some(extension_path) = self
            .extension_path
            .as_ref()
            .or(config.extension_path.as_ref())
        {
            ctx = ctx.with_extension_path(extension_path);
        }
        Ok(ctx)
    }
}

async fn run_role(args: &RoleArgs, config: &HostConfig, verbose: bool) -> Result<()> {
    let ctx = args.context(config)?;
    let location = ctx.location();
    let _guard = logging::init(&location, verbose)?;
    info!(role = %location, "starting role");

    let mut registry = ExecutorRegistry::new();
    registry
        .load_extensions(&ctx)
        .with_context(|| format!("discovering extensions for role '{location}'"))?;
    let loader = registry
        .resolve(ctx.category, &ctx.group)
        .with_context(|| format!("resolving loader for role '{location}'"))?;
    let executor = loader.resolve(&ctx);

    let shutdown = ShutdownController::new();
    tokio::spawn(listen_for_signals(shutdown.clone()));
    executor
        .run(shutdown)
        .await
        .with_context(|| format!("role '{location}' failed"))?;
    info!(role = %location, "role terminated");
    Ok(())
}

fn inspect_registry(args: &RoleArgs, config: &HostConfig) -> Result<()> {
    let ctx = args.context(config)?;
    let mut registry = ExecutorRegistry::new();
    registry
        .load_extensions(&ctx)
        .with_context(|| format!("discovering extensions for role '{}'", ctx.location()))?;
    println!("{}", registry.to_json_pretty()?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = match HostConfig::discover(cli.config.as_deref()) {
        Ok(config) => match &cli.command {
            Commands::Run(args) => run_role(args, &config, cli.verbose).await,
            Commands::Registry(args) => inspect_registry(args, &config),
        },
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_command() {
        let cli = Cli::parse_from([
            "boreas", "run", "--category", "strategy", "--name", "alpha", "--path",
            "/srv/alpha.py",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.mode, "live");
        assert_eq!(args.group, "default");
        assert_eq!(args.name, "alpha");
    }

    #[test]
    fn test_role_args_reject_unknown_category() {
        let cli = Cli::parse_from(["boreas", "run", "--category", "exchange", "--name", "x"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.context(&HostConfig::default()).is_err());
    }

    #[test]
    fn test_context_carries_descriptor() {
        let cli = Cli::parse_from([
            "boreas",
            "run",
            "--mode",
            "backtest",
            "--category",
            "td",
            "--group",
            "sim",
            "--name",
            "acct1",
            "--low-latency",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let ctx = args.context(&HostConfig::default()).unwrap();
        assert_eq!(ctx.location().uname(), "td/sim/acct1/backtest");
        assert!(ctx.low_latency);
    }

    #[test]
    fn test_config_defaults_apply_beneath_args() {
        let cli = Cli::parse_from(["boreas", "run", "--category", "md", "--group", "sim", "--name", "feed1"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let config = HostConfig {
            runtime_dir: None,
            extension_path: Some("/opt/ext".to_string()),
            low_latency: true,
        };
        let ctx = args.context(&config).unwrap();
        assert_eq!(ctx.extension_path.as_deref(), Some("/opt/ext"));
        assert!(ctx.low_latency);
    }
}
