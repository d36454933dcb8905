//! Hoard - content-addressed download cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use hoard::cli::{Cli, Commands};
use hoard::config::{Config, ConfigManager};
use hoard::error::HoardResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> HoardResult<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::resolve(cli.config.clone());
    let mut config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    apply_overrides(&cli, &mut config);
    debug!("Cache root {}", config.cache_root().display());

    // Dispatch to command
    match cli.command {
        Commands::Get(args) => hoard::cli::commands::get(args, &config).await,
        Commands::Path(args) => hoard::cli::commands::path(args, &config).await,
        Commands::Verify(args) => hoard::cli::commands::verify(args, &config).await,
        Commands::Clean(args) => hoard::cli::commands::clean(args, &config).await,
        Commands::Config(args) => {
            hoard::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug. Logs go to stderr so stdout carries payloads only.
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("hoard=warn"),
        1 => EnvFilter::new("hoard=info"),
        _ => EnvFilter::new("hoard=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(ref root) = cli.root {
        config.cache.root = Some(root.clone());
    }
    if cli.paranoid {
        config.cache.paranoid = true;
    }
    if let Some(timeout) = cli.timeout {
        config.cache.timeout_secs = timeout;
    }
}
