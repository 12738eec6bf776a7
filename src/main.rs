//! apkcache - local cache for APK repository indexes and packages
//!
//! CLI entry point that dispatches to subcommands.

use apkcache::cli::{Cli, Commands, ConfigAction, ConfigArgs};
use apkcache::config::ConfigManager;
use apkcache::error::CacheResult;
use clap::Parser;
use console::style;
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

async fn run() -> CacheResult<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::resolve(cli.config.clone());
    let loaded = config_manager.load().await;

    let json = matches!(loaded, Ok(ref config) if config.general.log_format == "json");
    init_tracing(cli.verbose, json);
    debug!("Using config {}", config_manager.describe());

    // Must not depend on the current file parsing
    if let Commands::Config(ConfigArgs {
        action: Some(ConfigAction::Init { force }),
    }) = cli.command
    {
        return apkcache::cli::commands::config::init(&config_manager, force).await;
    }

    let mut config = loaded?;
    cli.apply_overrides(&mut config);

    match cli.command {
        Commands::Index(args) => apkcache::cli::commands::index(args, &config).await,
        Commands::Fetch(args) => apkcache::cli::commands::fetch(args, &config).await,
        Commands::List(args) => apkcache::cli::commands::list(args, &config).await,
        Commands::Verify(args) => apkcache::cli::commands::verify(args, &config).await,
        Commands::Gc(args) => apkcache::cli::commands::gc(args, &config).await,
        Commands::Config(args) => {
            apkcache::cli::commands::config(args, &config_manager, &config).await
        }
    }
}

/// Log to stderr; 0 = warn, 1 = info, 2+ = debug, RUST_LOG wins when set
fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("apkcache=warn"),
        1 => EnvFilter::new("apkcache=info"),
        _ => EnvFilter::new("apkcache=debug"),
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
}
