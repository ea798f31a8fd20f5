//! CLI entry point for the chat relay

use chat_relay::{
    cli::{describe_config, ServeArgs},
    init_logger_with_config, log_error, log_info,
    runtime::run_with_runtime,
    RelayConfig,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "Relays chat-completion requests upstream with a server-held credential")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// YAML config file (defaults to ./relay.yml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Load and validate configuration, then print the effective settings
    #[command(name = "check-config")]
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = RelayConfig::load_config(cli.config.as_deref())?;

    if cli.verbose {
        config.log_level = "debug".to_string();
    } else if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    init_logger_with_config(&config.log_level);

    match cli.command {
        Some(Commands::CheckConfig) => {
            for line in describe_config(&config) {
                println!("{}", line);
            }
            println!("Configuration OK");
            Ok(())
        }
        Some(Commands::Serve(args)) => serve(args, config),
        None => serve(ServeArgs::default(), config),
    }
}

fn serve(args: ServeArgs, mut config: RelayConfig) -> anyhow::Result<()> {
    args.apply_to(&mut config)?;

    log_info!("🚀 Starting Chat Relay");
    log_info!("📋 Version: {}", env!("CARGO_PKG_VERSION"));

    let runtime_config = config.runtime.clone();
    run_with_runtime(&runtime_config, async move {
        if let Err(e) = ServeArgs::start_server(config).await {
            log_error!("Server error: {}", e);
            return Err(e);
        }
        Ok(())
    })
}
