//! voltrag CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Interactive session with conversation memory
//! - `ask`     — Answer a single question
//! - `config`  — Print the default configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "voltrag",
    about = "voltrag — battery questions answered from your own data",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.voltrag/config.toml
    #[arg(long, global = true, env = "VOLTRAG_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session
    Chat {
        /// JSON battery catalog (overrides catalog.path)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Ask a single question
    Ask {
        /// The question
        #[arg(short, long)]
        message: String,

        /// JSON battery catalog (overrides catalog.path)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Chat { catalog } => commands::chat::run(config_path, catalog).await?,
        Commands::Ask {
            message,
            catalog,
            json,
        } => commands::ask::run(config_path, catalog, &message, json).await?,
        Commands::Config => commands::config_cmd::run(),
    }

    Ok(())
}
