mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "webcell")]
#[command(about = "Browser control for LLM agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.webcell/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the available actions
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },

    /// Launch a browser and execute action requests read from stdin, one JSON object per line
    Run {
        /// Page to open before reading requests
        #[arg(long)]
        url: Option<String>,
    },

    /// Launch a browser, open a page and print its indexed elements
    Snapshot {
        /// Page to open
        url: String,
    },

    /// List browsers found on this system
    Browsers,
}

#[derive(Subcommand)]
enum ToolsCommands {
    /// List all actions
    List,
    /// Show the parameters of one action
    Info {
        /// Action name (e.g. "Click Tool" or "click")
        tool_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Tools { command } => match command {
            ToolsCommands::List => {
                commands::tools_cmd::list().await?;
            }
            ToolsCommands::Info { tool_name } => {
                commands::tools_cmd::info(&tool_name).await?;
            }
        },
        Commands::Run { url } => {
            commands::run_cmd::run(cli.config, url).await?;
        }
        Commands::Snapshot { url } => {
            commands::run_cmd::snapshot(cli.config, &url).await?;
        }
        Commands::Browsers => {
            commands::browsers::run().await?;
        }
    }

    Ok(())
}
