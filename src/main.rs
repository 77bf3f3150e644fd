use clap::{Parser, Subcommand};
use paddleprompt::Result;
use paddleprompt::commands::{ask, ingest, purge, serve};
use paddleprompt::config::{
    load_effective, resolve_config_dir, run_interactive_config, show_config,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "paddleprompt")]
#[command(about = "Question answering over a PDF collection with OpenAI and Pinecone")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.paddleprompt)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit or show the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start the HTTP API
    Serve,
    /// Index every PDF in a folder
    Ingest {
        /// Folder containing the PDF files
        folder: PathBuf,
    },
    /// Delete every vector in the configured namespace
    Purge {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Answer a single question from the command line
    Ask {
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir.as_deref())?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&load_effective(&config_dir)?)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Serve => {
            serve(&load_effective(&config_dir)?).await?;
        }
        Commands::Ingest { folder } => {
            ingest(&load_effective(&config_dir)?, &folder).await?;
        }
        Commands::Purge { yes } => {
            purge(&load_effective(&config_dir)?, yes).await?;
        }
        Commands::Ask { question } => {
            ask(&load_effective(&config_dir)?, &question).await?;
        }
    }

    Ok(())
}
