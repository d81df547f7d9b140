use clap::{Parser, Subcommand};
use rag_core::Result;
use rag_core::commands::{ask, ingest_files, search, show_status};
use rag_core::config::{Config, default_base_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rag-core")]
#[command(about = "Retrieval-augmented generation over a local document index")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the index (defaults to ~/.rag-core)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding model, language model and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and index text files
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Source name recorded for every chunk instead of the file path
        #[arg(long)]
        source: Option<String>,
    },
    /// Print the ranked chunks for a query
    Search {
        query: String,
        /// Number of chunks to return
        #[arg(long)]
        top_k: Option<usize>,
        /// Expand the query into alternative phrasings with the language model
        #[arg(long)]
        expand: bool,
    },
    /// Answer a question from the retrieved chunks
    Ask {
        query: String,
        /// Number of chunks used as context
        #[arg(long)]
        top_k: Option<usize>,
        /// Expand the query into alternative phrasings with the language model
        #[arg(long)]
        expand: bool,
    },
    /// Show embedding backend and index health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_base_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Ingest { files, source } => {
            ingest_files(Config::load(&base_dir)?, files, source).await?;
        }
        Commands::Search {
            query,
            top_k,
            expand,
        } => {
            search(Config::load(&base_dir)?, query, top_k, expand).await?;
        }
        Commands::Ask {
            query,
            top_k,
            expand,
        } => {
            ask(Config::load(&base_dir)?, query, top_k, expand).await?;
        }
        Commands::Status => {
            show_status(&Config::load(&base_dir)?)?;
        }
    }

    Ok(())
}
