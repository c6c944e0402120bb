//! # Storyforge CLI (`storyforge`)
//!
//! Index project documents, search them, and draft user stories grounded in
//! their content.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `storyforge init` | Create the SQLite database and run schema migrations |
//! | `storyforge index <project> <path>` | Index a file or a directory of documents |
//! | `storyforge search <project> "<query>"` | Show the chunks most similar to a query |
//! | `storyforge generate <project> --context .. --requirements ..` | Generate user stories |
//! | `storyforge serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! storyforge init --config ./config/storyforge.toml
//! storyforge index hr-portal ./docs/requirements
//! storyforge search hr-portal "leave approval"
//! storyforge generate hr-portal \
//!     --context "Internal HR portal for 2,000 employees" \
//!     --requirements "Employees request vacation and managers approve it"
//! RUST_LOG=debug storyforge serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use storyforge::{config, generate, ingest, migrate, search, server};

/// Storyforge: document-grounded user story generation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/storyforge.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "storyforge",
    about = "Storyforge: turn project documents and requirements into structured user stories",
    version,
    long_about = "Storyforge chunks and embeds project documents into per-project vector \
    collections, retrieves the passages relevant to a set of requirements, and asks a \
    language model to draft user stories with acceptance criteria and priorities."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/storyforge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index a document, or every supported document under a directory.
    ///
    /// Supported formats: .txt, .md, .pdf, .docx. Re-indexing a document
    /// appends a second copy of its chunks.
    Index {
        /// Project identifier (letters, digits, `_`, `-`).
        project: String,
        /// File or directory to index.
        path: PathBuf,
    },

    /// Search a project's indexed chunks by semantic similarity.
    Search {
        project: String,
        query: String,
        /// Maximum number of results (defaults to `[retrieval].max_results`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Generate user stories for a project.
    Generate {
        project: String,
        /// Free-text description of the project.
        #[arg(long, default_value = "")]
        context: String,
        /// The requirements to turn into stories; also the retrieval query.
        #[arg(long)]
        requirements: String,
        /// Print the stories as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { project, path } => {
            ingest::run_index(&cfg, &project, &path).await?;
        }
        Commands::Search {
            project,
            query,
            limit,
        } => {
            search::run_search(&cfg, &project, &query, limit).await?;
        }
        Commands::Generate {
            project,
            context,
            requirements,
            json,
        } => {
            generate::run_generate(&cfg, &project, &context, &requirements, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
