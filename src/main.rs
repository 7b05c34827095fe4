//! # Docshelf CLI
//!
//! The `docshelf` binary serves the HTTP API and provides local
//! commands for exercising the ingestion pipeline without a browser.
//!
//! ## Usage
//!
//! ```bash
//! docshelf --config ./config/docshelf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docshelf serve` | Start the HTTP API server |
//! | `docshelf add <url>` | Ingest a URL (file, Google Doc/Sheet, Drive folder) |
//! | `docshelf upload <path>` | Ingest a local file |
//! | `docshelf collection` | Show the collection status |
//! | `docshelf purge` | Delete every chunk in the namespace |
//!
//! Local commands act as the configured dev subject; the server
//! resolves the subject from each request's bearer token.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docshelf::chunk::Chunker;
use docshelf::config::{load_config, Config};
use docshelf::credentials::{
    CredentialContext, Credentials, FileParameterStore, SubjectNamespaceAllocator,
};
use docshelf::embedding::EmbeddingClient;
use docshelf::fetch::ContentFetcher;
use docshelf::google::GoogleClient;
use docshelf::index::VectorIndex;
use docshelf::ingest::IngestPipeline;
use docshelf::models::CollectionStatus;
use docshelf::server::run_server;
use docshelf::staging::StagingArea;

/// Docshelf, a retrieval-augmented document chat backend.
#[derive(Parser)]
#[command(
    name = "docshelf",
    about = "Ingest documents into a vector index and chat over them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docshelf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// Ingest a URL: a plain file, a Google Doc or Sheet link, or a
    /// whole Drive folder.
    Add {
        /// The URL to ingest.
        url: String,
    },

    /// Ingest a local file.
    Upload {
        /// Path to the file.
        path: PathBuf,
    },

    /// Show the collection status (chunk count and ceiling).
    Collection,

    /// Delete every chunk in the namespace.
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docshelf=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    let credentials = CredentialContext::new(
        cfg.credentials.clone(),
        Box::new(FileParameterStore),
        Box::new(SubjectNamespaceAllocator),
    );

    match cli.command {
        Commands::Serve => {
            run_server(&cfg, credentials).await?;
        }
        Commands::Add { url } => {
            let creds = credentials.resolve(&cfg.auth.dev_subject).await?;
            let http = reqwest::Client::new();
            let staging = StagingArea::new(&cfg.staging.dir);
            staging.clear()?;

            let google = GoogleClient::new(http.clone(), creds.google.clone());
            let fetcher = ContentFetcher {
                google: &google,
                http: &http,
                staging: &staging,
            };
            let files = fetcher.fetch_url(&url).await?;
            println!("fetched {} file(s)", files.len());

            let status = run_ingest(&cfg, &creds, &http, &staging, files).await?;
            print_status(&status);
        }
        Commands::Upload { path } => {
            let creds = credentials.resolve(&cfg.auth.dev_subject).await?;
            let http = reqwest::Client::new();
            let staging = StagingArea::new(&cfg.staging.dir);
            staging.clear()?;

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", path.display()))?;
            let bytes = std::fs::read(&path)?;
            let staged = staging.write(&name, "", &bytes)?;

            let status = run_ingest(&cfg, &creds, &http, &staging, vec![staged]).await?;
            print_status(&status);
        }
        Commands::Collection => {
            let creds = credentials.resolve(&cfg.auth.dev_subject).await?;
            let index = VectorIndex::new(reqwest::Client::new(), &creds.index);
            print_status(&index.status().await?);
        }
        Commands::Purge => {
            let creds = credentials.resolve(&cfg.auth.dev_subject).await?;
            let index = VectorIndex::new(reqwest::Client::new(), &creds.index);
            index.purge().await?;
            print_status(&index.status().await?);
        }
    }

    Ok(())
}

async fn run_ingest(
    cfg: &Config,
    creds: &Credentials,
    http: &reqwest::Client,
    staging: &StagingArea,
    files: Vec<docshelf::models::StagedFile>,
) -> Result<CollectionStatus> {
    let embeddings = EmbeddingClient::new(http.clone(), creds.openai_api_key.clone());
    let index = VectorIndex::new(http.clone(), &creds.index);
    let pipeline = IngestPipeline {
        staging,
        chunker: Chunker::new(cfg.chunking.chunk_size, cfg.chunking.chunk_overlap),
        embeddings: &embeddings,
        index: &index,
    };
    Ok(pipeline.ingest(files).await?)
}

fn print_status(status: &CollectionStatus) {
    println!("collection: {} / {} chunks", status.size, status.max);
}
