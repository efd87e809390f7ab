use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vecsearch_analyzer::SimilarFinder;
use vecsearch_common::{logger, AppConfig};
use vecsearch_index::{IndexManager, JsonCorpusStore};

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    match find_project_root().map(|root| root.join(".env")) {
        Some(env_path) if env_path.exists() => {
            dotenv::from_path(&env_path).ok();
        }
        _ => {
            dotenv::dotenv().ok();
        }
    }
}

#[derive(Parser)]
#[command(name = "vecsearch")]
#[command(about = "vecsearch - vector index and similarity search service", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./vecsearch.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,

        /// Snapshot directory
        #[arg(long)]
        index_path: Option<PathBuf>,
    },

    /// Build the index from the corpus and save a snapshot
    Build {
        /// Corpus JSON file
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Snapshot directory
        #[arg(long)]
        index_path: Option<PathBuf>,
    },

    /// Ask the running service for records similar to a description
    Similar {
        /// Free-text description
        #[arg(long)]
        query: String,

        /// Sector used when the service is unreachable
        #[arg(long, default_value = "")]
        sector: String,

        /// Number of records
        #[arg(long, default_value_t = vecsearch_analyzer::DEFAULT_TOP_K)]
        top_k: usize,
    },
}

fn set_env_path(key: &str, value: Option<&Path>) {
    if let Some(path) = value {
        std::env::set_var(key, path);
    }
}

fn load_config(file: Option<&Path>) -> Result<AppConfig> {
    Ok(AppConfig::load(file)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env first so CLI flags below override it
    load_dotenv_from_project_root();

    match cli.command {
        Some(Commands::Serve {
            host,
            port,
            index_path,
        }) => {
            if let Some(host) = &host {
                std::env::set_var("SERVER_HOST", host);
            }
            if let Some(port) = port {
                std::env::set_var("SERVER_PORT", port.to_string());
            }
            set_env_path("VECTOR_INDEX_PATH", index_path.as_deref());

            let config = load_config(cli.config.as_deref())?;
            serve(config).await?;
        }
        Some(Commands::Build { corpus, index_path }) => {
            set_env_path("CORPUS_PATH", corpus.as_deref());
            set_env_path("VECTOR_INDEX_PATH", index_path.as_deref());

            let config = load_config(cli.config.as_deref())?;
            logger::setup_logging(None, &config.log_level)?;

            let provider = vecsearch_embed::provider_from_config(&config)?;
            let store = Arc::new(JsonCorpusStore::new(&config.corpus_path));
            let manager = IndexManager::new(provider, store, config.vector_index_path.clone());

            let snapshot = manager.rebuild().await?;
            println!(
                "Indexed {} documents (dimension {}, model {}) into {}",
                snapshot.len(),
                snapshot.dim(),
                snapshot.embedding_model,
                manager.snapshot_dir().display()
            );
        }
        Some(Commands::Similar {
            query,
            sector,
            top_k,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            logger::setup_logging(None, &config.log_level)?;

            let store = Arc::new(JsonCorpusStore::new(&config.corpus_path));
            let finder = SimilarFinder::from_config(&config, store)?;
            let matches = finder.find_by_query(&query, &sector, top_k).await?;
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
        None => {
            // Default: start server with default config
            let config = load_config(cli.config.as_deref())?;
            serve(config).await?;
        }
    }

    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    logger::setup_logging(Some(config.log_dir.as_path()), &config.log_level)?;

    tracing::info!("vecsearch starting...");
    tracing::info!("Configuration loaded:");
    tracing::info!("  Bind: {}", config.server_bind_address());
    tracing::info!("  Corpus: {}", config.corpus_path.display());
    tracing::info!("  Index: {}", config.vector_index_path.display());
    tracing::info!(
        "  Embeddings: {:?} ({})",
        config.embedding_provider,
        config.embedding_model
    );

    println!("Server listening on http://{}", config.server_bind_address());

    vecsearch_server::start_server(config).await?;
    Ok(())
}
