//! folio CLI - chunk, index and chat with long documents.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use folio_agent::Message;
use folio_chunk::ChunkAssembler;
use folio_core::{FolioConfig, FolioError, PassageIndex, Result};
use folio_service::{load_pages, resolve_token_counter, FolioService};
use folio_store::SqliteStore;

/// folio - Ask questions about your books
#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: $CONFIG_DIR/folio/config.toml, then ./folio.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding the config file
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a document and print the chunks as JSON
    Chunk {
        /// PDF or text file
        path: PathBuf,

        /// Override chunking.max_tokens
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Override chunking.overlap_tokens
        #[arg(long)]
        overlap_tokens: Option<usize>,
    },

    /// Index a document for one owner
    Ingest {
        /// PDF or text file
        path: PathBuf,

        /// Owner identity
        #[arg(short, long)]
        owner: String,

        /// Source name to store (default: the file name)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Delete an owner's copy of a document
    Delete {
        /// Source name
        source: String,

        /// Owner identity
        #[arg(short, long)]
        owner: String,
    },

    /// List an owner's documents
    Documents {
        /// Owner identity
        #[arg(short, long)]
        owner: String,
    },

    /// Search an owner's passages
    Search {
        /// Search query
        query: String,

        /// Owner identity
        #[arg(short, long)]
        owner: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,
    },

    /// Ask a question about an owner's documents
    Ask {
        /// The question
        question: String,

        /// Owner identity
        #[arg(short, long)]
        owner: String,

        /// JSON file holding prior messages; updated with this turn
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print every message of the turn
        #[arg(long)]
        trace: bool,
    },

    /// Show statistics
    Stats {
        /// Owner to get stats for (all if not specified)
        #[arg(long)]
        owner: Option<String>,
    },

    /// Write a default config file and create the database
    Init,
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `init` may name a config file that does not exist yet; it starts from defaults.
fn load_config(path: Option<&Path>, database: Option<PathBuf>, creating: bool) -> Result<FolioConfig> {
    let mut config = match path {
        Some(path) if creating && !path.exists() => FolioConfig::default(),
        Some(path) => FolioConfig::load(path)?,
        None => FolioConfig::load_default()?,
    };
    if let Some(database) = database {
        config.database.path = database;
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let creating = matches!(cli.command, Commands::Init);
    let config = load_config(cli.config.as_deref(), cli.database, creating)?;

    match cli.command {
        Commands::Init => init(&config, cli.config.as_deref()),
        Commands::Chunk {
            path,
            max_tokens,
            overlap_tokens,
        } => chunk(&config, &path, max_tokens, overlap_tokens),
        Commands::Ingest { path, owner, source } => {
            let service = FolioService::from_config(config)?;
            ingest(&service, &path, &owner, source).await
        }
        // Store-only commands skip loading the embedding model and tokenizer.
        Commands::Delete { source, owner } => {
            let store = SqliteStore::from_config(&config.database)?;
            let removed = store.delete(&source, &owner).await?;
            println!("Deleted '{}' for {} ({} passages)", source, owner, removed);
            Ok(())
        }
        Commands::Documents { owner } => {
            let store = SqliteStore::from_config(&config.database)?;
            documents(&store, &owner).await
        }
        Commands::Search { query, owner, top_k } => {
            let service = FolioService::from_config(config)?;
            search(&service, &query, &owner, top_k).await
        }
        Commands::Ask {
            question,
            owner,
            history,
            trace,
        } => {
            let service = FolioService::from_config(config)?;
            ask(&service, &question, &owner, history.as_deref(), trace).await
        }
        Commands::Stats { owner } => {
            let store = SqliteStore::from_config(&config.database)?;
            let stats = store.stats(owner.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}

fn init(config: &FolioConfig, path: Option<&Path>) -> Result<()> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => dirs::config_dir()
            .ok_or_else(|| FolioError::Config {
                message: "Could not determine config directory".to_string(),
            })?
            .join("folio")
            .join("config.toml"),
    };

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
    } else {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(config).map_err(|e| FolioError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;
        fs::write(&config_path, text)?;
        println!("Wrote config to: {}", config_path.display());
    }

    if let Some(parent) = config.database.path.parent() {
        fs::create_dir_all(parent)?;
    }
    // Opening creates the schema; the embedding model is not needed for this.
    SqliteStore::from_config(&config.database)?;
    println!("Initialized database at: {}", config.database.path.display());
    Ok(())
}

fn chunk(
    config: &FolioConfig,
    path: &Path,
    max_tokens: Option<usize>,
    overlap_tokens: Option<usize>,
) -> Result<()> {
    let mut budget = config.chunking.budget();
    if let Some(max_tokens) = max_tokens {
        budget.max_tokens = max_tokens;
    }
    if let Some(overlap_tokens) = overlap_tokens {
        budget.overlap_tokens = overlap_tokens;
    }

    let pages = load_pages(path)?;
    let assembler = ChunkAssembler::new(resolve_token_counter(&config.chunking.encoding)?);
    let chunks = assembler.assemble(&pages, &budget)?;

    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}

async fn ingest(service: &FolioService, path: &Path, owner: &str, source: Option<String>) -> Result<()> {
    let source = match source {
        Some(source) => source,
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| FolioError::invalid_argument(format!("No file name in {}", path.display())))?,
    };

    let pages = load_pages(path)?;
    let cancel = cancel_on_ctrl_c();
    let report = service.ingest_with_cancel(&source, owner, &pages, &cancel).await?;

    if report.unchanged {
        println!("'{}' is unchanged ({} chunks)", report.source, report.chunks);
    } else {
        println!(
            "Ingested '{}' for {}: {} pages, {} chunks",
            report.source, report.owner, report.pages, report.chunks
        );
    }
    Ok(())
}

async fn documents(index: &dyn PassageIndex, owner: &str) -> Result<()> {
    let docs = index.list_documents(owner).await?;
    if docs.is_empty() {
        println!("No documents for {}", owner);
        return Ok(());
    }

    for doc in docs {
        println!("{}  ({} pages, {} chunks)", doc.source, doc.page_count, doc.chunk_count);
    }
    Ok(())
}

async fn search(service: &FolioService, query: &str, owner: &str, top_k: usize) -> Result<()> {
    let hits = service.search(query, owner, top_k).await?;
    if hits.is_empty() {
        println!("No results found for '{}'", query);
        return Ok(());
    }

    for hit in hits {
        let chapter = hit.chapter.map(|c| format!(", chapter {}", c)).unwrap_or_default();
        println!(
            "{}. [{:.3}] {} (page {}{})",
            hit.rank, hit.score, hit.source, hit.page_start, chapter
        );
        println!("   {}\n", hit.text);
    }
    Ok(())
}

async fn ask(service: &FolioService, question: &str, owner: &str, history: Option<&Path>, trace: bool) -> Result<()> {
    let prior: Vec<Message> = match history {
        Some(path) if path.exists() => serde_json::from_str(&fs::read_to_string(path)?)?,
        _ => Vec::new(),
    };
    debug!("Loaded {} prior messages", prior.len());

    let cancel = cancel_on_ctrl_c();
    let outcome = service.chat_with_cancel(prior, question, owner, &cancel).await?;

    if trace {
        for message in &outcome.messages {
            eprintln!("{}", serde_json::to_string(message)?);
        }
        eprintln!("-- {:?} after {} iterations", outcome.status, outcome.iterations);
    }

    println!("{}", outcome.answer);

    if let Some(path) = history {
        fs::write(path, serde_json::to_string_pretty(&outcome.messages)?)?;
    }
    Ok(())
}

/// Token that fires on Ctrl-C, abandoning the in-flight operation.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}
