//! # Ragmill CLI
//!
//! ```bash
//! ragmill --config ./config/ragmill.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragmill init` | Create the keyspace, chunk table, and ANN index |
//! | `ragmill ingest <dir>` | Chunk and embed a document corpus, write it to storage |
//! | `ragmill load <file>` | Bulk-insert pre-embedded records from a JSON file |
//! | `ragmill ask "<q>"` | Answer one question grounded in retrieved chunks |
//! | `ragmill chat` | Interactive question loop |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragmill::{chat, config, ingest, migrate};

/// Ragmill, a retrieval-augmented generation pipeline over a ScyllaDB
/// vector store.
#[derive(Parser)]
#[command(
    name = "ragmill",
    about = "Retrieval-augmented generation pipeline over a ScyllaDB vector store",
    version,
    long_about = "Ragmill chunks a document corpus with a semantic double-merging splitter, \
    embeds the chunks via Ollama, persists them in a vector-indexed ScyllaDB table, and \
    answers questions by streaming a completion grounded in the closest chunks."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the file does not exist, localhost defaults are used and
    /// `SCYLLA_*` environment variables still apply.
    #[arg(long, global = true, default_value = "./config/ragmill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the keyspace, chunk table, and ANN index. Idempotent.
    Init,

    /// Chunk and embed a document corpus, then write it to storage.
    ///
    /// Re-running duplicates records: chunk ids are assigned at ingestion
    /// time, not derived from content.
    Ingest {
        /// Directory to load documents from.
        dir: PathBuf,

        /// Target table (defaults to the configured ingest table).
        #[arg(long)]
        table: Option<String>,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Bulk-insert pre-embedded records from a JSON array of
    /// `{chunk_id, text, embedding}` objects.
    Load {
        /// Path to the JSON file.
        file: PathBuf,

        /// Target table (defaults to the configured ingest table).
        #[arg(long)]
        table: Option<String>,

        /// Maximum number of records to insert.
        #[arg(long, default_value_t = 1000)]
        limit: usize,
    },

    /// Answer one question grounded in retrieved chunks.
    Ask {
        /// The question to answer.
        question: String,

        /// Table to retrieve from (defaults to the configured ingest table).
        #[arg(long)]
        table: Option<String>,

        /// Number of chunks to ground the answer on.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Interactive question loop. `exit`, `quit`, or EOF ends it.
    Chat {
        /// Table to retrieve from (defaults to the configured ingest table).
        #[arg(long)]
        table: Option<String>,

        /// Number of chunks to ground each answer on.
        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Schema initialized successfully.");
        }
        Commands::Ingest { dir, table, limit } => {
            ingest::run_ingest(&cfg, &dir, table, limit).await?;
        }
        Commands::Load { file, table, limit } => {
            ingest::run_load(&cfg, &file, table, limit).await?;
        }
        Commands::Ask {
            question,
            table,
            top_k,
        } => {
            chat::run_ask(&cfg, &question, table, top_k).await?;
        }
        Commands::Chat { table, top_k } => {
            chat::run_chat(&cfg, table, top_k).await?;
        }
    }

    Ok(())
}
