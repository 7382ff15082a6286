//! # Copilot Docs CLI (`cdocs`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cdocs init` | Create the SQLite database and schema |
//! | `cdocs topics` | List topics found under the data directory |
//! | `cdocs ingest [--topic T]` | Populate empty topic collections |
//! | `cdocs chunk <file>` | Preview the chunks a file produces |
//! | `cdocs retrieve <topic> "<query>"` | Print the re-ranked, token-budgeted context |
//! | `cdocs trace <trace.json>` | List the recipient addresses of a trace |
//! | `cdocs contracts <trace.json> <sources.json>` | Build the contract-source debugging context |
//!
//! ## Examples
//!
//! ```bash
//! cdocs init --config ./config/cdocs.toml
//! cdocs ingest --topic uniswap
//! cdocs retrieve uniswap "how are swap fees distributed" --explain
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use copilot_docs::{config, ingest, migrate, retrieve, topics, trace_cmd};

/// Topic-scoped documentation retrieval with cross-encoder re-ranking.
#[derive(Parser)]
#[command(name = "cdocs", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cdocs.toml")]
    config: PathBuf,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// List topics, their collections and record counts.
    Topics,

    /// Populate topic collections that have no records yet.
    ///
    /// Collections that already hold records are skipped; delete the
    /// database to rebuild.
    Ingest {
        /// Only ingest this topic.
        #[arg(long)]
        topic: Option<String>,
    },

    /// Extract and chunk a single file without storing anything.
    Chunk {
        /// PDF, Markdown or text file.
        file: PathBuf,
    },

    /// Retrieve the context for a query from a topic.
    Retrieve {
        /// Topic name (a subdirectory of the data directory).
        topic: String,

        /// Natural-language query.
        query: String,

        /// List the ranked candidates before the context.
        #[arg(long)]
        explain: bool,
    },

    /// List the recipient addresses of a saved transaction trace.
    Trace {
        /// Trace JSON file.
        trace: PathBuf,
    },

    /// Combine a trace with verified contract sources under the token budget.
    Contracts {
        /// Trace JSON file.
        trace: PathBuf,

        /// Explorer source-code responses keyed by address.
        sources: PathBuf,
    },
}

fn init_telemetry(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli.log_level);

    // `trace` works without a config file.
    let load = || config::load_config(&cli.config);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&load()?).await?;
            println!("Database initialized successfully.");
        }
        Commands::Topics => {
            topics::run_topics(&load()?).await?;
        }
        Commands::Ingest { topic } => {
            ingest::run_ingest(&load()?, topic.as_deref()).await?;
        }
        Commands::Chunk { file } => {
            ingest::run_chunk_preview(&load()?, &file).await?;
        }
        Commands::Retrieve {
            topic,
            query,
            explain,
        } => {
            retrieve::run_retrieve(&load()?, &topic, &query, explain).await?;
        }
        Commands::Trace { trace } => {
            trace_cmd::run_trace(&trace)?;
        }
        Commands::Contracts { trace, sources } => {
            trace_cmd::run_contracts(&load()?, &trace, &sources).await?;
        }
    }

    Ok(())
}
