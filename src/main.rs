//! # Kasumi CLI (`kasumi`)
//!
//! Developer companion for apps built on the SDK. It drives the outbound
//! embedding operations against the remote service and can serve a
//! configured app locally so the platform integration can be exercised
//! before any spiders are written.
//!
//! ## Usage
//!
//! ```bash
//! kasumi --config ./kasumi.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kasumi embed "<text>"` | Embed a text and print the vector as JSON |
//! | `kasumi similar` | Rank stored vectors by similarity to an input vector |
//! | `kasumi get <id>` | Fetch the stored vector registered under an id |
//! | `kasumi insert <id>` | Store a vector under an id (1000/day quota) |
//! | `kasumi serve` | Serve the app's search/info endpoints |
//!
//! ## Examples
//!
//! ```bash
//! # Embed a query
//! kasumi embed "Poppin'Party keyboardist" --config ./kasumi.toml
//!
//! # Store a vector read from a file
//! kasumi insert doc-42 --file ./doc-42.json --config ./kasumi.toml
//!
//! # Similarity search over stored vectors, vector on stdin
//! kasumi embed "Arisa" | kasumi similar --limit 5
//!
//! # Serve the configured app for local platform testing
//! kasumi serve --config ./kasumi.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use kasumi::traits::DefaultSearchStrategy;
use kasumi::{Kasumi, KasumiConfig};

/// Kasumi SDK command-line companion.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file carrying the app's platform credentials.
#[derive(Parser)]
#[command(
    name = "kasumi",
    about = "Kasumi SDK companion — embedding operations and a local app server",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./kasumi.toml`. Credentials, the service endpoint, and
    /// server settings are read from this file.
    #[arg(long, global = true, default_value = "./kasumi.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Embed a text and print the vector as a JSON array.
    ///
    /// Billed against the app's own token.
    Embed {
        /// The text to embed.
        text: String,
    },

    /// Rank stored vectors by similarity to an input vector.
    ///
    /// The query vector is read as a JSON array from `--file`, or from
    /// stdin when no file is given.
    Similar {
        /// Maximum number of items to return.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Read the query vector from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Fetch the stored vector registered under an id.
    Get {
        /// Identifier the vector was inserted under.
        id: String,
    },

    /// Store a vector under an id.
    ///
    /// Free of KaToken cost, but the service enforces a quota of 1000
    /// inserts per app per day.
    Insert {
        /// Identifier to store the vector under.
        id: String,

        /// Read the vector from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Serve the app's search/info endpoints.
    ///
    /// Registers the default search strategy for the columns declared in
    /// the config's `[search_desc]` table. Spiders can only be registered
    /// from code, so a plain `kasumi serve` answers every search with an
    /// empty result set — enough to exercise the platform handshake.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = KasumiConfig::from_file(&cli.config)?;
    let mut app = Kasumi::new(config)?;

    match cli.command {
        Commands::Embed { text } => {
            let embedding = app.embed_text(&text).await?;
            println!("{}", serde_json::to_string(&embedding)?);
        }
        Commands::Similar { limit, file } => {
            let embedding = read_vector(file.as_deref())?;
            let items = app.search_embedding_similarity(&embedding, limit).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Commands::Get { id } => {
            let item = app.get_embedding_by_id(&id).await?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Commands::Insert { id, file } => {
            let embedding = read_vector(file.as_deref())?;
            let inserted = app.insert_embedding(&embedding, &id).await?;
            if inserted {
                println!("Inserted embedding '{}' ({} dims).", id, embedding.len());
            } else {
                println!("Embedding '{}' already exists; nothing inserted.", id);
            }
        }
        Commands::Serve => {
            if !app.config().search_desc().is_empty() {
                let strategy = Arc::new(DefaultSearchStrategy::from_config(app.config()));
                app.add_search_strategy(strategy)?;
            }
            if app.spiders().is_empty() {
                tracing::warn!("no spiders registered; searches will return empty results");
            }
            app.run_forever().await?;
        }
    }

    Ok(())
}

/// Reads a JSON `[f32, ...]` vector from a file, or from stdin when no
/// file is given.
fn read_vector(file: Option<&Path>) -> anyhow::Result<Vec<f32>> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vector file: {}", path.display()))?,
        None => {
            use std::io::Read;
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let vector: Vec<f32> = serde_json::from_str(raw.trim())
        .context("Vector must be a JSON array of numbers, e.g. [0.1, -0.2, 0.3]")?;
    if vector.is_empty() {
        anyhow::bail!("Vector must not be empty");
    }
    Ok(vector)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kasumi=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
