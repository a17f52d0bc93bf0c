//! Ancon CLI - query and update a versioned merkle store from the shell
//!
//! Usage:
//!   ancon --db ./data set doc/1 bafy...
//!   ancon --db ./data prove doc/1
//!   ancon verify --root <hex> --key doc/1 --value bafy... --proof 0x7b...
//!   ancon config init

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ancon")]
#[command(about = "Ancon CLI - versioned merkle store with ICS23 proofs", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// RocksDB directory, overrides the config file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Treat keys and values as hex instead of UTF-8
    #[arg(long, global = true)]
    hex: bool,

    /// Print decoded JSON instead of the 0x envelope
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Insert or update a key, then save a version
    Set { key: String, value: String },

    /// Remove a key, then save a version if it existed
    Remove { key: String },

    /// Read a key, optionally at a saved version
    Get {
        key: String,

        #[arg(long)]
        version: Option<i64>,
    },

    /// Read the entry at a sorted index
    GetByIndex { index: u64 },

    /// Check whether a key exists
    Has { key: String },

    /// Read a key with an ICS23 membership proof
    Prove {
        key: String,

        #[arg(long)]
        version: Option<i64>,
    },

    /// Check a proof envelope against a root hash, without opening a store
    Verify {
        /// Root hash (hex)
        #[arg(long)]
        root: String,

        #[arg(long)]
        key: String,

        #[arg(long)]
        value: String,

        /// Envelope printed by `prove`
        #[arg(long)]
        proof: String,
    },

    /// Root hash of the latest tree
    Hash,

    /// Save the current tree as a new version
    Save,

    /// Resume from an older version
    LoadVersion {
        version: i64,

        /// Delete every saved version above it so writes can replace them
        #[arg(long)]
        overwrite: bool,
    },

    /// Latest saved version
    Version,

    /// All saved versions
    Versions,

    /// Number of keys
    Size,

    /// List entries in `[start, end)`
    List {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(long)]
        descending: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Initialize configuration
    Init {
        /// Config file path
        #[arg(long)]
        path: Option<String>,
    },

    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Configuration value
        value: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let output = commands::Output {
        hex: cli.hex,
        json: cli.json,
    };

    match cli.command {
        Commands::Config { action } => commands::config::handle(action, cli.config.as_deref()),
        Commands::Verify {
            root,
            key,
            value,
            proof,
        } => commands::proof::verify(&output, &root, &key, &value, &proof),
        command => {
            let mut service_config = config::load(cli.config.as_deref())?;
            if let Some(db) = cli.db {
                service_config.db_path = Some(db);
            }
            commands::tree::handle(command, &service_config, &output)
        }
    }
}
