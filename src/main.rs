//! # Vault Index CLI (`vidx`)
//!
//! The `vidx` binary keeps a record of a markdown vault's files and a
//! semantic-search index derived from them.
//!
//! ## Usage
//!
//! ```bash
//! vidx --config ./config/vidx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vidx init` | Create the state directory and store schema |
//! | `vidx search "<query>"` | Rank documents by semantic similarity |
//! | `vidx recent --hours 24` | Documents modified recently |
//! | `vidx files [--all] [--path P]` | Tracked files, history, or one record |
//! | `vidx status` | Store, scan, and index overview |
//! | `vidx index scan [--full]` | Reconcile the store with the vault |
//! | `vidx index build [--force]` | Full scan, then rebuild the index if stale |
//! | `vidx config show` | Effective configuration |
//! | `vidx config auto-update` | Enable/disable auto-sync or change its interval |
//!
//! `search`, `recent`, `files`, and `status` first run a throttled
//! incremental scan and, when enough changed, rebuild the index. That
//! step is best-effort: failures are logged and the command proceeds.
//!
//! Logs go to stderr. Use `--verbose` or `RUST_LOG=vault_index=debug`
//! for more detail.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vault_index::{config, config_cmd, files_cmd, index_cmd, search, status, sync};

/// Vault Index CLI: file-state tracking and semantic search for a
/// markdown vault.
#[derive(Parser)]
#[command(
    name = "vidx",
    about = "Vault Index: file-state tracking and semantic search for a markdown vault",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vidx.toml")]
    config: PathBuf,

    /// Log progress at info level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the state directory and store schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Search documents by semantic similarity.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// List documents modified within the last N hours.
    Recent {
        #[arg(long, default_value_t = 24.0)]
        hours: f64,
    },

    /// List tracked files.
    Files {
        /// Include deleted files with their status.
        #[arg(long)]
        all: bool,

        /// Show one record by relative path.
        #[arg(long, conflicts_with = "all")]
        path: Option<String>,
    },

    /// Show store, scan, and index status.
    Status,

    /// Manage the file-state store and embedding index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Inspect or change configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Reconcile the store with the vault.
    Scan {
        /// Walk the whole vault instead of only files newer than the last scan.
        #[arg(long)]
        full: bool,
    },
    /// Full scan, then rebuild the embedding index if it is stale.
    Build {
        /// Rebuild even if the index is up to date.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Enable or disable auto-sync, or change its interval.
    AutoUpdate {
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        #[arg(long)]
        disable: bool,

        /// Minimum minutes between automatic scans.
        #[arg(long)]
        interval: Option<u64>,
    },
}

impl Commands {
    /// Whether the command runs an auto-sync first.
    fn wants_auto_sync(&self) -> bool {
        !matches!(
            self,
            Commands::Init | Commands::Index { .. } | Commands::Config { .. }
        )
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "vault_index=info"
    } else {
        "vault_index=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    if cli.command.wants_auto_sync() {
        sync::run_auto_sync(&cfg).await;
    }

    match cli.command {
        Commands::Init => {
            index_cmd::run_init(&cfg).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Recent { hours } => {
            files_cmd::run_recent(&cfg, hours).await?;
        }
        Commands::Files { all, path } => {
            files_cmd::run_files(&cfg, all, path.as_deref()).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Scan { full } => {
                index_cmd::run_scan(&cfg, full).await?;
            }
            IndexAction::Build { force } => {
                index_cmd::run_build(&cfg, force).await?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                config_cmd::run_show(&cfg)?;
            }
            ConfigAction::AutoUpdate {
                enable,
                disable,
                interval,
            } => {
                config_cmd::run_auto_update(&cfg, enable, disable, interval)?;
            }
        },
    }

    Ok(())
}
