//! `vidx init`, `vidx index scan`, and `vidx index build`.
//!
//! These commands manage the store and index directly and are never
//! preceded by an auto-sync.

use anyhow::{bail, Context, Result};

use crate::builder::IndexBuilder;
use crate::config::Config;
use crate::embedding;
use crate::index_store::IndexPaths;
use crate::scanner::{unix_now, DocumentFilter, ScanMode, Scanner};
use crate::staleness;
use crate::state::{ConfigProvider, FileConfigProvider, SyncState};
use crate::store::FileStateStore;

/// Create the state directory, store schema, and sync state file.
pub async fn run_init(config: &Config) -> Result<()> {
    let store_path = config.store_path();
    FileStateStore::initialize(&store_path)
        .await
        .with_context(|| format!("Failed to initialize store at {}", store_path.display()))?;

    let state_path = config.sync_state_path();
    if !state_path.exists() {
        SyncState::default().save(&state_path)?;
    }

    println!("Vault index initialized.");
    println!("  state dir: {}", config.state_dir().display());
    Ok(())
}

/// Reconcile the store with the vault and print the change counts.
pub async fn run_scan(config: &Config, full: bool) -> Result<()> {
    let mut provider = FileConfigProvider::new(config.clone());
    let store = FileStateStore::open(&config.store_path()).await?;
    let scanner = Scanner::new(config.vault_root(), DocumentFilter::from_config(&config.vault)?);
    let mode = if full {
        ScanMode::Full
    } else {
        ScanMode::Incremental
    };

    let started = unix_now();
    let counts = scanner
        .try_scan(&store, mode)
        .await
        .context("Scan failed; the store was not modified")?;
    provider.set_last_scan_timestamp(started)?;

    println!("index scan ({})", if full { "full" } else { "incremental" });
    println!("  added: {}", counts.added);
    println!("  modified: {}", counts.modified);
    println!("  deleted: {}", counts.deleted);

    store.close().await;
    Ok(())
}

/// Full scan, then rebuild the embedding index if it is stale or `force` is set.
pub async fn run_build(config: &Config, force: bool) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let mut provider = FileConfigProvider::new(config.clone());
    let root = config.vault_root();
    let store = FileStateStore::open(&config.store_path()).await?;
    let scanner = Scanner::new(root.clone(), DocumentFilter::from_config(&config.vault)?);

    let started = unix_now();
    let scan = scanner.scan(&store, ScanMode::Full).await;
    if !scan.success {
        store.close().await;
        bail!(
            "Scan of {} failed; index not rebuilt. Run with --verbose for details.",
            root.display()
        );
    }
    provider.set_last_scan_timestamp(started)?;

    let max_mtime = store.get_max_mtime().await;
    let reason =
        match staleness::rebuild_reason(max_mtime, provider.last_build_timestamp(), force) {
            Some(reason) => reason,
            None => {
                println!("index build");
                println!("  index is up to date (use --force to rebuild anyway)");
                store.close().await;
                return Ok(());
            }
        };

    let model = embedding::create_model(&config.embedding)?;
    let builder = IndexBuilder::new(root, IndexPaths::from_config(config));
    let report = match builder.try_build(&store, model.as_ref()).await {
        Ok(report) => report,
        Err(e) => {
            store.close().await;
            return Err(anyhow::Error::new(e)
                .context("Index build failed; the previous index was left in place"));
        }
    };
    provider.set_last_build_timestamp(started)?;

    println!("index build");
    println!("  reason: {}", reason);
    println!("  scan: +{} added, ~{} modified", scan.added, scan.modified);
    println!("  documents: {}", report.documents);
    if report.skipped > 0 {
        println!("  skipped (unreadable): {}", report.skipped);
    }
    println!("  model: {} ({} dims)", model.model_name(), report.dims);

    store.close().await;
    Ok(())
}
