//! Store and index health overview.
//!
//! `vidx status` summarises what the store knows about the vault, when
//! it was last scanned and indexed, and whether the index is stale.

use anyhow::Result;

use crate::config::Config;
use crate::index_store::{self, IndexPaths};
use crate::staleness;
use crate::state::{ConfigProvider, FileConfigProvider};
use crate::store::FileStateStore;

/// Run the status command: query the store and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    let provider = FileConfigProvider::new(config.clone());
    let store = FileStateStore::open(&config.store_path()).await?;
    let counts = store.counts().await?;
    let max_mtime = store.get_max_mtime().await;
    let last_build = provider.last_build_timestamp();
    let auto = provider.auto_update_settings();

    let store_size = std::fs::metadata(store.path())
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Vault Index Status");
    println!("==================");
    println!();
    println!("  Vault:       {}", config.vault_root().display());
    println!("  State dir:   {}", config.state_dir().display());
    println!("  Store size:  {}", format_bytes(store_size));
    println!();
    println!("  Documents:   {} current, {} deleted", counts.current, counts.deleted);
    println!(
        "  Newest edit: {}",
        max_mtime.map(format_ts_relative).unwrap_or_else(|| "n/a".to_string())
    );
    println!("  Last scan:   {}", format_ts_or_never(auto.last_scan_timestamp));
    println!("  Last build:  {}", format_ts_or_never(last_build));

    let index_line = match index_store::load_index(&IndexPaths::from_config(config)) {
        Ok(Some(index)) => format!(
            "{} rows x {} dims ({})",
            index.len(),
            index.dims(),
            index.model
        ),
        Ok(None) => "not built".to_string(),
        Err(e) => format!("unusable: {}", e),
    };
    println!("  Index:       {}", index_line);

    let pending = match staleness::rebuild_reason(max_mtime, last_build, false) {
        Some(reason) => format!("yes ({})", reason),
        None => "no".to_string(),
    };
    println!("  Rebuild:     {}", pending);

    if auto.enabled {
        println!(
            "  Auto-update: every {} min",
            auto.interval_secs.div_ceil(60)
        );
    } else {
        println!("  Auto-update: disabled");
    }
    println!();

    store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_or_never(ts: f64) -> String {
    if ts <= 0.0 {
        "never".to_string()
    } else {
        format_ts_relative(ts)
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
pub(crate) fn format_ts_relative(ts: f64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts as i64;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

pub(crate) fn format_ts_iso(ts: f64) -> String {
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
