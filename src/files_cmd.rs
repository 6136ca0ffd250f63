//! `vidx files` and `vidx recent`: read-only views of the file-state store.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::models::FileRecord;
use crate::scanner::unix_now;
use crate::status::{format_ts_iso, format_ts_relative};
use crate::store::FileStateStore;

/// List current records, or every record with `all`, or one record by path.
pub async fn run_files(config: &Config, all: bool, path: Option<&str>) -> Result<()> {
    let store = FileStateStore::open(&config.store_path()).await?;

    if let Some(path) = path {
        let details = store.get_file(path).await?;
        store.close().await;
        let details = match details {
            Some(d) => d,
            None => bail!("No record for '{}'", path),
        };
        println!("{}", details.record.path);
        println!("  status:     {}", details.record.status);
        println!("  size:       {}", details.record.size);
        println!("  modified:   {}", format_ts_iso(details.record.mtime));
        println!("  first seen: {}", format_ts_iso(details.first_seen));
        println!("  updated:    {}", format_ts_iso(details.updated_at));
        return Ok(());
    }

    if all {
        let records = store.all_files().await?;
        store.close().await;
        if records.is_empty() {
            println!("No files recorded. Run `vidx index scan --full`.");
            return Ok(());
        }
        println!("{:<8} {:>10}  {:<16}  PATH", "STATUS", "SIZE", "MODIFIED");
        for d in &records {
            println!(
                "{:<8} {:>10}  {:<16}  {}",
                d.record.status,
                d.record.size,
                format_ts_iso(d.record.mtime),
                d.record.path
            );
        }
        return Ok(());
    }

    let records = store.get_current_files().await?;
    store.close().await;
    print_records(&records);
    Ok(())
}

/// List current records modified within the last `hours`.
pub async fn run_recent(config: &Config, hours: f64) -> Result<()> {
    if hours <= 0.0 {
        bail!("--hours must be positive");
    }
    let store = FileStateStore::open(&config.store_path()).await?;
    let since = unix_now() - hours * 3600.0;
    let records = store.recent_files(since).await?;
    store.close().await;

    if records.is_empty() {
        println!("No files modified in the last {} hours.", hours);
        return Ok(());
    }
    for r in &records {
        println!("{:<16}  {}", format_ts_relative(r.mtime), r.path);
    }
    Ok(())
}

fn print_records(records: &[FileRecord]) {
    if records.is_empty() {
        println!("No current files. Run `vidx index scan --full`.");
        return;
    }
    println!("{:>10}  {:<16}  PATH", "SIZE", "MODIFIED");
    for r in records {
        println!("{:>10}  {:<16}  {}", r.size, format_ts_iso(r.mtime), r.path);
    }
    println!();
    println!("{} files", records.len());
}
