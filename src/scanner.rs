//! Reconciles the vault directory with the file-state store.
//!
//! Both scan modes share one diff-and-commit core; they differ only in
//! which files the walk records and how deletions are detected:
//!
//! | Mode | Walk records | Deletion check |
//! |------|--------------|----------------|
//! | [`ScanMode::Full`] | every document | known path not seen in the walk |
//! | [`ScanMode::Incremental`] | documents with `mtime > max(mtime)` | known path not revisited and no longer on disk |
//!
//! All mutations from one scan are committed in a single transaction,
//! and a scan that finds nothing to change issues no write at all.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::models::{FileRecord, FileStatus, ScanCounts, ScanResult};
use crate::store::{self, FileStateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Walk and compare everything.
    Full,
    /// Only look at files newer than the newest known record, and stat
    /// the remaining known paths to catch deletions.
    Incremental,
}

/// Decides which files under the root count as documents.
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl DocumentFilter {
    pub fn new(include: &[String], exclude: &[String], follow_symlinks: bool) -> Result<Self> {
        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/.obsidian/**".to_string(),
            "**/.trash/**".to_string(),
        ];
        excludes.extend(exclude.iter().cloned());

        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(&excludes)?,
            follow_symlinks,
        })
    }

    pub fn from_config(vault: &VaultConfig) -> Result<Self> {
        Self::new(
            &vault.include_globs,
            &vault.exclude_globs,
            vault.follow_symlinks,
        )
    }

    /// Markdown files only, default excludes.
    pub fn markdown() -> Result<Self> {
        Self::new(&["**/*.md".to_string()], &[], false)
    }

    pub fn is_document(&self, relative: &str) -> bool {
        !self.exclude.is_match(relative) && self.include.is_match(relative)
    }

    /// True when nothing under the directory `relative` can be a document.
    pub fn is_excluded_dir(&self, relative: &str) -> bool {
        // NUL never appears in a real file name, so it stands in for any child.
        self.exclude.is_match(relative) || self.exclude.is_match(format!("{}/\0", relative))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// What the walk observed for one document.
#[derive(Debug, Clone, Copy)]
struct Observed {
    mtime: f64,
    size: u64,
}

pub struct Scanner {
    root: PathBuf,
    filter: DocumentFilter,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>, filter: DocumentFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    /// Run a scan and report the outcome.
    ///
    /// Errors are logged and turned into a failed [`ScanResult`]; nothing
    /// is committed in that case.
    pub async fn scan(&self, store: &FileStateStore, mode: ScanMode) -> ScanResult {
        match self.try_scan(store, mode).await {
            Ok(counts) => {
                tracing::info!(
                    root = %self.root.display(),
                    ?mode,
                    added = counts.added,
                    modified = counts.modified,
                    deleted = counts.deleted,
                    "scan complete"
                );
                counts.into()
            }
            Err(e) => {
                tracing::error!(root = %self.root.display(), ?mode, "scan failed: {}", e);
                ScanResult::failed()
            }
        }
    }

    /// Run a scan, returning full counts or the underlying error.
    pub async fn try_scan(&self, store: &FileStateStore, mode: ScanMode) -> Result<ScanCounts> {
        if !self.root.exists() {
            return Err(VaultError::RootMissing(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(VaultError::Scan(format!(
                "document root is not a directory: {}",
                self.root.display()
            )));
        }

        let before: HashMap<String, FileRecord> = store
            .get_current_files()
            .await?
            .into_iter()
            .map(|r| (r.path.clone(), r))
            .collect();

        let since = match mode {
            ScanMode::Full => None,
            ScanMode::Incremental => Some(store.get_max_mtime().await.unwrap_or(0.0)),
        };

        let root = self.root.clone();
        let filter = self.filter.clone();
        let scanned = tokio::task::spawn_blocking(move || walk_documents(&root, &filter, since))
            .await
            .map_err(|e| VaultError::Scan(format!("walk task failed: {}", e)))??;

        let mut upserts = Vec::new();
        let mut counts = ScanCounts::default();

        for (path, seen) in &scanned {
            match before.get(path) {
                None => {
                    tracing::debug!(path = %path, "added");
                    counts.added += 1;
                }
                Some(prev) if seen.mtime > prev.mtime || seen.size != prev.size => {
                    tracing::debug!(path = %path, "modified");
                    counts.modified += 1;
                }
                Some(_) => continue,
            }
            upserts.push(FileRecord {
                path: path.clone(),
                mtime: seen.mtime,
                size: seen.size,
                status: FileStatus::Current,
            });
        }

        let mut deletions = Vec::new();
        for path in before.keys() {
            if scanned.contains_key(path) {
                continue;
            }
            let gone = match mode {
                ScanMode::Full => true,
                ScanMode::Incremental => !tokio::fs::try_exists(self.root.join(path)).await?,
            };
            if gone {
                tracing::debug!(path = %path, "deleted");
                deletions.push(path.clone());
            }
        }
        deletions.sort();
        counts.deleted = deletions.len() as u64;

        if counts.is_empty() {
            return Ok(counts);
        }

        let now = unix_now();
        let mut tx = store.begin().await?;
        for record in &upserts {
            store::upsert(&mut *tx, record, now).await?;
        }
        for path in &deletions {
            store::mark_deleted(&mut *tx, path, now).await?;
        }
        tx.commit().await?;

        Ok(counts)
    }
}

/// Walk `root` and record every document, or only those newer than
/// `since` when given.
fn walk_documents(
    root: &Path,
    filter: &DocumentFilter,
    since: Option<f64>,
) -> Result<BTreeMap<String, Observed>> {
    let mut scanned = BTreeMap::new();

    let walker = WalkDir::new(root)
        .follow_links(filter.follow_symlinks)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            match entry.path().strip_prefix(root) {
                Ok(rel) => !filter.is_excluded_dir(&relative_key(rel)),
                Err(_) => true,
            }
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if can_skip_walk_error(root, filter, &e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = match path.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => {
                tracing::warn!(path = %path.display(), "file outside the vault root, skipping");
                continue;
            }
        };
        let rel_str = relative_key(relative);
        if !filter.is_document(&rel_str) {
            continue;
        }

        let metadata = entry.metadata()?;
        let mtime = metadata.modified().map(system_time_secs)?;
        if let Some(since) = since {
            if mtime <= since {
                continue;
            }
        }

        scanned.insert(
            rel_str,
            Observed {
                mtime,
                size: metadata.len(),
            },
        );
    }

    Ok(scanned)
}

/// A walk error is harmless when its path is neither a directory nor
/// something the filter would accept as a document.
fn can_skip_walk_error(root: &Path, filter: &DocumentFilter, err: &walkdir::Error) -> bool {
    let Some(path) = err.path() else {
        return false;
    };
    if err.depth() == 0 || path.is_dir() {
        return false;
    }
    match path.strip_prefix(root) {
        Ok(relative) => !filter.is_document(&relative_key(relative)),
        Err(_) => false,
    }
}

/// Store key for a relative path: components joined with `/`.
fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn system_time_secs(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    system_time_secs(SystemTime::now())
}
