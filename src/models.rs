//! Core data models shared by the store, scanner, and index builder.

use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a tracked document.
///
/// Records are never removed from the store; a file that disappears
/// from disk transitions to [`FileStatus::Deleted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Current,
    Deleted,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Current => "current",
            FileStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(FileStatus::Current),
            "deleted" => Ok(FileStatus::Deleted),
            other => Err(format!("unknown file status: '{}'", other)),
        }
    }
}

/// One document as last observed by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Path relative to the document root, `/`-separated.
    pub path: String,
    /// Modification time in seconds since the epoch.
    pub mtime: f64,
    pub size: u64,
    pub status: FileStatus,
}

/// Full history row, including bookkeeping columns.
#[derive(Debug, Clone)]
pub struct FileDetails {
    pub record: FileRecord,
    pub first_seen: f64,
    /// Last time the scanner changed this row (mtime, size, or status).
    pub updated_at: f64,
}

/// Outcome of a scan as seen by callers.
///
/// Deletions are counted internally (see [`ScanCounts`]) but callers
/// only use additions and modifications to decide on a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    pub success: bool,
    pub added: u64,
    pub modified: u64,
}

impl ScanResult {
    pub fn failed() -> Self {
        Self {
            success: false,
            added: 0,
            modified: 0,
        }
    }

    pub fn changes(&self) -> u64 {
        self.added + self.modified
    }
}

/// Per-scan change counts, including deletions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    pub added: u64,
    pub modified: u64,
    pub deleted: u64,
}

impl ScanCounts {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.modified == 0 && self.deleted == 0
    }
}

impl From<ScanCounts> for ScanResult {
    fn from(counts: ScanCounts) -> Self {
        Self {
            success: true,
            added: counts.added,
            modified: counts.modified,
        }
    }
}
