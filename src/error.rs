//! Error taxonomy for the vault index pipeline.
//!
//! Library internals return [`Result<T>`]; the CLI wraps these in
//! `anyhow` with context. The scanner and index builder convert their
//! errors into a boolean outcome at the boundary so callers can decide
//! whether to retry, warn, or fall back to the previous index.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Error, Debug)]
pub enum VaultError {
    /// The file-state store could not be opened, read, or written.
    #[error("state store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("corrupt record in state store: {0}")]
    CorruptRecord(String),

    #[error("document root does not exist: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("scan failed: {0}")]
    Scan(String),

    #[error("filesystem walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding model failed to load or encode, or returned a
    /// matrix of the wrong shape.
    #[error("embedding model error: {0}")]
    Model(String),

    #[error("index artifact error: {0}")]
    Index(String),

    /// The vector array and the path map on disk disagree.
    #[error("index artifacts are inconsistent: {0}; run `vidx index build --force`")]
    Inconsistent(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),
}
