//! Persistent file-state store.
//!
//! One row per document ever seen under the vault root, keyed by its
//! relative path. Rows are soft-deleted: a file that disappears keeps
//! its row with `status = 'deleted'`, so history stays queryable while
//! every "current" query ignores it.
//!
//! Mutations go through [`upsert`] and [`mark_deleted`], which take an
//! open transaction; only the scanner calls them.

use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::path::{Path, PathBuf};

use crate::db;
use crate::error::{Result, VaultError};
use crate::migrate;
use crate::models::{FileDetails, FileRecord, FileStatus};

/// Record counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub current: u64,
    pub deleted: u64,
}

pub struct FileStateStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl FileStateStore {
    /// Open the store at `path`, creating the file and schema if needed.
    ///
    /// Any failure here is fatal to the caller: nothing can be said
    /// about document state without a readable store.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Ensure the store and its schema exist, then release the handle.
    pub async fn initialize(path: &Path) -> Result<()> {
        let store = Self::open(path).await?;
        store.close().await;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// All records with `status = 'current'`, ordered by path.
    pub async fn get_current_files(&self) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            "SELECT path, mtime, size, status FROM files WHERE status = 'current' ORDER BY path",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Largest `mtime` among current records.
    ///
    /// `None` means "no signal": the store is empty or could not be read.
    /// Callers must not treat it as `0.0`.
    pub async fn get_max_mtime(&self) -> Option<f64> {
        let result: std::result::Result<Option<f64>, sqlx::Error> =
            sqlx::query_scalar("SELECT MAX(mtime) FROM files WHERE status = 'current'")
                .fetch_one(&self.pool)
                .await;

        match result {
            Ok(max) => max,
            Err(e) => {
                tracing::warn!(store = %self.path.display(), "could not read max mtime: {}", e);
                None
            }
        }
    }

    /// A single record by relative path, in any status.
    pub async fn get_file(&self, path: &str) -> Result<Option<FileDetails>> {
        let row = sqlx::query(
            "SELECT path, mtime, size, status, first_seen, updated_at FROM files WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_details).transpose()
    }

    /// Every record ever seen, including deleted ones.
    pub async fn all_files(&self) -> Result<Vec<FileDetails>> {
        let rows = sqlx::query(
            "SELECT path, mtime, size, status, first_seen, updated_at FROM files ORDER BY path",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_details).collect()
    }

    /// Current records modified at or after `since`, newest first.
    pub async fn recent_files(&self, since: f64) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT path, mtime, size, status FROM files
            WHERE status = 'current' AND mtime >= ?
            ORDER BY mtime DESC, path
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    pub async fn counts(&self) -> Result<StoreCounts> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM files GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = StoreCounts::default();
        for row in &rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            match status.parse::<FileStatus>().map_err(VaultError::CorruptRecord)? {
                FileStatus::Current => counts.current = n as u64,
                FileStatus::Deleted => counts.deleted = n as u64,
            }
        }
        Ok(counts)
    }
}

/// Insert or update a record. A previously deleted path is revived.
pub(crate) async fn upsert(
    conn: &mut SqliteConnection,
    record: &FileRecord,
    now: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO files (path, mtime, size, status, first_seen, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            mtime = excluded.mtime,
            size = excluded.size,
            status = excluded.status,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&record.path)
    .bind(record.mtime)
    .bind(record.size as i64)
    .bind(record.status.as_str())
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Flag a record as deleted without removing it.
pub(crate) async fn mark_deleted(conn: &mut SqliteConnection, path: &str, now: f64) -> Result<()> {
    sqlx::query("UPDATE files SET status = 'deleted', updated_at = ? WHERE path = ?")
        .bind(now)
        .bind(path)
        .execute(conn)
        .await?;

    Ok(())
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<FileRecord> {
    let status: String = row.try_get("status")?;
    let size: i64 = row.try_get("size")?;
    Ok(FileRecord {
        path: row.try_get("path")?,
        mtime: row.try_get("mtime")?,
        size: size.max(0) as u64,
        status: status.parse().map_err(VaultError::CorruptRecord)?,
    })
}

fn row_to_details(row: &sqlx::sqlite::SqliteRow) -> Result<FileDetails> {
    Ok(FileDetails {
        record: row_to_record(row)?,
        first_seen: row.try_get("first_seen")?,
        updated_at: row.try_get("updated_at")?,
    })
}
