use sqlx::SqlitePool;

use crate::error::Result;

/// Create the `files` relation and its indexes.
///
/// Every statement is `IF NOT EXISTS`, so this is safe to run on every
/// open and from several processes at once.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            path TEXT PRIMARY KEY,
            mtime REAL NOT NULL,
            size INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'current'
                CHECK (status IN ('current', 'deleted')),
            first_seen REAL NOT NULL,
            updated_at REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_status_mtime ON files(status, mtime DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
