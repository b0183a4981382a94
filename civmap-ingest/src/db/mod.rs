//! Record storage for civmap-ingest
//!
//! The base tier is a directory tree of JSON documents written by generation
//! and enrichment ([`base_records`]). The override tier holds live edits in
//! SQLite ([`overrides`]).

pub mod base_records;
pub mod overrides;

use civmap_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

pub use base_records::BaseRecordStore;

/// Initialize database connection pool
///
/// Creates the database file and parent directory if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the override table if it doesn't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS village_overrides (
            village_key TEXT PRIMARY KEY,
            patch TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (village_overrides)");

    Ok(())
}
