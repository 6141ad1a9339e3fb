//! SQLite access for acm-measure
//!
//! Holds the speaker-attribute and transcript-media tables the measurement
//! pipeline reads from.

pub mod attributes;
pub mod media;

pub use attributes::SqliteAttributeStore;
pub use media::SqliteMediaLocator;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (creating if needed) the database at `db_path` and ensure tables exist
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

/// Create the attribute and media tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participant_attribute (
            participant TEXT NOT NULL,
            attribute TEXT NOT NULL,
            label TEXT NOT NULL,
            ordinal INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (participant, attribute, ordinal)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcript_media (
            transcript TEXT PRIMARY KEY,
            path TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (participant_attribute, transcript_media)");

    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    init_tables(&pool).await.unwrap();
    pool
}
