//! Transcript media lookups

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::measure::{MediaDirectory, MediaLocator, MeasureError};

/// `MediaLocator` over the `transcript_media` table, falling back to a
/// media directory for unregistered transcripts
#[derive(Debug, Clone)]
pub struct SqliteMediaLocator {
    pool: SqlitePool,
    fallback: MediaDirectory,
}

impl SqliteMediaLocator {
    pub fn new(pool: SqlitePool, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            fallback: MediaDirectory::new(media_dir),
        }
    }
}

#[async_trait]
impl MediaLocator for SqliteMediaLocator {
    async fn locate(&self, transcript: &str) -> Result<Option<PathBuf>, MeasureError> {
        let registered: Option<String> =
            sqlx::query_scalar("SELECT path FROM transcript_media WHERE transcript = ?")
                .bind(transcript)
                .fetch_optional(&self.pool)
                .await?;

        match registered {
            Some(path) => {
                let path = PathBuf::from(path);
                if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                    Ok(Some(path))
                } else {
                    debug!(transcript, path = %path.display(), "Registered media is not readable");
                    Ok(None)
                }
            }
            None => self.fallback.locate(transcript).await,
        }
    }
}

/// Register (or replace) the audio file for a transcript
pub async fn register_media(pool: &SqlitePool, transcript: &str, path: &Path) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transcript_media (transcript, path) VALUES (?, ?)
        ON CONFLICT(transcript) DO UPDATE SET path = excluded.path
        "#,
    )
    .bind(transcript)
    .bind(path.to_string_lossy().into_owned())
    .execute(pool)
    .await?;

    Ok(())
}
