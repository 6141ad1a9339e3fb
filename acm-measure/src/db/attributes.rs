//! Participant attribute lookups

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::measure::{AttributeStore, MeasureError};

/// `AttributeStore` over the `participant_attribute` table
#[derive(Debug, Clone)]
pub struct SqliteAttributeStore {
    pool: SqlitePool,
}

impl SqliteAttributeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttributeStore for SqliteAttributeStore {
    /// First label by ordinal
    async fn attribute(&self, speaker: &str, attribute: &str) -> Result<Option<String>, MeasureError> {
        let label: Option<String> = sqlx::query_scalar(
            r#"
            SELECT label FROM participant_attribute
            WHERE participant = ? AND attribute = ?
            ORDER BY ordinal
            LIMIT 1
            "#,
        )
        .bind(speaker)
        .bind(attribute)
        .fetch_optional(&self.pool)
        .await?;

        Ok(label)
    }
}

/// Insert or replace one attribute label
pub async fn set_attribute(
    pool: &SqlitePool,
    participant: &str,
    attribute: &str,
    label: &str,
    ordinal: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO participant_attribute (participant, attribute, label, ordinal)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(participant, attribute, ordinal) DO UPDATE SET label = excluded.label
        "#,
    )
    .bind(participant)
    .bind(attribute)
    .bind(label)
    .bind(ordinal)
    .execute(pool)
    .await?;

    Ok(())
}
