//! # Marketer Repository
//!
//! Backing store for the marketer role. A row in `marketers` means the user
//! may own referral codes. Grants are idempotent.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Repository for marketer role grants.
#[derive(Debug, Clone)]
pub struct MarketerRepository {
    pool: SqlitePool,
}

impl MarketerRepository {
    /// Creates a new MarketerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MarketerRepository { pool }
    }

    /// Grants the marketer role. Returns `false` if the user already had it.
    pub async fn grant(
        &self,
        user_id: &str,
        request_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO marketers (user_id, request_id, granted_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(user_id)
        .bind(request_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let granted = result.rows_affected() > 0;
        if granted {
            info!(user_id = %user_id, "Granted marketer role");
        }
        Ok(granted)
    }

    /// Whether the user holds the marketer role.
    pub async fn is_marketer(&self, user_id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM marketers WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }
}
