//! # Marketer Directory
//!
//! The user/role service is an external collaborator. The engine talks to
//! it through [`MarketerDirectory`]: approval grants the marketer role and
//! code creation checks it.
//!
//! [`SqliteMarketerDirectory`] keeps the role in the engine's own
//! `marketers` table and is what the API wires in by default.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use tokio::sync::RwLock;

use crate::error::DirectoryError;
use referral_db::Database;

/// Role hook into the user service.
#[async_trait]
pub trait MarketerDirectory: Send + Sync + fmt::Debug {
    /// Grants the marketer role after `request_id` was approved.
    ///
    /// Must be idempotent: resyncing an approval calls it again.
    async fn grant_marketer(&self, user_id: &str, request_id: &str) -> Result<(), DirectoryError>;

    /// Whether the user may own referral codes.
    async fn is_marketer(&self, user_id: &str) -> Result<bool, DirectoryError>;
}

// =============================================================================
// SQLite Directory
// =============================================================================

/// Directory backed by the `marketers` table.
#[derive(Debug, Clone)]
pub struct SqliteMarketerDirectory {
    db: Database,
}

impl SqliteMarketerDirectory {
    pub fn new(db: Database) -> Self {
        SqliteMarketerDirectory { db }
    }
}

#[async_trait]
impl MarketerDirectory for SqliteMarketerDirectory {
    async fn grant_marketer(&self, user_id: &str, request_id: &str) -> Result<(), DirectoryError> {
        self.db
            .marketers()
            .grant(user_id, Some(request_id), Utc::now())
            .await?;
        Ok(())
    }

    async fn is_marketer(&self, user_id: &str) -> Result<bool, DirectoryError> {
        Ok(self.db.marketers().is_marketer(user_id).await?)
    }
}

// =============================================================================
// In-Memory Directory
// =============================================================================

/// Process-local directory, for embedding the engine without a role store
/// and for tests that need to simulate an outage.
#[derive(Debug, Default)]
pub struct InMemoryMarketerDirectory {
    marketers: RwLock<HashSet<String>>,
    unavailable: RwLock<bool>,
}

impl InMemoryMarketerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-registers a marketer without an approved request.
    pub async fn insert(&self, user_id: &str) {
        self.marketers.write().await.insert(user_id.to_string());
    }

    /// Makes every call fail with `Unavailable` until switched back.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    async fn ensure_available(&self) -> Result<(), DirectoryError> {
        if *self.unavailable.read().await {
            return Err(DirectoryError::Unavailable("directory offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketerDirectory for InMemoryMarketerDirectory {
    async fn grant_marketer(&self, user_id: &str, _request_id: &str) -> Result<(), DirectoryError> {
        self.ensure_available().await?;
        self.marketers.write().await.insert(user_id.to_string());
        Ok(())
    }

    async fn is_marketer(&self, user_id: &str) -> Result<bool, DirectoryError> {
        self.ensure_available().await?;
        Ok(self.marketers.read().await.contains(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use referral_db::DbConfig;

    #[tokio::test]
    async fn test_sqlite_directory_grants_idempotently() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let directory = SqliteMarketerDirectory::new(db);

        assert!(!directory.is_marketer("u-1").await.unwrap());
        directory.grant_marketer("u-1", "req-1").await.unwrap();
        directory.grant_marketer("u-1", "req-1").await.unwrap();
        assert!(directory.is_marketer("u-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_directory_outage() {
        let directory = InMemoryMarketerDirectory::new();
        directory.insert("u-1").await;
        assert!(directory.is_marketer("u-1").await.unwrap());

        directory.set_unavailable(true).await;
        assert!(matches!(
            directory.grant_marketer("u-2", "req-2").await,
            Err(DirectoryError::Unavailable(_))
        ));

        directory.set_unavailable(false).await;
        directory.grant_marketer("u-2", "req-2").await.unwrap();
        assert!(directory.is_marketer("u-2").await.unwrap());
    }
}
