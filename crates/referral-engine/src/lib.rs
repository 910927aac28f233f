//! # referral-engine: Referral Code & Commission Engine
//!
//! Orchestrates the referral workflow on top of `referral-core` (pure rules)
//! and `referral-db` (storage). Every operation the checkout layer or the
//! admin/marketer dashboards call is a method on [`ReferralEngine`].
//!
//! ## Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  submit_marketer_request ──► review (approve) ──► directory.grant      │
//! │                                                      │                  │
//! │                                                      ▼                  │
//! │                                        create_referral_code             │
//! │                                                      │                  │
//! │  checkout: preview_discount ──► create_purchase ─────┘                  │
//! │                                       │                                 │
//! │             payment gateway succeeds  │                                 │
//! │                                       ▼                                 │
//! │                 finalize_purchase  (ONE transaction)                   │
//! │                 ├── claim one use  (conditional UPDATE)                │
//! │                 ├── purchase pending → completed                       │
//! │                 └── commission (pending)                               │
//! │                                       │                                 │
//! │             mark_commission_paid ◄────┴────► refund_purchase           │
//! │                                               (commission cancelled)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Engine tunables
//! - [`error`] - `EngineError` and retry classification
//! - [`directory`] - Marketer role hook
//! - `settings`, `codes`, `requests`, `checkout`, `ledger` - operations,
//!   each an `impl ReferralEngine` block
//!
//! ## Usage
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("referral.db")).await?;
//! let engine = ReferralEngine::new(db, EngineConfig::default());
//!
//! let preview = engine.preview_discount("SAVE10", Money::from_toman(1_000_000)).await?;
//! let purchase = engine.create_purchase(new_purchase).await?;
//! // ... payment gateway reports success ...
//! let outcome = engine.finalize_purchase(&purchase.id, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod directory;
pub mod error;

mod checkout;
mod codes;
mod ledger;
mod requests;
mod settings;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use directory::{InMemoryMarketerDirectory, MarketerDirectory, SqliteMarketerDirectory};
pub use error::{DirectoryError, EngineError, EngineResult};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use referral_core::codegen::{CodeSource, RandomCodeSource};
use referral_db::Database;

// =============================================================================
// Engine
// =============================================================================

/// The referral engine. Cheap to clone; clones share the pool and hooks.
#[derive(Clone)]
pub struct ReferralEngine {
    db: Database,
    directory: Arc<dyn MarketerDirectory>,
    codes: Arc<dyn CodeSource>,
    config: EngineConfig,
}

impl fmt::Debug for ReferralEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferralEngine")
            .field("db", &self.db)
            .field("directory", &self.directory)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReferralEngine {
    /// Creates an engine with the SQLite marketer directory and random
    /// code generation.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        ReferralEngine {
            directory: Arc::new(SqliteMarketerDirectory::new(db.clone())),
            codes: Arc::new(RandomCodeSource),
            db,
            config,
        }
    }

    /// Replaces the marketer directory.
    pub fn with_directory(mut self, directory: Arc<dyn MarketerDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Replaces the code candidate source.
    pub fn with_code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }

    /// The underlying database handle.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `op` until it succeeds, fails permanently, or the retry budget
    /// is spent. Only [`EngineError::is_retriable`] errors are retried.
    pub(crate) async fn retrying<T, F, Fut>(&self, operation: &'static str, mut op: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let attempts = self.config.finalize_retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err) if err.is_retriable() && attempt < attempts => {
                    warn!(operation, attempt, error = %err, "Transient failure, retrying");
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
