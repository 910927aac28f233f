//! # referral-db: Database Layer for the Referral Engine
//!
//! SQLite storage for referral codes, marketer requests, purchases and the
//! commission ledger, accessed asynchronously through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Referral Engine Data Flow                          │
//! │                                                                         │
//! │  referral-engine (finalize_purchase, create_referral_code, ...)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    referral-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ SettingsRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ReferralCode.. │    │ 001_referral │  │   │
//! │  │   │ Transactions  │    │ Purchase/Comm. │    │  _schema.sql │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      SQLite Database                            │   │
//! │  │   UNIQUE(code), UNIQUE(purchase_id), CHECK(uses <= max_uses)    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use referral_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("referral.db")).await?;
//! let code = db.codes().get_by_code("SPRING24").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::code::{CodeCounts, ReferralCodeRepository};
pub use repository::commission::CommissionRepository;
pub use repository::marketer::MarketerRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::request::{MarketerRequestRepository, ReviewUpdate};
pub use repository::settings::{SettingsDefaults, SettingsRepository};
