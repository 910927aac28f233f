//! # Referral API
//!
//! HTTP surface over [`referral_engine::ReferralEngine`].
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Referral API                                   │
//! │                                                                         │
//! │  Checkout ─────┐                                                        │
//! │  Dashboards ───┼──► axum Router ──► handlers ──► ReferralEngine ──► SQLite
//! │  Admin panel ──┘    (TraceLayer,    (JSON in,     (transactions,        │
//! │                      CORS)           ApiError out) retries)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `REFERRAL_DATABASE_PATH` - SQLite file (required)
//! - `REFERRAL_HTTP_PORT` - HTTP port (default: 8080)
//! - `REFERRAL_DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `REFERRAL_DEFAULT_DISCOUNT` - Seed discount, e.g. "10.00"
//! - `REFERRAL_DEFAULT_COMMISSION` - Seed commission, e.g. "10.00"
//! - `REFERRAL_CODE_ATTEMPTS` - Generated-code collision budget (default: 5)

pub mod config;
pub mod error;
pub mod routes;

use referral_engine::ReferralEngine;

// Re-exports
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_router;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: ReferralEngine,
}

impl AppState {
    pub fn new(engine: ReferralEngine) -> Self {
        AppState { engine }
    }
}
