//! # Repository Module
//!
//! Database repository implementations for the referral engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Engine operation                                                      │
//! │       │                                                                 │
//! │       │  db.codes().get_by_code("SPRING24")          (pool, one shot)   │
//! │       │  ReferralCodeRepository::try_claim_use(&mut *tx, id)  (in tx)   │
//! │       ▼                                                                 │
//! │  Repository                                                            │
//! │  ├── &self methods      → acquire from the pool                        │
//! │  └── associated fns     → take `&mut SqliteConnection` so the engine   │
//! │                           can compose them inside one transaction      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Row records (`#[derive(FromRow)]`) ──TryFrom──► referral-core types   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`settings::SettingsRepository`] - Default-rate singleton
//! - [`code::ReferralCodeRepository`] - Codes and the atomic usage claim
//! - [`request::MarketerRequestRepository`] - Registration workflow
//! - [`marketer::MarketerRepository`] - Marketer role grants
//! - [`purchase::PurchaseRepository`] - Purchases and payment status
//! - [`commission::CommissionRepository`] - Commission ledger

pub mod code;
pub mod commission;
pub mod marketer;
pub mod purchase;
pub mod request;
pub mod settings;

use referral_core::Percentage;

use crate::error::{DbError, DbResult};

/// Narrows a stored integer to `u32`.
pub(crate) fn column_u32(table: &'static str, column: &str, value: i64) -> DbResult<u32> {
    u32::try_from(value).map_err(|_| DbError::CorruptRow {
        table,
        reason: format!("{column} = {value} does not fit in u32"),
    })
}

/// Maps a stored basis-point integer onto a [`Percentage`].
pub(crate) fn column_percentage(
    table: &'static str,
    column: &str,
    value: i64,
) -> DbResult<Percentage> {
    Percentage::try_from_bps(value).map_err(|_| DbError::CorruptRow {
        table,
        reason: format!("{column} = {value} is not a valid basis-point rate"),
    })
}
