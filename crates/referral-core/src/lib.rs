//! # referral-core: Pure Business Logic for the Referral Engine
//!
//! This crate holds the pricing math, status machines and validation rules
//! of the referral system as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Referral Engine Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    referral-api (axum)                          │   │
//! │  │    /codes/preview, /purchases/{id}/finalize, /commissions ...   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    referral-engine                              │   │
//! │  │    finalize_purchase, refund_purchase, review_request ...       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ referral-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌────────────────┐  │   │
//! │  │   │  types   │ │  money   │ │ calculator │ │ status / valid │  │   │
//! │  │   │ Purchase │ │  Money   │ │   quote    │ │  FSM tables    │  │   │
//! │  │   │Commission│ │Percentage│ │ resolve    │ │  input rules   │  │   │
//! │  │   └──────────┘ └──────────┘ └────────────┘ └────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  referral-db (Database Layer)                   │   │
//! │  │        SQLite queries, migrations, atomic usage claims          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (ReferralCode, Purchase, Commission, ...)
//! - [`money`] - Integer Toman amounts and basis-point percentages
//! - [`calculator`] - Discount and commission pricing
//! - [`status`] - Transition tables for every status field
//! - [`validation`] - Input rules
//! - [`codegen`] - Random referral code generation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use referral_core::money::{Money, Percentage};
//! use referral_core::calculator::{commission_at, discount_at};
//!
//! let base = Money::from_toman(1_000_000);
//! let discount = discount_at(base, Percentage::from_bps(1000));
//! let commission = commission_at(base - discount, Percentage::from_bps(1000));
//!
//! assert_eq!(discount.toman(), 100_000);
//! assert_eq!(commission.toman(), 90_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calculator;
pub mod codegen;
pub mod error;
pub mod money;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::{Money, Percentage};
pub use status::{CommissionStatus, PaymentStatus, RequestStatus, StatusMachine};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a referral code.
pub const MAX_CODE_LEN: usize = 20;

/// Length of a generated referral code.
pub const GENERATED_CODE_LEN: usize = 8;

/// Collision retries before code generation gives up.
pub const DEFAULT_CODE_GENERATION_ATTEMPTS: u32 = 5;

/// Default discount for a fresh settings row (10.00%).
pub const DEFAULT_DISCOUNT_BPS: u32 = 1000;

/// Default commission for a fresh settings row (10.00%).
pub const DEFAULT_COMMISSION_BPS: u32 = 1000;
