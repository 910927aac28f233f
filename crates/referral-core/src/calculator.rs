//! # Discount & Commission Calculator
//!
//! Pure pricing math shared by the checkout preview and by finalization.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  base_amount ──► discount = round(base × d%)      clamped to [0, base]  │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │  final_amount = base - discount                                         │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │  commission = round(final × c%)                   clamped to [0, final] │
//! │                                                                         │
//! │  d% = code.discount_percentage   ?? settings.default_discount_percentage│
//! │  c% = code.commission_percentage ?? settings.default_commission_...     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Commission is always computed on the POST-discount amount. Rounding is
//! half-up to a whole Toman (see [`Money::percent_of`]).

use crate::money::{Money, Percentage};
use crate::types::{ReferralCode, ReferralCodeSettings};

/// Rates in effect for a code after falling back to the settings defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRates {
    pub discount: Percentage,
    pub commission: Percentage,
}

/// Full pricing of a base amount under a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub discount_percentage: Percentage,
    pub commission_percentage: Percentage,
    pub discount_amount: Money,
    pub final_amount: Money,
    pub commission_amount: Money,
}

/// Resolves per-code overrides against the platform defaults.
pub fn resolve_rates(code: &ReferralCode, settings: &ReferralCodeSettings) -> ResolvedRates {
    ResolvedRates {
        discount: code
            .discount_percentage
            .unwrap_or(settings.default_discount_percentage),
        commission: code
            .commission_percentage
            .unwrap_or(settings.default_commission_percentage),
    }
}

/// Discount on `base` at `rate`, never negative and never above `base`.
pub fn discount_at(base: Money, rate: Percentage) -> Money {
    let ceiling = if base.is_negative() { Money::zero() } else { base };
    base.percent_of(rate).clamp_to(Money::zero(), ceiling)
}

/// Commission on `final_amount` at `rate`, never negative and never above it.
pub fn commission_at(final_amount: Money, rate: Percentage) -> Money {
    discount_at(final_amount, rate)
}

/// Discount a code grants on `base`.
pub fn compute_discount(base: Money, code: &ReferralCode, settings: &ReferralCodeSettings) -> Money {
    discount_at(base, resolve_rates(code, settings).discount)
}

/// Commission a code earns on an already-discounted `final_amount`.
pub fn compute_commission(
    final_amount: Money,
    code: &ReferralCode,
    settings: &ReferralCodeSettings,
) -> Money {
    commission_at(final_amount, resolve_rates(code, settings).commission)
}

/// Prices `base` under `code` end to end.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use referral_core::calculator::quote;
/// use referral_core::money::{Money, Percentage};
/// use referral_core::types::{ReferralCode, ReferralCodeSettings};
///
/// let now = Utc::now();
/// let settings = ReferralCodeSettings {
///     default_discount_percentage: Percentage::from_bps(1000),
///     default_commission_percentage: Percentage::from_bps(1000),
///     updated_at: now,
/// };
/// let code = ReferralCode {
///     id: "id-1".into(),
///     code: "SPRING24".into(),
///     marketer_id: "m-1".into(),
///     discount_percentage: None,
///     commission_percentage: None,
///     max_uses: None,
///     current_uses: 0,
///     is_active: true,
///     created_at: now,
///     updated_at: now,
/// };
///
/// let q = quote(Money::from_toman(1_000_000), &code, &settings);
/// assert_eq!(q.discount_amount.toman(), 100_000);
/// assert_eq!(q.final_amount.toman(), 900_000);
/// assert_eq!(q.commission_amount.toman(), 90_000);
/// ```
pub fn quote(base: Money, code: &ReferralCode, settings: &ReferralCodeSettings) -> Quote {
    let rates = resolve_rates(code, settings);
    let discount_amount = discount_at(base, rates.discount);
    let final_amount = base - discount_amount;
    Quote {
        discount_percentage: rates.discount,
        commission_percentage: rates.commission,
        discount_amount,
        final_amount,
        commission_amount: commission_at(final_amount, rates.commission),
    }
}

// =============================================================================
// Tests
// =============================================================================
