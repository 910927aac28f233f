//! # Money Module
//!
//! Provides the `Money` and `Percentage` types used by every price,
//! discount and commission in the engine.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Commission on a discounted price, in floating point:                   │
//! │    1_000_000 × 0.9 × 0.1 = 90000.00000000001  ❌                        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Toman + basis-point rates                        │
//! │    discount   = round(1_000_000 × 1000 / 10000) = 100_000               │
//! │    commission = round(  900_000 × 1000 / 10000) =  90_000               │
//! │                                                                         │
//! │  The same inputs ALWAYS yield the same integer, at preview time and at  │
//! │  finalize time.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use referral_core::money::{Money, Percentage};
//!
//! let price = Money::from_toman(1_000_000);
//! let rate = Percentage::from_bps(1000); // 10.00%
//!
//! assert_eq!(price.percent_of(rate).toman(), 100_000);
//! assert_eq!(rate.to_string(), "10.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Basis points in one whole (100.00%).
pub const BPS_SCALE: u32 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole Toman (the smallest unit the platform bills in).
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Purchase.original_amount ──► discount ──► Purchase.amount              │
/// │                                              │                          │
/// │                                              ▼                          │
/// │                                     Commission.amount                   │
/// │                                              │                          │
/// │                                              ▼                          │
/// │                              CommissionTotals (pending / paid)          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole Toman.
    #[inline]
    pub const fn from_toman(toman: i64) -> Self {
        Money(toman)
    }

    /// Returns the value in whole Toman.
    #[inline]
    pub const fn toman(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Applies a rate to this amount, rounding half up to a whole Toman.
    ///
    /// ## Implementation
    /// `(amount × bps + 5000) / 10000` in i128, floored with `div_euclid` so
    /// the half-up rule holds for negative inputs as well.
    ///
    /// ## Example
    /// ```rust
    /// use referral_core::money::{Money, Percentage};
    ///
    /// // 12.5% of 999 = 124.875 → 125
    /// let share = Money::from_toman(999).percent_of(Percentage::from_bps(1250));
    /// assert_eq!(share.toman(), 125);
    ///
    /// // 10% of 5 = 0.5 → 1 (half rounds up)
    /// assert_eq!(Money::from_toman(5).percent_of(Percentage::from_bps(1000)).toman(), 1);
    /// ```
    pub fn percent_of(&self, rate: Percentage) -> Money {
        let scaled = self.0 as i128 * rate.bps() as i128 + (BPS_SCALE as i128 / 2);
        Money(scaled.div_euclid(BPS_SCALE as i128) as i64)
    }

    /// Restricts the value to `[min, max]`.
    ///
    /// When `max < min` the result is `min`.
    #[inline]
    pub fn clamp_to(self, min: Money, max: Money) -> Money {
        if self.0 > max.0 {
            Money(max.0.max(min.0))
        } else if self.0 < min.0 {
            min
        } else {
            self
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{grouped} Toman")
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Percentage Type
// =============================================================================

/// A rate between 0.00% and 100.00%, stored as basis points (1 bp = 0.01%).
///
/// ## Wire Format
/// Serialized as a decimal string with two fractional digits (`"12.50"`),
/// parsed from decimal strings with at most two fractional digits
/// (`"12.5"`, `"10"`, `"0.25"`).
///
/// ```text
/// "10"     → 1000 bp
/// "12.5"   → 1250 bp
/// "100.00" → 10000 bp
/// "100.01" → OutOfRange
/// "1.005"  → InvalidFormat (sub-basis-point precision)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Percentage(u32);

impl Percentage {
    /// 0.00%
    pub const ZERO: Percentage = Percentage(0);

    /// 100.00%
    pub const FULL: Percentage = Percentage(BPS_SCALE);

    /// Creates a percentage from basis points without range checks.
    ///
    /// Use [`Percentage::try_from_bps`] for untrusted input.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Creates a percentage from basis points, rejecting values above 100%.
    pub fn try_from_bps(bps: i64) -> Result<Self, ValidationError> {
        if !(0..=BPS_SCALE as i64).contains(&bps) {
            return Err(ValidationError::OutOfRange {
                field: "percentage".to_string(),
                min: 0,
                max: BPS_SCALE as i64,
            });
        }
        Ok(Percentage(bps as u32))
    }

    /// Returns the value in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Percentage {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "percentage".to_string(),
            reason: reason.to_string(),
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::Required {
                field: "percentage".to_string(),
            });
        }

        let (whole, frac) = match raw.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (raw, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected a non-negative decimal number"));
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("at most two fractional digits are allowed"));
        }
        if whole.len() > 3 {
            return Err(ValidationError::OutOfRange {
                field: "percentage".to_string(),
                min: 0,
                max: 100,
            });
        }

        let whole: i64 = whole.parse().map_err(|_| invalid("not a number"))?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid("not a number"))? * 10,
            _ => frac.parse().map_err(|_| invalid("not a number"))?,
        };

        Percentage::try_from_bps(whole * 100 + frac).map_err(|_| ValidationError::OutOfRange {
            field: "percentage".to_string(),
            min: 0,
            max: 100,
        })
    }
}

impl TryFrom<String> for Percentage {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Percentage> for String {
    fn from(value: Percentage) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_of_rounds_half_up() {
        let ten = Percentage::from_bps(1000);
        assert_eq!(Money::from_toman(1_000_000).percent_of(ten).toman(), 100_000);
        assert_eq!(Money::from_toman(5).percent_of(ten).toman(), 1);
        assert_eq!(Money::from_toman(4).percent_of(ten).toman(), 0);
        assert_eq!(Money::from_toman(15).percent_of(ten).toman(), 2);
    }

    #[test]
    fn test_percent_of_extremes() {
        let amount = Money::from_toman(123_457);
        assert_eq!(amount.percent_of(Percentage::ZERO), Money::zero());
        assert_eq!(amount.percent_of(Percentage::FULL), amount);
        // No overflow on very large amounts
        let big = Money::from_toman(i64::MAX / 2);
        assert_eq!(big.percent_of(Percentage::FULL), big);
    }

    #[test]
    fn test_clamp_to() {
        let zero = Money::zero();
        let cap = Money::from_toman(100);
        assert_eq!(Money::from_toman(150).clamp_to(zero, cap), cap);
        assert_eq!(Money::from_toman(-3).clamp_to(zero, cap), zero);
        assert_eq!(Money::from_toman(42).clamp_to(zero, cap).toman(), 42);
        // Inverted bounds collapse onto min
        assert_eq!(Money::from_toman(42).clamp_to(cap, zero), cap);
    }

    #[test]
    fn test_money_display_groups_thousands() {
        assert_eq!(Money::from_toman(0).to_string(), "0 Toman");
        assert_eq!(Money::from_toman(999).to_string(), "999 Toman");
        assert_eq!(Money::from_toman(1_000).to_string(), "1,000 Toman");
        assert_eq!(Money::from_toman(1_234_567).to_string(), "1,234,567 Toman");
        assert_eq!(Money::from_toman(-90_000).to_string(), "-90,000 Toman");
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [100, 250, 650].into_iter().map(Money::from_toman).sum();
        assert_eq!(total.toman(), 1_000);
    }

    #[test]
    fn test_percentage_parse() {
        assert_eq!("10".parse::<Percentage>().unwrap().bps(), 1000);
        assert_eq!("12.5".parse::<Percentage>().unwrap().bps(), 1250);
        assert_eq!("0.25".parse::<Percentage>().unwrap().bps(), 25);
        assert_eq!("100.00".parse::<Percentage>().unwrap().bps(), 10_000);
        assert_eq!(" 7.05 ".parse::<Percentage>().unwrap().bps(), 705);
    }

    #[test]
    fn test_percentage_parse_rejects_bad_input() {
        assert!(matches!(
            "100.01".parse::<Percentage>(),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            "1000".parse::<Percentage>(),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            "1.005".parse::<Percentage>(),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            "-5".parse::<Percentage>(),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            ".5".parse::<Percentage>(),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            "".parse::<Percentage>(),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_percentage_display_and_json() {
        let rate = Percentage::from_bps(1250);
        assert_eq!(rate.to_string(), "12.50");
        assert_eq!(serde_json::to_string(&rate).unwrap(), "\"12.50\"");

        let parsed: Percentage = serde_json::from_str("\"7.5\"").unwrap();
        assert_eq!(parsed.bps(), 750);
        assert!(serde_json::from_str::<Percentage>("\"101\"").is_err());
    }

    #[test]
    fn test_try_from_bps_range() {
        assert!(Percentage::try_from_bps(0).is_ok());
        assert!(Percentage::try_from_bps(10_000).is_ok());
        assert!(Percentage::try_from_bps(10_001).is_err());
        assert!(Percentage::try_from_bps(-1).is_err());
    }
}
