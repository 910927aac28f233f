//! # Domain Types
//!
//! Core entities of the referral system.
//!
//! ## Entity Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  MarketerRequest ──approve──► marketer role                             │
//! │                                    │ owns                               │
//! │                                    ▼                                    │
//! │  ReferralCodeSettings ─defaults─► ReferralCode (current_uses/max_uses)  │
//! │                                    │ applied to                         │
//! │                                    ▼                                    │
//! │                                Purchase (original → discount → amount)  │
//! │                                    │ completed                          │
//! │                                    ▼                                    │
//! │                                Commission (exactly one per purchase)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Commission rows snapshot the rate and amounts they were computed from, so
//! later edits to a code or to the settings never rewrite history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::calculator::Quote;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percentage};
use crate::status::{CommissionStatus, PaymentStatus, RequestStatus, StatusMachine};
use crate::validation::{validate_code, validate_max_uses};

/// Generates a new random entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Deserializes a present field (including `null`) as `Some(..)` so patches
/// can tell "absent" apart from "set to null".
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Settings
// =============================================================================

/// Platform-wide default rates, applied when a code has no override.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReferralCodeSettings {
    #[ts(type = "string")]
    pub default_discount_percentage: Percentage,
    #[ts(type = "string")]
    pub default_commission_percentage: Percentage,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Admin update of the settings singleton. Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettingsPatch {
    #[serde(default)]
    #[ts(type = "string | null")]
    pub default_discount_percentage: Option<Percentage>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub default_commission_percentage: Option<Percentage>,
}

impl ReferralCodeSettings {
    /// Applies a patch, returning whether anything changed.
    pub fn apply_patch(&mut self, patch: &SettingsPatch, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        if let Some(rate) = patch.default_discount_percentage {
            changed |= self.default_discount_percentage != rate;
            self.default_discount_percentage = rate;
        }
        if let Some(rate) = patch.default_commission_percentage {
            changed |= self.default_commission_percentage != rate;
            self.default_commission_percentage = rate;
        }
        if changed {
            self.updated_at = now;
        }
        changed
    }
}

// =============================================================================
// Referral Code
// =============================================================================

/// A marketer-owned code that discounts a purchase and accrues commission.
///
/// ## Usage Counter
/// `current_uses` only grows, and only through the storage layer's atomic
/// claim. For a bounded code `current_uses <= max_uses` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReferralCode {
    pub id: String,
    /// Case-sensitive, unique, 1-20 ASCII alphanumerics.
    pub code: String,
    pub marketer_id: String,
    /// `None` follows `default_discount_percentage`.
    #[ts(type = "string | null")]
    pub discount_percentage: Option<Percentage>,
    /// `None` follows `default_commission_percentage`.
    #[ts(type = "string | null")]
    pub commission_percentage: Option<Percentage>,
    /// `None` means unlimited.
    pub max_uses: Option<u32>,
    pub current_uses: u32,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Why a code cannot be applied right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CodeUnavailable {
    Inactive,
    Exhausted,
}

impl ReferralCode {
    /// Remaining claims, or `None` when unlimited.
    pub fn remaining_uses(&self) -> Option<u32> {
        self.max_uses
            .map(|max| max.saturating_sub(self.current_uses))
    }

    /// Checks whether one more use may be claimed.
    pub fn availability(&self) -> Result<(), CodeUnavailable> {
        if !self.is_active {
            return Err(CodeUnavailable::Inactive);
        }
        if self.remaining_uses() == Some(0) {
            return Err(CodeUnavailable::Exhausted);
        }
        Ok(())
    }

    /// `true` when active and below its usage limit.
    pub fn is_available(&self) -> bool {
        self.availability().is_ok()
    }

    /// Converts an availability failure into the matching domain error.
    pub fn ensure_available(&self) -> CoreResult<()> {
        self.availability().map_err(|reason| match reason {
            CodeUnavailable::Inactive => CoreError::CodeInactive(self.code.clone()),
            CodeUnavailable::Exhausted => CoreError::UsageLimitReached {
                code: self.code.clone(),
                max_uses: self.max_uses.unwrap_or(self.current_uses),
            },
        })
    }

    /// Applies an admin patch.
    ///
    /// ## Rules
    /// - The code string is frozen once the code has been used.
    /// - `max_uses` may not drop below `current_uses`.
    /// - Percentages may be set to `None` to follow the live defaults.
    pub fn apply_patch(&mut self, patch: &ReferralCodePatch, now: DateTime<Utc>) -> CoreResult<()> {
        if let Some(code) = &patch.code {
            if *code != self.code {
                validate_code(code)?;
                if self.current_uses > 0 {
                    return Err(CoreError::CodeLocked {
                        code: self.code.clone(),
                    });
                }
                self.code = code.clone();
            }
        }

        if let Some(max_uses) = patch.max_uses {
            validate_max_uses(max_uses)?;
            if let Some(max) = max_uses {
                if max < self.current_uses {
                    return Err(ValidationError::OutOfRange {
                        field: "max_uses".to_string(),
                        min: self.current_uses as i64,
                        max: u32::MAX as i64,
                    }
                    .into());
                }
            }
            self.max_uses = max_uses;
        }

        if let Some(rate) = patch.discount_percentage {
            self.discount_percentage = rate;
        }
        if let Some(rate) = patch.commission_percentage {
            self.commission_percentage = rate;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }

        self.updated_at = now;
        Ok(())
    }
}

/// Input for creating a referral code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewReferralCode {
    /// Explicit code string; generated when absent.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub max_uses: Option<u32>,
    /// Snapshotted from settings when absent.
    #[serde(default)]
    #[ts(type = "string | null")]
    pub discount_percentage: Option<Percentage>,
    /// Snapshotted from settings when absent.
    #[serde(default)]
    #[ts(type = "string | null")]
    pub commission_percentage: Option<Percentage>,
}

/// Admin patch of a referral code.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReferralCodePatch {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[ts(type = "string | null")]
    pub discount_percentage: Option<Option<Percentage>>,
    #[serde(default, deserialize_with = "double_option")]
    #[ts(type = "string | null")]
    pub commission_percentage: Option<Option<Percentage>>,
    #[serde(default, deserialize_with = "double_option")]
    #[ts(type = "number | null")]
    pub max_uses: Option<Option<u32>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Filter for admin code listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeFilter {
    pub marketer_id: Option<String>,
    pub is_active: Option<bool>,
}

/// A successful usage claim: the code as it stands after the increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedUse {
    pub code: ReferralCode,
}

/// Why a usage claim was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    NotFound { code_id: String },
    Inactive { code: String },
    LimitReached { code: String, max_uses: u32 },
}

impl From<ClaimError> for CoreError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::NotFound { code_id } => CoreError::CodeNotFound(code_id),
            ClaimError::Inactive { code } => CoreError::CodeInactive(code),
            ClaimError::LimitReached { code, max_uses } => {
                CoreError::UsageLimitReached { code, max_uses }
            }
        }
    }
}

/// Result of pricing a code against a base amount, without consuming a use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountPreview {
    pub code: String,
    #[ts(type = "string")]
    pub discount_percentage: Percentage,
    pub base_amount: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
    /// Remaining claims at preview time; `None` when unlimited.
    pub remaining_uses: Option<u32>,
}

// =============================================================================
// Marketer Request
// =============================================================================

/// Self-reported marketing experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

/// Catalog area the applicant wants to promote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InterestArea {
    Medical,
    Technology,
    Business,
    Education,
    All,
}

/// Applicant profile submitted with a marketer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MarketerProfile {
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub current_job: Option<String>,
    pub interest_area: InterestArea,
    pub motivation: String,
    #[serde(default)]
    pub marketing_experience: Option<String>,
    #[serde(default)]
    pub instagram_handle: Option<String>,
    #[serde(default)]
    pub telegram_handle: Option<String>,
}

/// A user's application to become a marketer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MarketerRequest {
    pub id: String,
    pub user_id: String,
    pub profile: MarketerProfile,
    pub status: RequestStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl MarketerRequest {
    /// Builds a fresh pending request.
    pub fn submit(user_id: &str, profile: MarketerProfile, now: DateTime<Utc>) -> Self {
        MarketerRequest {
            id: new_id(),
            user_id: user_id.to_string(),
            profile,
            status: RequestStatus::Pending,
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Admin verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    /// The request status this decision leads to.
    pub const fn target_status(&self) -> RequestStatus {
        match self {
            ReviewDecision::Approve => RequestStatus::Approved,
            ReviewDecision::Reject => RequestStatus::Rejected,
        }
    }
}

// =============================================================================
// Purchase
// =============================================================================

/// What was bought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseType {
    Course,
    Section,
    Package,
}

/// A checkout, optionally discounted by a referral code.
///
/// ## Amounts
/// ```text
/// original_amount - discount_amount = amount   (amount is what was charged)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub purchase_type: PurchaseType,
    pub target_id: String,
    pub original_amount: Money,
    pub discount_amount: Money,
    pub amount: Money,
    pub referral_code_id: Option<String>,
    pub payment_status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Purchase {
    /// Builds a pending, undiscounted purchase.
    pub fn new_pending(
        user_id: &str,
        purchase_type: PurchaseType,
        target_id: &str,
        original_amount: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Purchase {
            id: new_id(),
            user_id: user_id.to_string(),
            purchase_type,
            target_id: target_id.to_string(),
            original_amount,
            discount_amount: Money::zero(),
            amount: original_amount,
            referral_code_id: None,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Attaches a code and its quoted discount to a pending purchase.
    pub fn apply_quote(&mut self, code_id: &str, quote: &Quote, now: DateTime<Utc>) -> CoreResult<()> {
        if self.payment_status != PaymentStatus::Pending {
            return Err(CoreError::PurchaseAlreadyFinalized {
                purchase_id: self.id.clone(),
                status: self.payment_status.to_string(),
            });
        }
        self.referral_code_id = Some(code_id.to_string());
        self.discount_amount = quote.discount_amount;
        self.amount = quote.final_amount;
        self.updated_at = now;
        Ok(())
    }

    /// Moves to `to`, enforcing the payment transition table.
    pub fn transition(&mut self, to: PaymentStatus, now: DateTime<Utc>) -> CoreResult<()> {
        self.payment_status.ensure_transition(&self.id, to)?;
        self.payment_status = to;
        self.updated_at = now;
        if to == PaymentStatus::Completed {
            self.completed_at = Some(now);
        }
        Ok(())
    }
}

/// Input for opening a purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchase {
    pub user_id: String,
    pub purchase_type: PurchaseType,
    pub target_id: String,
    pub original_amount: Money,
    /// Code entered at checkout, if any.
    #[serde(default)]
    pub referral_code: Option<String>,
}

// =============================================================================
// Commission
// =============================================================================

/// Commission owed to a marketer for one completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Commission {
    pub id: String,
    pub marketer_id: String,
    pub purchase_id: String,
    pub referral_code_id: String,
    /// Post-discount amount the commission was computed on.
    pub purchase_amount: Money,
    pub discount_amount: Money,
    #[ts(type = "string")]
    pub commission_percentage: Percentage,
    pub amount: Money,
    pub status: CommissionStatus,
    pub cancel_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Commission {
    /// Accrues a pending commission for a purchase paid with `code`.
    pub fn accrue(
        purchase: &Purchase,
        code: &ReferralCode,
        rate: Percentage,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Commission {
            id: new_id(),
            marketer_id: code.marketer_id.clone(),
            purchase_id: purchase.id.clone(),
            referral_code_id: code.id.clone(),
            purchase_amount: purchase.amount,
            discount_amount: purchase.discount_amount,
            commission_percentage: rate,
            amount,
            status: CommissionStatus::Pending,
            cancel_reason: None,
            created_at: now,
            paid_at: None,
            cancelled_at: None,
        }
    }

    /// Moves to `to`, enforcing the commission transition table.
    pub fn transition(
        &mut self,
        to: CommissionStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.status.ensure_transition(&self.id, to)?;
        self.status = to;
        match to {
            CommissionStatus::Paid => self.paid_at = Some(now),
            CommissionStatus::Cancelled => {
                self.cancelled_at = Some(now);
                self.cancel_reason = reason.map(str::to_string);
            }
            CommissionStatus::Pending => {}
        }
        Ok(())
    }
}

/// A purchase after finalization or refund, with its commission if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOutcome {
    pub purchase: Purchase,
    pub commission: Option<Commission>,
    /// `true` when finalize found the purchase already completed and
    /// returned the stored result.
    pub replayed: bool,
}

/// Ledger totals for one marketer.
///
/// `total = pending + paid`; cancelled commissions are reported separately
/// and never counted as earned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionTotals {
    pub total: Money,
    pub pending: Money,
    pub paid: Money,
    pub cancelled: Money,
}

impl CommissionTotals {
    /// Folds a ledger into totals.
    pub fn from_commissions<'a, I>(commissions: I) -> Self
    where
        I: IntoIterator<Item = &'a Commission>,
    {
        let mut totals = CommissionTotals::default();
        for commission in commissions {
            match commission.status {
                CommissionStatus::Pending => totals.pending += commission.amount,
                CommissionStatus::Paid => totals.paid += commission.amount,
                CommissionStatus::Cancelled => totals.cancelled += commission.amount,
            }
        }
        totals.total = totals.pending + totals.paid;
        totals
    }
}

/// Commission rows plus totals over the marketer's whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionListing {
    pub commissions: Vec<Commission>,
    pub totals: CommissionTotals,
}

/// Dashboard summary for one marketer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MarketerSummary {
    pub marketer_id: String,
    pub code_count: u32,
    pub active_code_count: u32,
    pub total_uses: u64,
    pub totals: CommissionTotals,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn code(current_uses: u32, max_uses: Option<u32>, is_active: bool) -> ReferralCode {
        let now = Utc::now();
        ReferralCode {
            id: new_id(),
            code: "SPRING24".to_string(),
            marketer_id: "m-1".to_string(),
            discount_percentage: None,
            commission_percentage: None,
            max_uses,
            current_uses,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    fn commission(status: CommissionStatus, amount: i64) -> Commission {
        let now = Utc::now();
        let purchase = Purchase::new_pending("u-1", PurchaseType::Course, "c-1", Money::from_toman(amount), now);
        let mut c = Commission::accrue(&purchase, &code(0, None, true), Percentage::from_bps(1000), Money::from_toman(amount), now);
        c.status = status;
        c
    }

    #[test]
    fn test_availability() {
        assert!(code(0, None, true).is_available());
        assert!(code(2, Some(3), true).is_available());
        assert_eq!(code(3, Some(3), true).availability(), Err(CodeUnavailable::Exhausted));
        assert_eq!(code(0, None, false).availability(), Err(CodeUnavailable::Inactive));
        assert!(matches!(
            code(3, Some(3), true).ensure_available(),
            Err(CoreError::UsageLimitReached { max_uses: 3, .. })
        ));
    }

    #[test]
    fn test_remaining_uses() {
        assert_eq!(code(1, Some(3), true).remaining_uses(), Some(2));
        assert_eq!(code(10, None, true).remaining_uses(), None);
    }

    #[test]
    fn test_patch_rename_locked_after_use() {
        let mut used = code(1, None, true);
        let patch = ReferralCodePatch {
            code: Some("RENAMED".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            used.apply_patch(&patch, Utc::now()),
            Err(CoreError::CodeLocked { .. })
        ));

        let mut fresh = code(0, None, true);
        fresh.apply_patch(&patch, Utc::now()).unwrap();
        assert_eq!(fresh.code, "RENAMED");
    }

    #[test]
    fn test_patch_same_code_on_used_code_is_allowed() {
        let mut used = code(2, None, true);
        let patch = ReferralCodePatch {
            code: Some("SPRING24".to_string()),
            is_active: Some(false),
            ..Default::default()
        };
        used.apply_patch(&patch, Utc::now()).unwrap();
        assert!(!used.is_active);
    }

    #[test]
    fn test_patch_max_uses_cannot_drop_below_current() {
        let mut c = code(5, Some(10), true);
        let patch = ReferralCodePatch {
            max_uses: Some(Some(4)),
            ..Default::default()
        };
        assert!(c.apply_patch(&patch, Utc::now()).is_err());
        assert_eq!(c.max_uses, Some(10));

        let patch = ReferralCodePatch {
            max_uses: Some(None),
            ..Default::default()
        };
        c.apply_patch(&patch, Utc::now()).unwrap();
        assert_eq!(c.max_uses, None);
    }

    #[test]
    fn test_patch_json_distinguishes_null_from_absent() {
        let patch: ReferralCodePatch =
            serde_json::from_str(r#"{"discount_percentage": null, "max_uses": 7}"#).unwrap();
        assert_eq!(patch.discount_percentage, Some(None));
        assert_eq!(patch.commission_percentage, None);
        assert_eq!(patch.max_uses, Some(Some(7)));

        let mut c = code(0, None, true);
        c.discount_percentage = Some(Percentage::from_bps(500));
        c.apply_patch(&patch, Utc::now()).unwrap();
        assert_eq!(c.discount_percentage, None);
        assert_eq!(c.max_uses, Some(7));
    }

    #[test]
    fn test_purchase_transitions() {
        let now = Utc::now();
        let mut p = Purchase::new_pending("u-1", PurchaseType::Section, "s-1", Money::from_toman(500), now);
        assert_eq!(p.amount, p.original_amount);

        p.transition(PaymentStatus::Completed, now).unwrap();
        assert_eq!(p.completed_at, Some(now));
        assert!(p.transition(PaymentStatus::Failed, now).is_err());
        p.transition(PaymentStatus::Refunded, now).unwrap();
        assert!(p.transition(PaymentStatus::Completed, now).is_err());
    }

    #[test]
    fn test_apply_quote_requires_pending() {
        let now = Utc::now();
        let quote = Quote {
            discount_percentage: Percentage::from_bps(1000),
            commission_percentage: Percentage::from_bps(1000),
            discount_amount: Money::from_toman(100),
            final_amount: Money::from_toman(900),
            commission_amount: Money::from_toman(90),
        };
        let mut p = Purchase::new_pending("u-1", PurchaseType::Course, "c-1", Money::from_toman(1000), now);
        p.apply_quote("code-1", &quote, now).unwrap();
        assert_eq!(p.amount.toman(), 900);
        assert_eq!(p.referral_code_id.as_deref(), Some("code-1"));

        p.transition(PaymentStatus::Failed, now).unwrap();
        assert!(matches!(
            p.apply_quote("code-1", &quote, now),
            Err(CoreError::PurchaseAlreadyFinalized { .. })
        ));
    }

    #[test]
    fn test_commission_cancel_records_reason() {
        let mut c = commission(CommissionStatus::Pending, 100);
        c.transition(CommissionStatus::Cancelled, Some("refund"), Utc::now()).unwrap();
        assert_eq!(c.cancel_reason.as_deref(), Some("refund"));
        assert!(c.cancelled_at.is_some());
        assert!(c.transition(CommissionStatus::Paid, None, Utc::now()).is_err());
    }

    #[test]
    fn test_totals_exclude_cancelled() {
        let ledger = vec![
            commission(CommissionStatus::Pending, 100),
            commission(CommissionStatus::Paid, 250),
            commission(CommissionStatus::Cancelled, 999),
            commission(CommissionStatus::Pending, 50),
        ];
        let totals = CommissionTotals::from_commissions(&ledger);
        assert_eq!(totals.pending.toman(), 150);
        assert_eq!(totals.paid.toman(), 250);
        assert_eq!(totals.cancelled.toman(), 999);
        assert_eq!(totals.total, totals.pending + totals.paid);
    }

    #[test]
    fn test_settings_patch() {
        let mut settings = ReferralCodeSettings {
            default_discount_percentage: Percentage::from_bps(1000),
            default_commission_percentage: Percentage::from_bps(1000),
            updated_at: Utc::now(),
        };
        let patch = SettingsPatch {
            default_commission_percentage: Some(Percentage::from_bps(1500)),
            ..Default::default()
        };
        assert!(settings.apply_patch(&patch, Utc::now()));
        assert_eq!(settings.default_commission_percentage.bps(), 1500);
        assert!(!settings.apply_patch(&patch, Utc::now()));
    }

    #[test]
    fn test_review_decision_targets() {
        assert_eq!(ReviewDecision::Approve.target_status(), RequestStatus::Approved);
        assert_eq!(ReviewDecision::Reject.target_status(), RequestStatus::Rejected);
    }
}
