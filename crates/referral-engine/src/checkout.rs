//! # Checkout: Purchases, Finalization, Refunds
//!
//! Finalization is the only path that consumes code uses and writes the
//! ledger. It runs as ONE transaction:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   ├── lock purchase row (write lock first, see lock_for_update)         │
//! │   ├── completed?  ──► return stored purchase + commission (replay)      │
//! │   ├── failed/refunded? ──► PurchaseAlreadyFinalized                     │
//! │   ├── attach code given at payment time (if none attached yet)         │
//! │   ├── try_claim_use(code)  ──► refused? ROLLBACK, nothing written       │
//! │   ├── purchase: pending → completed                                     │
//! │   └── commission (pending) on the post-discount amount                  │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A crash anywhere before COMMIT leaves no claim, no status flip and no
//! commission. Busy-database failures retry the whole transaction.

use chrono::Utc;
use tracing::info;

use referral_core::calculator::{compute_commission, quote, resolve_rates};
use referral_core::validation::{validate_amount, validate_code, validate_identifier, validate_notes};
use referral_core::{
    Commission, CommissionStatus, CoreError, Money, NewPurchase, PaymentStatus, Purchase,
    PurchaseOutcome, StatusMachine,
};
use referral_db::{
    CommissionRepository, DbError, PurchaseRepository, ReferralCodeRepository, SettingsRepository,
};

use crate::{EngineResult, ReferralEngine};

/// Stored on the commission when a refund gives no reason.
const DEFAULT_REFUND_REASON: &str = "purchase refunded";

fn purchase_not_found(purchase_id: &str) -> CoreError {
    CoreError::PurchaseNotFound(purchase_id.to_string())
}

impl ReferralEngine {
    // =========================================================================
    // Purchases
    // =========================================================================

    /// Opens a pending purchase, priced under `referral_code` if given.
    ///
    /// Pricing uses the same calculator as [`Self::preview_discount`]. No
    /// use is consumed until finalization.
    pub async fn create_purchase(&self, input: NewPurchase) -> EngineResult<Purchase> {
        validate_identifier("user_id", &input.user_id)?;
        validate_identifier("target_id", &input.target_id)?;
        validate_amount("original_amount", input.original_amount)?;

        let now = Utc::now();
        let mut purchase = Purchase::new_pending(
            &input.user_id,
            input.purchase_type,
            &input.target_id,
            input.original_amount,
            now,
        );

        if let Some(value) = input.referral_code.as_deref() {
            let code = self.get_code_by_value(value).await?;
            code.ensure_available()?;
            let settings = self.get_settings().await?;
            purchase.apply_quote(&code.id, &quote(purchase.original_amount, &code, &settings), now)?;
        }

        self.db.purchases().insert(&purchase).await?;
        info!(
            purchase_id = %purchase.id,
            user_id = %purchase.user_id,
            amount = purchase.amount.toman(),
            referral_code_id = ?purchase.referral_code_id,
            "Purchase opened"
        );
        Ok(purchase)
    }

    /// Gets a purchase by id.
    pub async fn get_purchase(&self, purchase_id: &str) -> EngineResult<Purchase> {
        self.db
            .purchases()
            .get_by_id(purchase_id)
            .await?
            .ok_or_else(|| purchase_not_found(purchase_id).into())
    }

    /// Re-prices a pending purchase under another code, or none.
    ///
    /// Used by checkout when the attached code became unusable before
    /// payment: the customer pays the new amount and finalization proceeds
    /// without (or with the new) referral.
    pub async fn reprice_purchase(&self, purchase_id: &str, code: Option<&str>) -> EngineResult<Purchase> {
        if let Some(code) = code {
            validate_code(code)?;
        }
        self.retrying("reprice_purchase", || self.reprice_once(purchase_id, code))
            .await
    }

    async fn reprice_once(&self, purchase_id: &str, code: Option<&str>) -> EngineResult<Purchase> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        if !PurchaseRepository::lock_for_update(&mut *tx, purchase_id).await? {
            return Err(purchase_not_found(purchase_id).into());
        }
        let mut purchase = PurchaseRepository::fetch_by_id(&mut *tx, purchase_id)
            .await?
            .ok_or_else(|| purchase_not_found(purchase_id))?;
        if purchase.payment_status != PaymentStatus::Pending {
            return Err(CoreError::PurchaseAlreadyFinalized {
                purchase_id: purchase.id,
                status: purchase.payment_status.to_string(),
            }
            .into());
        }

        purchase.referral_code_id = None;
        purchase.discount_amount = Money::zero();
        purchase.amount = purchase.original_amount;
        purchase.updated_at = now;

        if let Some(value) = code {
            let code = ReferralCodeRepository::fetch_by_code(&mut *tx, value)
                .await?
                .ok_or_else(|| CoreError::CodeNotFound(value.to_string()))?;
            code.ensure_available()?;
            let settings = SettingsRepository::load(&mut *tx, self.config.seed_settings).await?;
            purchase.apply_quote(&code.id, &quote(purchase.original_amount, &code, &settings), now)?;
        }

        PurchaseRepository::update_pricing(&mut *tx, &purchase).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            purchase_id = %purchase_id,
            amount = purchase.amount.toman(),
            referral_code_id = ?purchase.referral_code_id,
            "Purchase re-priced"
        );
        Ok(purchase)
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// Completes a purchase after the payment gateway reported success.
    ///
    /// `code` is the code entered at payment time; it is attached if the
    /// purchase has none and must match the attached one otherwise.
    ///
    /// ## Idempotence
    /// Calling this again on a completed purchase returns the stored
    /// purchase and commission with `replayed = true`.
    ///
    /// ## Errors
    /// - `PurchaseNotFound`, `PurchaseAlreadyFinalized` (failed/refunded)
    /// - `CodeNotFound`, `CodeInactive`, `UsageLimitReached` from the claim
    /// - `ReferralCodeMismatch` when `code` differs from the attached code
    pub async fn finalize_purchase(
        &self,
        purchase_id: &str,
        code: Option<&str>,
    ) -> EngineResult<PurchaseOutcome> {
        if let Some(code) = code {
            validate_code(code)?;
        }
        self.retrying("finalize_purchase", || self.finalize_once(purchase_id, code))
            .await
    }

    async fn finalize_once(&self, purchase_id: &str, code: Option<&str>) -> EngineResult<PurchaseOutcome> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        if !PurchaseRepository::lock_for_update(&mut *tx, purchase_id).await? {
            return Err(purchase_not_found(purchase_id).into());
        }
        let mut purchase = PurchaseRepository::fetch_by_id(&mut *tx, purchase_id)
            .await?
            .ok_or_else(|| purchase_not_found(purchase_id))?;

        match purchase.payment_status {
            PaymentStatus::Pending => {}
            PaymentStatus::Completed => {
                let commission = CommissionRepository::fetch_by_purchase(&mut *tx, purchase_id).await?;
                info!(purchase_id = %purchase_id, "Finalize replayed on completed purchase");
                return Ok(PurchaseOutcome {
                    purchase,
                    commission,
                    replayed: true,
                });
            }
            status => {
                return Err(CoreError::PurchaseAlreadyFinalized {
                    purchase_id: purchase.id,
                    status: status.to_string(),
                }
                .into());
            }
        }

        let mut settings = None;
        if let Some(value) = code {
            let code = ReferralCodeRepository::fetch_by_code(&mut *tx, value)
                .await?
                .ok_or_else(|| CoreError::CodeNotFound(value.to_string()))?;

            match purchase.referral_code_id.as_deref() {
                Some(attached) if attached != code.id => {
                    return Err(CoreError::ReferralCodeMismatch {
                        purchase_id: purchase.id,
                    }
                    .into());
                }
                Some(_) => {}
                None => {
                    let loaded = SettingsRepository::load(&mut *tx, self.config.seed_settings).await?;
                    purchase.apply_quote(&code.id, &quote(purchase.original_amount, &code, &loaded), now)?;
                    PurchaseRepository::update_pricing(&mut *tx, &purchase).await?;
                    settings = Some(loaded);
                }
            }
        }

        let commission = match purchase.referral_code_id.clone() {
            Some(code_id) => {
                let claimed = ReferralCodeRepository::try_claim_use(&mut *tx, &code_id).await??;
                let settings = match settings {
                    Some(loaded) => loaded,
                    None => SettingsRepository::load(&mut *tx, self.config.seed_settings).await?,
                };
                let rate = resolve_rates(&claimed.code, &settings).commission;
                let amount = compute_commission(purchase.amount, &claimed.code, &settings);
                Some(Commission::accrue(&purchase, &claimed.code, rate, amount, now))
            }
            None => None,
        };

        purchase.transition(PaymentStatus::Completed, now)?;
        if !PurchaseRepository::transition(
            &mut *tx,
            purchase_id,
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            now,
        )
        .await?
        {
            return Err(DbError::Internal(format!("purchase {purchase_id} changed while locked")).into());
        }

        if let Some(commission) = &commission {
            CommissionRepository::insert(&mut *tx, commission).await?;
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            purchase_id = %purchase_id,
            amount = purchase.amount.toman(),
            commission = commission.as_ref().map(|c| c.amount.toman()),
            marketer_id = ?commission.as_ref().map(|c| c.marketer_id.as_str()),
            "Purchase finalized"
        );

        Ok(PurchaseOutcome {
            purchase,
            commission,
            replayed: false,
        })
    }

    // =========================================================================
    // Failure & Refund
    // =========================================================================

    /// Records a failed payment. Repeating it on a failed purchase is a no-op.
    pub async fn mark_purchase_failed(&self, purchase_id: &str) -> EngineResult<Purchase> {
        self.retrying("mark_purchase_failed", || self.fail_once(purchase_id))
            .await
    }

    async fn fail_once(&self, purchase_id: &str) -> EngineResult<Purchase> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let moved = PurchaseRepository::transition(
            &mut *tx,
            purchase_id,
            PaymentStatus::Pending,
            PaymentStatus::Failed,
            now,
        )
        .await?;
        let purchase = PurchaseRepository::fetch_by_id(&mut *tx, purchase_id)
            .await?
            .ok_or_else(|| purchase_not_found(purchase_id))?;
        tx.commit().await.map_err(DbError::from)?;

        if moved {
            info!(purchase_id = %purchase_id, "Purchase payment failed");
        } else if purchase.payment_status != PaymentStatus::Failed {
            purchase
                .payment_status
                .ensure_transition(purchase_id, PaymentStatus::Failed)?;
        }
        Ok(purchase)
    }

    /// Refunds a completed purchase and cancels its pending commission in
    /// the same transaction.
    ///
    /// ## Errors
    /// `InvalidTransition` if the purchase is not completed, or if its
    /// commission was already paid (that needs manual reconciliation).
    pub async fn refund_purchase(&self, purchase_id: &str, reason: Option<&str>) -> EngineResult<PurchaseOutcome> {
        if let Some(reason) = reason {
            validate_notes("reason", reason)?;
        }
        let reason = reason.unwrap_or(DEFAULT_REFUND_REASON);
        self.retrying("refund_purchase", || self.refund_once(purchase_id, reason))
            .await
    }

    async fn refund_once(&self, purchase_id: &str, reason: &str) -> EngineResult<PurchaseOutcome> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let moved = PurchaseRepository::transition(
            &mut *tx,
            purchase_id,
            PaymentStatus::Completed,
            PaymentStatus::Refunded,
            now,
        )
        .await?;
        let purchase = PurchaseRepository::fetch_by_id(&mut *tx, purchase_id)
            .await?
            .ok_or_else(|| purchase_not_found(purchase_id))?;
        if !moved {
            purchase
                .payment_status
                .ensure_transition(purchase_id, PaymentStatus::Refunded)?;
            return Err(DbError::Internal(format!("purchase {purchase_id} refund did not apply")).into());
        }

        let commission = match CommissionRepository::fetch_by_purchase(&mut *tx, purchase_id).await? {
            Some(mut commission) => {
                if commission.status != CommissionStatus::Cancelled {
                    commission.transition(CommissionStatus::Cancelled, Some(reason), now)?;
                    if !CommissionRepository::cancel(&mut *tx, &commission.id, Some(reason), now).await? {
                        return Err(DbError::Internal(format!(
                            "commission {} changed during refund",
                            commission.id
                        ))
                        .into());
                    }
                }
                Some(commission)
            }
            None => None,
        };

        tx.commit().await.map_err(DbError::from)?;

        info!(
            purchase_id = %purchase_id,
            commission_id = ?commission.as_ref().map(|c| c.id.as_str()),
            reason = %reason,
            "Purchase refunded"
        );

        Ok(PurchaseOutcome {
            purchase,
            commission,
            replayed: false,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
