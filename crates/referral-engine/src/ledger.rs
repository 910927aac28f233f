//! # Commission Ledger
//!
//! ```text
//! pending ──► paid        (admin payout)
//!    │
//!    └──────► cancelled   (admin, or refund of the purchase)
//! ```
//!
//! Totals are always folded over a marketer's whole ledger. A status filter
//! only narrows the rows returned alongside them.

use chrono::Utc;
use tracing::info;

use referral_core::validation::{validate_identifier, validate_notes};
use referral_core::{
    Commission, CommissionListing, CommissionStatus, CommissionTotals, CoreError, MarketerSummary,
    Money, StatusMachine,
};
use referral_db::{CommissionRepository, DbError};

use crate::{EngineResult, ReferralEngine};

impl ReferralEngine {
    /// Gets a commission by id.
    pub async fn get_commission(&self, commission_id: &str) -> EngineResult<Commission> {
        self.db
            .commissions()
            .get_by_id(commission_id)
            .await?
            .ok_or_else(|| CoreError::CommissionNotFound(commission_id.to_string()).into())
    }

    /// Marks a pending commission as paid out.
    pub async fn mark_commission_paid(&self, commission_id: &str) -> EngineResult<Commission> {
        let mut tx = self.db.begin().await?;
        let moved = CommissionRepository::mark_paid(&mut *tx, commission_id, Utc::now()).await?;
        let commission = CommissionRepository::fetch_by_id(&mut *tx, commission_id)
            .await?
            .ok_or_else(|| CoreError::CommissionNotFound(commission_id.to_string()))?;
        tx.commit().await.map_err(DbError::from)?;

        if !moved {
            commission
                .status
                .ensure_transition(commission_id, CommissionStatus::Paid)?;
        }

        info!(
            commission_id = %commission_id,
            marketer_id = %commission.marketer_id,
            amount = commission.amount.toman(),
            "Commission paid"
        );
        Ok(commission)
    }

    /// Cancels a pending commission without touching its purchase.
    pub async fn cancel_commission(&self, commission_id: &str, reason: Option<&str>) -> EngineResult<Commission> {
        if let Some(reason) = reason {
            validate_notes("reason", reason)?;
        }

        let mut tx = self.db.begin().await?;
        let moved = CommissionRepository::cancel(&mut *tx, commission_id, reason, Utc::now()).await?;
        let commission = CommissionRepository::fetch_by_id(&mut *tx, commission_id)
            .await?
            .ok_or_else(|| CoreError::CommissionNotFound(commission_id.to_string()))?;
        tx.commit().await.map_err(DbError::from)?;

        if !moved {
            commission
                .status
                .ensure_transition(commission_id, CommissionStatus::Cancelled)?;
        }

        info!(
            commission_id = %commission_id,
            marketer_id = %commission.marketer_id,
            reason = ?reason,
            "Commission cancelled"
        );
        Ok(commission)
    }

    /// A marketer's commissions, newest first, with whole-ledger totals.
    pub async fn list_commissions(
        &self,
        marketer_id: &str,
        status: Option<CommissionStatus>,
    ) -> EngineResult<CommissionListing> {
        validate_identifier("marketer_id", marketer_id)?;

        let ledger = self.db.commissions().list_by_marketer(marketer_id).await?;
        let totals = CommissionTotals::from_commissions(&ledger);
        let commissions = ledger
            .into_iter()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .collect();

        Ok(CommissionListing { commissions, totals })
    }

    /// Admin view across all marketers.
    pub async fn list_all_commissions(&self, status: Option<CommissionStatus>) -> EngineResult<Vec<Commission>> {
        Ok(self.db.commissions().list_all(status).await?)
    }

    /// Sum of everything still owed to marketers.
    pub async fn pending_commission_total(&self) -> EngineResult<Money> {
        Ok(self.db.commissions().pending_total().await?)
    }

    /// Dashboard numbers for one marketer.
    pub async fn marketer_summary(&self, marketer_id: &str) -> EngineResult<MarketerSummary> {
        validate_identifier("marketer_id", marketer_id)?;

        let counts = self.db.codes().counts_for_marketer(marketer_id).await?;
        let ledger = self.db.commissions().list_by_marketer(marketer_id).await?;

        let count = |field: &str, value: i64| {
            u32::try_from(value).map_err(|_| DbError::CorruptRow {
                table: "referral_codes",
                reason: format!("{field} out of range: {value}"),
            })
        };

        Ok(MarketerSummary {
            marketer_id: marketer_id.to_string(),
            code_count: count("count", counts.total)?,
            active_code_count: count("active count", counts.active)?,
            total_uses: u64::try_from(counts.uses).unwrap_or_default(),
            totals: CommissionTotals::from_commissions(&ledger),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{code_with, engine, new_purchase};
    use crate::EngineError;
    use crate::ReferralEngine;
    use referral_core::{CommissionStatus, CoreError, Money};

    async fn paid_checkout(engine: &ReferralEngine, code: &str, amount: i64) -> String {
        let purchase = engine
            .create_purchase(new_purchase("buyer", amount, Some(code)))
            .await
            .unwrap();
        engine
            .finalize_purchase(&purchase.id, None)
            .await
            .unwrap()
            .commission
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_pay_then_cancel_is_refused() {
        let engine = engine().await;
        code_with(&engine, "m-1", "LEDGER", 0, 1000, None).await;
        let id = paid_checkout(&engine, "LEDGER", 100_000).await;

        let paid = engine.mark_commission_paid(&id).await.unwrap();
        assert_eq!(paid.status, CommissionStatus::Paid);
        assert!(paid.paid_at.is_some());

        let err = engine.cancel_commission(&id, Some("late")).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidTransition { .. })
        ));
        let err = engine.mark_commission_paid(&id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidTransition { .. })
        ));
        let err = engine.mark_commission_paid("missing").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::CommissionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ledger_totals_stay_consistent() {
        let engine = engine().await;
        code_with(&engine, "m-1", "TOTALS", 0, 1000, None).await;

        let a = paid_checkout(&engine, "TOTALS", 100_000).await;
        let b = paid_checkout(&engine, "TOTALS", 200_000).await;
        paid_checkout(&engine, "TOTALS", 300_000).await;

        engine.mark_commission_paid(&a).await.unwrap();
        engine.cancel_commission(&b, Some("fraud check")).await.unwrap();

        let listing = engine.list_commissions("m-1", None).await.unwrap();
        assert_eq!(listing.commissions.len(), 3);
        assert_eq!(listing.totals.paid.toman(), 10_000);
        assert_eq!(listing.totals.cancelled.toman(), 20_000);
        assert_eq!(listing.totals.pending.toman(), 30_000);
        assert_eq!(listing.totals.total, listing.totals.pending + listing.totals.paid);

        let by_status: Money = listing
            .commissions
            .iter()
            .filter(|c| c.status != CommissionStatus::Cancelled)
            .map(|c| c.amount)
            .sum();
        assert_eq!(by_status, listing.totals.total);

        // Filter narrows rows, not totals
        let pending = engine
            .list_commissions("m-1", Some(CommissionStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.commissions.len(), 1);
        assert_eq!(pending.totals, listing.totals);

        assert_eq!(engine.pending_commission_total().await.unwrap().toman(), 30_000);
        assert_eq!(
            engine
                .list_all_commissions(Some(CommissionStatus::Paid))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_marketer_summary() {
        let engine = engine().await;
        code_with(&engine, "m-1", "SUMA", 0, 1000, None).await;
        code_with(&engine, "m-1", "SUMB", 0, 1000, None).await;
        paid_checkout(&engine, "SUMA", 100_000).await;
        paid_checkout(&engine, "SUMA", 100_000).await;

        let summary = engine.marketer_summary("m-1").await.unwrap();
        assert_eq!(summary.code_count, 2);
        assert_eq!(summary.active_code_count, 2);
        assert_eq!(summary.total_uses, 2);
        assert_eq!(summary.totals.pending.toman(), 20_000);

        let empty = engine.marketer_summary("nobody").await.unwrap();
        assert_eq!(empty.code_count, 0);
        assert_eq!(empty.totals.total, Money::zero());
    }
}
