//! # Commission Repository
//!
//! The commission ledger. `UNIQUE(purchase_id)` guarantees at most one
//! commission per purchase no matter how often finalization is retried.
//! Status writes are conditional on the row still being `pending`.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::column_percentage;
use referral_core::{Commission, CommissionStatus, Money};

const TABLE: &str = "commissions";

const SELECT_COLUMNS: &str = r#"
    SELECT id, marketer_id, purchase_id, referral_code_id, purchase_amount,
           discount_amount, commission_bps, amount, status, cancel_reason,
           created_at, paid_at, cancelled_at
    FROM commissions
"#;

#[derive(Debug, FromRow)]
struct CommissionRecord {
    id: String,
    marketer_id: String,
    purchase_id: String,
    referral_code_id: String,
    purchase_amount: i64,
    discount_amount: i64,
    commission_bps: i64,
    amount: i64,
    status: CommissionStatus,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<CommissionRecord> for Commission {
    type Error = DbError;

    fn try_from(row: CommissionRecord) -> Result<Self, Self::Error> {
        Ok(Commission {
            commission_percentage: column_percentage(TABLE, "commission_bps", row.commission_bps)?,
            id: row.id,
            marketer_id: row.marketer_id,
            purchase_id: row.purchase_id,
            referral_code_id: row.referral_code_id,
            purchase_amount: Money::from_toman(row.purchase_amount),
            discount_amount: Money::from_toman(row.discount_amount),
            amount: Money::from_toman(row.amount),
            status: row.status,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            paid_at: row.paid_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

fn into_commissions(rows: Vec<CommissionRecord>) -> DbResult<Vec<Commission>> {
    rows.into_iter().map(Commission::try_from).collect()
}

/// Repository for commission database operations.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    /// Creates a new CommissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a commission by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Commission>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_by_id(&mut conn, id).await
    }

    /// Gets the commission of a purchase, if one was accrued.
    pub async fn get_by_purchase(&self, purchase_id: &str) -> DbResult<Option<Commission>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_by_purchase(&mut conn, purchase_id).await
    }

    /// A marketer's full ledger, newest first.
    pub async fn list_by_marketer(&self, marketer_id: &str) -> DbResult<Vec<Commission>> {
        let sql = format!("{SELECT_COLUMNS} WHERE marketer_id = ?1 ORDER BY created_at DESC, rowid DESC");
        let rows = sqlx::query_as::<_, CommissionRecord>(&sql)
            .bind(marketer_id)
            .fetch_all(&self.pool)
            .await?;

        into_commissions(rows)
    }

    /// All commissions, optionally by status, newest first.
    pub async fn list_all(&self, status: Option<CommissionStatus>) -> DbResult<Vec<Commission>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, CommissionRecord>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        into_commissions(rows)
    }

    /// Sum of all pending commissions (platform payout liability).
    pub async fn pending_total(&self) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM commissions WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_toman(total))
    }

    /// Gets a commission by ID on an existing connection.
    pub async fn fetch_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Commission>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        sqlx::query_as::<_, CommissionRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(Commission::try_from)
            .transpose()
    }

    /// Gets the commission of a purchase on an existing connection.
    pub async fn fetch_by_purchase(
        conn: &mut SqliteConnection,
        purchase_id: &str,
    ) -> DbResult<Option<Commission>> {
        let sql = format!("{SELECT_COLUMNS} WHERE purchase_id = ?1");
        sqlx::query_as::<_, CommissionRecord>(&sql)
            .bind(purchase_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(Commission::try_from)
            .transpose()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a commission on the caller's connection.
    ///
    /// ## Errors
    /// `UniqueViolation` on `commissions.purchase_id` if the purchase already
    /// has a commission.
    pub async fn insert(conn: &mut SqliteConnection, commission: &Commission) -> DbResult<()> {
        debug!(
            id = %commission.id,
            purchase_id = %commission.purchase_id,
            marketer_id = %commission.marketer_id,
            amount = commission.amount.toman(),
            "Inserting commission"
        );

        sqlx::query(
            r#"
            INSERT INTO commissions (
                id, marketer_id, purchase_id, referral_code_id, purchase_amount,
                discount_amount, commission_bps, amount, status, cancel_reason,
                created_at, paid_at, cancelled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&commission.id)
        .bind(&commission.marketer_id)
        .bind(&commission.purchase_id)
        .bind(&commission.referral_code_id)
        .bind(commission.purchase_amount.toman())
        .bind(commission.discount_amount.toman())
        .bind(commission.commission_percentage.bps() as i64)
        .bind(commission.amount.toman())
        .bind(commission.status)
        .bind(&commission.cancel_reason)
        .bind(commission.created_at)
        .bind(commission.paid_at)
        .bind(commission.cancelled_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, commission.purchase_id.clone())
            }
            other => other,
        })?;

        Ok(())
    }

    /// Marks a pending commission paid on the caller's connection.
    /// Returns `false` if it is not pending.
    pub async fn mark_paid(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        debug!(id = %id, "Marking commission paid");

        let result = sqlx::query(
            r#"
            UPDATE commissions
            SET status = 'paid', paid_at = ?1
            WHERE id = ?2 AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancels a pending commission on the caller's connection.
    /// Returns `false` if it is not pending.
    pub async fn cancel(
        conn: &mut SqliteConnection,
        id: &str,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, reason = ?reason, "Cancelling commission");

        let result = sqlx::query(
            r#"
            UPDATE commissions
            SET status = 'cancelled', cancel_reason = ?1, cancelled_at = ?2
            WHERE id = ?3 AND status = 'pending'
            "#,
        )
        .bind(reason)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
