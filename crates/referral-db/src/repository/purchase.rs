//! # Purchase Repository
//!
//! Database operations for purchases.
//!
//! ## Purchase Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. OPEN                                                               │
//! │     └── insert() → Purchase { payment_status: pending }                │
//! │                                                                         │
//! │  2. (OPTIONAL) ATTACH CODE                                             │
//! │     └── update_pricing() → discount_amount, amount, referral_code_id   │
//! │                                                                         │
//! │  3. SETTLE (inside the engine's finalize transaction)                  │
//! │     └── transition(pending → completed | failed)                       │
//! │                                                                         │
//! │  4. (OPTIONAL) REFUND                                                  │
//! │     └── transition(completed → refunded)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every status write is conditional on the expected `from` status.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use referral_core::{Money, PaymentStatus, Purchase, PurchaseType};

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, purchase_type, target_id, original_amount,
           discount_amount, amount, referral_code_id, payment_status,
           created_at, updated_at, completed_at
    FROM purchases
"#;

#[derive(Debug, FromRow)]
struct PurchaseRecord {
    id: String,
    user_id: String,
    purchase_type: PurchaseType,
    target_id: String,
    original_amount: i64,
    discount_amount: i64,
    amount: i64,
    referral_code_id: Option<String>,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<PurchaseRecord> for Purchase {
    fn from(row: PurchaseRecord) -> Self {
        Purchase {
            id: row.id,
            user_id: row.user_id,
            purchase_type: row.purchase_type,
            target_id: row.target_id,
            original_amount: Money::from_toman(row.original_amount),
            discount_amount: Money::from_toman(row.discount_amount),
            amount: Money::from_toman(row.amount),
            referral_code_id: row.referral_code_id,
            payment_status: row.payment_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        }
    }
}

/// Repository for purchase database operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Inserts a new purchase.
    pub async fn insert(&self, purchase: &Purchase) -> DbResult<()> {
        debug!(
            id = %purchase.id,
            user_id = %purchase.user_id,
            amount = purchase.amount.toman(),
            "Inserting purchase"
        );

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, user_id, purchase_type, target_id, original_amount,
                discount_amount, amount, referral_code_id, payment_status,
                created_at, updated_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.user_id)
        .bind(purchase.purchase_type)
        .bind(&purchase.target_id)
        .bind(purchase.original_amount.toman())
        .bind(purchase.discount_amount.toman())
        .bind(purchase.amount.toman())
        .bind(&purchase.referral_code_id)
        .bind(purchase.payment_status)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .bind(purchase.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a purchase by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Purchase>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_by_id(&mut conn, id).await
    }

    /// Gets a purchase by ID on an existing connection.
    pub async fn fetch_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Purchase>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row = sqlx::query_as::<_, PurchaseRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.map(Purchase::from))
    }

    /// Counts pending purchases priced under a code.
    pub async fn count_pending_for_code(&self, code_id: &str) -> DbResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM purchases WHERE referral_code_id = ?1 AND payment_status = 'pending'",
        )
        .bind(code_id)
        .fetch_one(&self.pool)
        .await?;

        u32::try_from(count).map_err(|_| DbError::CorruptRow {
            table: "purchases",
            reason: format!("pending count out of range: {count}"),
        })
    }

    /// Touches the purchase row so the surrounding transaction holds the
    /// SQLite write lock before it reads anything.
    ///
    /// A deferred transaction that reads first and writes later fails with
    /// `SQLITE_BUSY` without waiting if another writer commits in between;
    /// one that writes first waits on `busy_timeout` instead. Returns `false`
    /// if the purchase does not exist.
    pub async fn lock_for_update(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE purchases SET updated_at = updated_at WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rewrites code and pricing of a still-pending purchase.
    pub async fn update_pricing(conn: &mut SqliteConnection, purchase: &Purchase) -> DbResult<bool> {
        debug!(
            id = %purchase.id,
            discount = purchase.discount_amount.toman(),
            amount = purchase.amount.toman(),
            "Updating purchase pricing"
        );

        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET referral_code_id = ?1,
                discount_amount = ?2,
                amount = ?3,
                updated_at = ?4
            WHERE id = ?5 AND payment_status = 'pending'
            "#,
        )
        .bind(&purchase.referral_code_id)
        .bind(purchase.discount_amount.toman())
        .bind(purchase.amount.toman())
        .bind(purchase.updated_at)
        .bind(&purchase.id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Moves a purchase from `from` to `to`.
    ///
    /// `completed_at` is stamped when `to` is `Completed`. Returns `false` if
    /// the purchase is missing or no longer in `from`.
    pub async fn transition(
        conn: &mut SqliteConnection,
        id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, %from, %to, "Purchase status transition");

        let completed_at = (to == PaymentStatus::Completed).then_some(now);
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET payment_status = ?1,
                updated_at = ?2,
                completed_at = COALESCE(?3, completed_at)
            WHERE id = ?4 AND payment_status = ?5
            "#,
        )
        .bind(to)
        .bind(now)
        .bind(completed_at)
        .bind(id)
        .bind(from)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::CheckViolation { message } => DbError::Internal(format!(
                "purchase {id} rejected status {to}: {message}"
            )),
            other => other,
        })?;

        Ok(result.rows_affected() > 0)
    }
}
