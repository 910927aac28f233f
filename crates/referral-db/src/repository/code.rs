//! # Referral Code Repository
//!
//! Database operations for referral codes, including the one place where
//! `current_uses` is ever incremented.
//!
//! ## The Atomic Claim
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE referral_codes                                                  │
//! │     SET current_uses = current_uses + 1                                 │
//! │   WHERE id = ?                                                          │
//! │     AND is_active = 1                                                   │
//! │     AND (max_uses IS NULL OR current_uses < max_uses)                   │
//! │                                                                         │
//! │  rows_affected == 1 ──► claimed (re-read the row for the new count)    │
//! │  rows_affected == 0 ──► re-read to tell NotFound / Inactive / Limit    │
//! │                                                                         │
//! │  Check and increment are one statement, so N concurrent claimers on a  │
//! │  code with K uses left produce exactly K successes, never K + 1.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{column_percentage, column_u32};
use referral_core::{ClaimError, ClaimedUse, CodeFilter, ReferralCode};

const TABLE: &str = "referral_codes";

const SELECT_COLUMNS: &str = r#"
    SELECT id, code, marketer_id, discount_bps, commission_bps,
           max_uses, current_uses, is_active, created_at, updated_at
    FROM referral_codes
"#;

#[derive(Debug, FromRow)]
struct ReferralCodeRecord {
    id: String,
    code: String,
    marketer_id: String,
    discount_bps: Option<i64>,
    commission_bps: Option<i64>,
    max_uses: Option<i64>,
    current_uses: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReferralCodeRecord> for ReferralCode {
    type Error = DbError;

    fn try_from(row: ReferralCodeRecord) -> Result<Self, Self::Error> {
        Ok(ReferralCode {
            discount_percentage: row
                .discount_bps
                .map(|bps| column_percentage(TABLE, "discount_bps", bps))
                .transpose()?,
            commission_percentage: row
                .commission_bps
                .map(|bps| column_percentage(TABLE, "commission_bps", bps))
                .transpose()?,
            max_uses: row
                .max_uses
                .map(|max| column_u32(TABLE, "max_uses", max))
                .transpose()?,
            current_uses: column_u32(TABLE, "current_uses", row.current_uses)?,
            id: row.id,
            code: row.code,
            marketer_id: row.marketer_id,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_codes(rows: Vec<ReferralCodeRecord>) -> DbResult<Vec<ReferralCode>> {
    rows.into_iter().map(ReferralCode::try_from).collect()
}

/// Code counts for one marketer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct CodeCounts {
    pub total: i64,
    pub active: i64,
    pub uses: i64,
}

/// Repository for referral code database operations.
#[derive(Debug, Clone)]
pub struct ReferralCodeRepository {
    pool: SqlitePool,
}

impl ReferralCodeRepository {
    /// Creates a new ReferralCodeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReferralCodeRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a code by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ReferralCode>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_by_id(&mut conn, id).await
    }

    /// Gets a code by its exact (case-sensitive) code string.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<ReferralCode>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_by_code(&mut conn, code).await
    }

    /// Lists codes matching `filter`, newest first.
    pub async fn list(&self, filter: &CodeFilter) -> DbResult<Vec<ReferralCode>> {
        let sql = format!(
            "{SELECT_COLUMNS}
             WHERE (?1 IS NULL OR marketer_id = ?1)
               AND (?2 IS NULL OR is_active = ?2)
             ORDER BY created_at DESC, id"
        );

        let rows = sqlx::query_as::<_, ReferralCodeRecord>(&sql)
            .bind(filter.marketer_id.as_deref())
            .bind(filter.is_active)
            .fetch_all(&self.pool)
            .await?;

        into_codes(rows)
    }

    /// Counts a marketer's codes, active codes and total claimed uses.
    pub async fn counts_for_marketer(&self, marketer_id: &str) -> DbResult<CodeCounts> {
        let counts = sqlx::query_as::<_, CodeCounts>(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) AS active,
                   COALESCE(SUM(current_uses), 0) AS uses
            FROM referral_codes
            WHERE marketer_id = ?1
            "#,
        )
        .bind(marketer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }

    /// Gets a code by ID on an existing connection.
    pub async fn fetch_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<ReferralCode>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        sqlx::query_as::<_, ReferralCodeRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(ReferralCode::try_from)
            .transpose()
    }

    /// Gets a code by code string on an existing connection.
    pub async fn fetch_by_code(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> DbResult<Option<ReferralCode>> {
        let sql = format!("{SELECT_COLUMNS} WHERE code = ?1");
        sqlx::query_as::<_, ReferralCodeRecord>(&sql)
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?
            .map(ReferralCode::try_from)
            .transpose()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a new code.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation { field: "referral_codes.code", .. }` when the
    /// code string is taken.
    pub async fn insert(&self, code: &ReferralCode) -> DbResult<()> {
        debug!(id = %code.id, code = %code.code, marketer_id = %code.marketer_id, "Inserting referral code");

        sqlx::query(
            r#"
            INSERT INTO referral_codes (
                id, code, marketer_id, discount_bps, commission_bps,
                max_uses, current_uses, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&code.id)
        .bind(&code.code)
        .bind(&code.marketer_id)
        .bind(code.discount_percentage.map(|p| p.bps() as i64))
        .bind(code.commission_percentage.map(|p| p.bps() as i64))
        .bind(code.max_uses.map(i64::from))
        .bind(code.current_uses as i64)
        .bind(code.is_active)
        .bind(code.created_at)
        .bind(code.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, code.code.clone()),
            other => other,
        })?;

        Ok(())
    }

    /// Writes the admin-editable fields of `code`.
    ///
    /// The write only lands if `current_uses` still equals `expected_uses`,
    /// so a claim that slipped in after the caller's read is never lost and
    /// the caller's rename/limit checks stay valid. Returns `false` when the
    /// row moved on (or vanished).
    pub async fn update_if_uses(&self, code: &ReferralCode, expected_uses: u32) -> DbResult<bool> {
        debug!(id = %code.id, code = %code.code, "Updating referral code");

        let result = sqlx::query(
            r#"
            UPDATE referral_codes
            SET code = ?1,
                discount_bps = ?2,
                commission_bps = ?3,
                max_uses = ?4,
                is_active = ?5,
                updated_at = ?6
            WHERE id = ?7 AND current_uses = ?8
            "#,
        )
        .bind(&code.code)
        .bind(code.discount_percentage.map(|p| p.bps() as i64))
        .bind(code.commission_percentage.map(|p| p.bps() as i64))
        .bind(code.max_uses.map(i64::from))
        .bind(code.is_active)
        .bind(code.updated_at)
        .bind(&code.id)
        .bind(expected_uses as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, code.code.clone()),
            other => other,
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a code that has never been used and that no pending purchase
    /// is priced under. Returns `false` if the code is missing, has uses, or
    /// is still attached to an open purchase.
    pub async fn delete_unused(&self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deleting referral code");

        let result = sqlx::query(
            r#"
            DELETE FROM referral_codes
            WHERE id = ?1
              AND current_uses = 0
              AND NOT EXISTS (
                  SELECT 1 FROM purchases
                  WHERE referral_code_id = ?1 AND payment_status = 'pending'
              )
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically consumes one use of a code.
    ///
    /// ## Returns
    /// * `Ok(Ok(ClaimedUse))` - Claimed; `code.current_uses` is the new count
    /// * `Ok(Err(ClaimError))` - Refused (missing, inactive, limit reached)
    /// * `Err(DbError)` - Storage failure
    ///
    /// Runs on the caller's connection so the claim commits or rolls back
    /// together with the rest of finalization.
    pub async fn try_claim_use(
        conn: &mut SqliteConnection,
        code_id: &str,
    ) -> DbResult<Result<ClaimedUse, ClaimError>> {
        let result = sqlx::query(
            r#"
            UPDATE referral_codes
            SET current_uses = current_uses + 1,
                updated_at = ?1
            WHERE id = ?2
              AND is_active = 1
              AND (max_uses IS NULL OR current_uses < max_uses)
            "#,
        )
        .bind(Utc::now())
        .bind(code_id)
        .execute(&mut *conn)
        .await?;

        let current = Self::fetch_by_id(conn, code_id).await?;

        let outcome = match (result.rows_affected(), current) {
            (_, None) => Err(ClaimError::NotFound {
                code_id: code_id.to_string(),
            }),
            (0, Some(code)) if !code.is_active => Err(ClaimError::Inactive { code: code.code }),
            (0, Some(code)) => Err(ClaimError::LimitReached {
                max_uses: code.max_uses.unwrap_or(code.current_uses),
                code: code.code,
            }),
            (_, Some(code)) => {
                debug!(code = %code.code, current_uses = code.current_uses, "Claimed referral code use");
                Ok(ClaimedUse { code })
            }
        };

        Ok(outcome)
    }
}

// =============================================================================
// Tests
// =============================================================================
