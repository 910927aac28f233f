//! # Settings Repository
//!
//! The `referral_settings` table holds exactly one row (`id = 1`, enforced
//! by a CHECK constraint). It is created lazily on first read from the
//! configured defaults and only changed by explicit saves.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::column_percentage;
use referral_core::{Percentage, ReferralCodeSettings, DEFAULT_COMMISSION_BPS, DEFAULT_DISCOUNT_BPS};

/// Rates written when the settings row does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsDefaults {
    pub discount: Percentage,
    pub commission: Percentage,
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        SettingsDefaults {
            discount: Percentage::from_bps(DEFAULT_DISCOUNT_BPS),
            commission: Percentage::from_bps(DEFAULT_COMMISSION_BPS),
        }
    }
}

#[derive(Debug, FromRow)]
struct SettingsRecord {
    default_discount_bps: i64,
    default_commission_bps: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettingsRecord> for ReferralCodeSettings {
    type Error = DbError;

    fn try_from(row: SettingsRecord) -> Result<Self, Self::Error> {
        Ok(ReferralCodeSettings {
            default_discount_percentage: column_percentage(
                "referral_settings",
                "default_discount_bps",
                row.default_discount_bps,
            )?,
            default_commission_percentage: column_percentage(
                "referral_settings",
                "default_commission_bps",
                row.default_commission_bps,
            )?,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for the settings singleton.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Loads the settings, creating the row from `defaults` if missing.
    pub async fn load_or_init(&self, defaults: SettingsDefaults) -> DbResult<ReferralCodeSettings> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut conn, defaults).await
    }

    /// Persists new default rates.
    pub async fn save(&self, settings: &ReferralCodeSettings) -> DbResult<()> {
        info!(
            discount = %settings.default_discount_percentage,
            commission = %settings.default_commission_percentage,
            "Saving referral settings"
        );

        sqlx::query(
            r#"
            INSERT INTO referral_settings (id, default_discount_bps, default_commission_bps, updated_at)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET
                default_discount_bps = excluded.default_discount_bps,
                default_commission_bps = excluded.default_commission_bps,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(settings.default_discount_percentage.bps() as i64)
        .bind(settings.default_commission_percentage.bps() as i64)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads the settings on an existing connection (inside a transaction).
    ///
    /// Read-only unless the row is missing.
    pub async fn load(
        conn: &mut SqliteConnection,
        defaults: SettingsDefaults,
    ) -> DbResult<ReferralCodeSettings> {
        if let Some(row) = Self::fetch(conn).await? {
            return row.try_into();
        }

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO referral_settings
                (id, default_discount_bps, default_commission_bps, updated_at)
            VALUES (1, ?1, ?2, ?3)
            "#,
        )
        .bind(defaults.discount.bps() as i64)
        .bind(defaults.commission.bps() as i64)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted > 0 {
            debug!(
                discount = %defaults.discount,
                commission = %defaults.commission,
                "Initialized referral settings from defaults"
            );
        }

        match Self::fetch(conn).await? {
            Some(row) => row.try_into(),
            None => Err(DbError::Internal(
                "referral_settings row missing after initialization".to_string(),
            )),
        }
    }

    async fn fetch(conn: &mut SqliteConnection) -> DbResult<Option<SettingsRecord>> {
        let row = sqlx::query_as::<_, SettingsRecord>(
            r#"
            SELECT default_discount_bps, default_commission_bps, updated_at
            FROM referral_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }
}
