//! Default-rate settings: load and admin update.

use chrono::Utc;
use tracing::info;

use referral_core::{ReferralCodeSettings, SettingsPatch};

use crate::{EngineResult, ReferralEngine};

impl ReferralEngine {
    /// Current default rates, created from the configured seed on first use.
    pub async fn get_settings(&self) -> EngineResult<ReferralCodeSettings> {
        Ok(self
            .db
            .settings()
            .load_or_init(self.config.seed_settings)
            .await?)
    }

    /// Applies an admin patch to the default rates.
    ///
    /// Rates are range-checked when the patch is parsed. Existing codes keep
    /// their snapshotted rates; only codes with cleared rates follow the new
    /// defaults.
    pub async fn update_settings(&self, patch: SettingsPatch) -> EngineResult<ReferralCodeSettings> {
        let mut settings = self.get_settings().await?;
        if settings.apply_patch(&patch, Utc::now()) {
            self.db.settings().save(&settings).await?;
            info!(
                discount = %settings.default_discount_percentage,
                commission = %settings.default_commission_percentage,
                "Referral defaults updated"
            );
        }
        Ok(settings)
    }
}
