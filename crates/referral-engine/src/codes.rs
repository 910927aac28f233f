//! # Referral Code Operations
//!
//! Preview, lookup, creation, update and deletion of codes, by an admin or
//! by the owning marketer. The only
//! write to `current_uses` is the claim inside finalization (`checkout.rs`).
//!
//! ## Creation
//! ```text
//! create_referral_code(marketer, input)
//!      │
//!      ├── validate input, owner must be a marketer
//!      ├── snapshot omitted rates from settings
//!      │
//!      ├── explicit code ──► INSERT ──► unique clash = DuplicateCode
//!      │
//!      └── generated     ──► INSERT ──► unique clash = next candidate
//!                                         (after N: CodeGenerationExhausted)
//! ```

use chrono::Utc;
use tracing::{debug, info};

use referral_core::calculator::quote;
use referral_core::validation::{validate_amount, validate_code, validate_identifier, validate_max_uses};
use referral_core::{
    new_id, CodeFilter, CoreError, DiscountPreview, Money, NewReferralCode, ReferralCode,
    ReferralCodePatch,
};
use referral_db::DbError;

use crate::{EngineError, EngineResult, ReferralEngine};

/// The column a duplicate code string collides on.
const CODE_COLUMN: &str = "referral_codes.code";

/// Optimistic update attempts before reporting the code as busy.
const CODE_UPDATE_ATTEMPTS: u32 = 3;

impl ReferralEngine {
    // =========================================================================
    // Lookup & Preview
    // =========================================================================

    /// Gets a code by id.
    pub async fn get_code(&self, code_id: &str) -> EngineResult<ReferralCode> {
        self.db
            .codes()
            .get_by_id(code_id)
            .await?
            .ok_or_else(|| CoreError::CodeNotFound(code_id.to_string()).into())
    }

    /// Gets a code by its exact, case-sensitive code string.
    pub async fn get_code_by_value(&self, code: &str) -> EngineResult<ReferralCode> {
        validate_code(code)?;
        self.db
            .codes()
            .get_by_code(code)
            .await?
            .ok_or_else(|| CoreError::CodeNotFound(code.to_string()).into())
    }

    /// Prices `base_amount` under `code` without consuming a use.
    ///
    /// ## Errors
    /// `CodeNotFound`, `CodeInactive` or `UsageLimitReached`, which checkout
    /// shows inline as "code invalid/expired".
    pub async fn preview_discount(&self, code: &str, base_amount: Money) -> EngineResult<DiscountPreview> {
        validate_amount("base_amount", base_amount)?;
        let code = self.get_code_by_value(code).await?;
        code.ensure_available()?;

        let settings = self.get_settings().await?;
        let q = quote(base_amount, &code, &settings);

        debug!(
            code = %code.code,
            base = base_amount.toman(),
            discount = q.discount_amount.toman(),
            "Previewed referral discount"
        );

        Ok(DiscountPreview {
            remaining_uses: code.remaining_uses(),
            code: code.code,
            discount_percentage: q.discount_percentage,
            base_amount,
            discount_amount: q.discount_amount,
            final_amount: q.final_amount,
        })
    }

    /// Admin listing, newest first.
    pub async fn list_codes(&self, filter: &CodeFilter) -> EngineResult<Vec<ReferralCode>> {
        Ok(self.db.codes().list(filter).await?)
    }

    /// A marketer's own codes, newest first.
    pub async fn list_marketer_codes(&self, marketer_id: &str) -> EngineResult<Vec<ReferralCode>> {
        validate_identifier("marketer_id", marketer_id)?;
        let filter = CodeFilter {
            marketer_id: Some(marketer_id.to_string()),
            is_active: None,
        };
        self.list_codes(&filter).await
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a code owned by `marketer_id`.
    ///
    /// Rates omitted from `input` are copied from the current settings, so
    /// later default changes do not touch this code.
    pub async fn create_referral_code(
        &self,
        marketer_id: &str,
        input: NewReferralCode,
    ) -> EngineResult<ReferralCode> {
        validate_identifier("marketer_id", marketer_id)?;
        validate_max_uses(input.max_uses)?;
        if let Some(code) = &input.code {
            validate_code(code)?;
        }

        if !self.directory.is_marketer(marketer_id).await? {
            return Err(CoreError::NotAMarketer(marketer_id.to_string()).into());
        }

        let settings = self.get_settings().await?;
        let now = Utc::now();
        let mut code = ReferralCode {
            id: new_id(),
            code: String::new(),
            marketer_id: marketer_id.to_string(),
            discount_percentage: Some(
                input
                    .discount_percentage
                    .unwrap_or(settings.default_discount_percentage),
            ),
            commission_percentage: Some(
                input
                    .commission_percentage
                    .unwrap_or(settings.default_commission_percentage),
            ),
            max_uses: input.max_uses,
            current_uses: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        match input.code {
            Some(requested) => {
                code.code = requested;
                if let Err(e) = self.db.codes().insert(&code).await {
                    return Err(if e.is_unique_on(CODE_COLUMN) {
                        CoreError::DuplicateCode(code.code).into()
                    } else {
                        e.into()
                    });
                }
            }
            None => self.insert_generated(&mut code).await?,
        }

        info!(
            code_id = %code.id,
            code = %code.code,
            marketer_id = %marketer_id,
            "Referral code created"
        );
        Ok(code)
    }

    /// Inserts `code` under fresh generated strings until one is free.
    async fn insert_generated(&self, code: &mut ReferralCode) -> EngineResult<()> {
        let attempts = self.config.code_generation_attempts.max(1);
        for attempt in 1..=attempts {
            code.code = self.codes.next_code();
            match self.db.codes().insert(code).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unique_on(CODE_COLUMN) => {
                    debug!(attempt, candidate = %code.code, "Generated code collided");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CoreError::CodeGenerationExhausted { attempts }.into())
    }

    // =========================================================================
    // Update & Delete
    // =========================================================================

    /// Applies an admin patch to a code.
    ///
    /// The write is conditional on `current_uses` being unchanged since the
    /// read, so the rename lock and the `max_uses >= current_uses` check
    /// always hold against the stored row.
    pub async fn update_referral_code(
        &self,
        code_id: &str,
        patch: ReferralCodePatch,
    ) -> EngineResult<ReferralCode> {
        for attempt in 1..=CODE_UPDATE_ATTEMPTS {
            let current = self.get_code(code_id).await?;
            let mut updated = current.clone();
            updated.apply_patch(&patch, Utc::now())?;

            match self.db.codes().update_if_uses(&updated, current.current_uses).await {
                Ok(true) => {
                    info!(code_id = %code_id, code = %updated.code, "Referral code updated");
                    return Ok(updated);
                }
                Ok(false) => {
                    debug!(code_id = %code_id, attempt, "Code changed under update, re-reading");
                }
                Err(e) if e.is_unique_on(CODE_COLUMN) => {
                    return Err(CoreError::DuplicateCode(updated.code).into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(DbError::Busy(format!("referral code {code_id} kept changing during update")).into())
    }

    /// Deletes a code that has never been used.
    ///
    /// ## Errors
    /// - `CodeInUse` once the code has uses
    /// - `CodeAttached` while a pending purchase is priced under it; the
    ///   purchase must be re-priced or fail first
    pub async fn delete_referral_code(&self, code_id: &str) -> EngineResult<()> {
        let code = self.get_code(code_id).await?;
        if code.current_uses > 0 {
            return Err(CoreError::CodeInUse {
                code: code.code,
                uses: code.current_uses,
            }
            .into());
        }

        if !self.db.codes().delete_unused(code_id).await? {
            return Err(self.delete_refusal(code_id).await);
        }

        info!(code_id = %code_id, code = %code.code, "Referral code deleted");
        Ok(())
    }

    /// Explains why the conditional delete matched no row.
    async fn delete_refusal(&self, code_id: &str) -> EngineError {
        let code = match self.get_code(code_id).await {
            Ok(code) => code,
            Err(e) => return e,
        };
        if code.current_uses > 0 {
            return CoreError::CodeInUse {
                code: code.code,
                uses: code.current_uses,
            }
            .into();
        }
        match self.db.purchases().count_pending_for_code(code_id).await {
            Ok(purchases) => CoreError::CodeAttached {
                code: code.code,
                purchases,
            }
            .into(),
            Err(e) => e.into(),
        }
    }

    // =========================================================================
    // Marketer-Scoped Edits
    // =========================================================================

    /// Updates a code on behalf of its owner.
    ///
    /// Codes owned by someone else are reported as `CodeNotFound`.
    pub async fn update_marketer_code(
        &self,
        marketer_id: &str,
        code_id: &str,
        patch: ReferralCodePatch,
    ) -> EngineResult<ReferralCode> {
        self.owned_code(marketer_id, code_id).await?;
        self.update_referral_code(code_id, patch).await
    }

    /// Deletes a code on behalf of its owner.
    pub async fn delete_marketer_code(&self, marketer_id: &str, code_id: &str) -> EngineResult<()> {
        self.owned_code(marketer_id, code_id).await?;
        self.delete_referral_code(code_id).await
    }

    async fn owned_code(&self, marketer_id: &str, code_id: &str) -> EngineResult<ReferralCode> {
        validate_identifier("marketer_id", marketer_id)?;
        let code = self.get_code(code_id).await?;
        if code.marketer_id != marketer_id {
            debug!(code_id = %code_id, marketer_id = %marketer_id, "Code owned by another marketer");
            return Err(CoreError::CodeNotFound(code_id.to_string()).into());
        }
        Ok(code)
    }
}
