//! # Engine Configuration
//!
//! Tunables for the engine. Built by the API from environment variables;
//! tests use [`EngineConfig::default`] and override single fields.

use std::time::Duration;

use referral_core::DEFAULT_CODE_GENERATION_ATTEMPTS;
use referral_db::SettingsDefaults;

/// Default number of attempts for a finalization that hits a busy database.
pub const DEFAULT_FINALIZE_RETRY_ATTEMPTS: u32 = 3;

/// Engine configuration.
///
/// ## Example
/// ```rust
/// use referral_engine::EngineConfig;
///
/// let config = EngineConfig::default().code_generation_attempts(8);
/// assert_eq!(config.code_generation_attempts, 8);
/// assert_eq!(config.finalize_retry_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many random candidates code creation tries before giving up.
    /// Default: 5
    pub code_generation_attempts: u32,

    /// How many times a transaction is attempted when storage is busy.
    /// Default: 3
    pub finalize_retry_attempts: u32,

    /// Base delay between retries; attempt `n` waits `n * retry_backoff`.
    /// Default: 25 ms
    pub retry_backoff: Duration,

    /// Rates written the first time settings are loaded.
    /// Default: 10.00% discount, 10.00% commission
    pub seed_settings: SettingsDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            code_generation_attempts: DEFAULT_CODE_GENERATION_ATTEMPTS,
            finalize_retry_attempts: DEFAULT_FINALIZE_RETRY_ATTEMPTS,
            retry_backoff: Duration::from_millis(25),
            seed_settings: SettingsDefaults::default(),
        }
    }
}

impl EngineConfig {
    /// Sets the code generation attempt budget (at least one).
    pub fn code_generation_attempts(mut self, attempts: u32) -> Self {
        self.code_generation_attempts = attempts.max(1);
        self
    }

    /// Sets the busy-retry attempt budget (at least one).
    pub fn finalize_retry_attempts(mut self, attempts: u32) -> Self {
        self.finalize_retry_attempts = attempts.max(1);
        self
    }

    /// Sets the base retry delay.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the rates used to create the settings row.
    pub fn seed_settings(mut self, defaults: SettingsDefaults) -> Self {
        self.seed_settings = defaults;
        self
    }
}
