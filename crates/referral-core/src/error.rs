//! # Error Types
//!
//! Domain-specific error types for referral-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  referral-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  referral-db errors (separate crate)                                   │
//! │  └── DbError          - Storage failures only                          │
//! │                                                                         │
//! │  referral-engine errors                                                │
//! │  └── EngineError      - CoreError | DbError                            │
//! │                                                                         │
//! │  referral-api errors (in app)                                          │
//! │  └── ApiError         - What HTTP clients see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → ApiError → Client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries the identifier that caused it so logs and client
//! messages can name the offending code, purchase or commission.

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a [`CoreError`].
///
/// Outer layers map kinds onto transport status codes without matching every
/// variant individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; the caller must change the request.
    Validation,
    /// The referenced entity does not exist.
    NotFound,
    /// Uniqueness or ownership clash with existing data.
    Conflict,
    /// The entity exists but its current state forbids the operation.
    State,
    /// A bounded resource ran out (usage limit, code generation attempts).
    Exhausted,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No referral code matches the given code string or id.
    #[error("Referral code not found: {0}")]
    CodeNotFound(String),

    /// Purchase cannot be found.
    #[error("Purchase not found: {0}")]
    PurchaseNotFound(String),

    /// Commission cannot be found.
    #[error("Commission not found: {0}")]
    CommissionNotFound(String),

    /// Marketer registration request cannot be found.
    #[error("Marketer request not found: {0}")]
    MarketerRequestNotFound(String),

    /// Code string already taken (codes are unique, case-sensitive).
    #[error("Referral code '{0}' already exists")]
    DuplicateCode(String),

    /// The user already has a pending or approved marketer request.
    #[error("User {user_id} already has an active marketer request")]
    DuplicateApplication { user_id: String },

    /// A code that has been used cannot be deleted.
    ///
    /// ## User Workflow
    /// ```text
    /// Admin clicks "Delete" on code SUMMER24
    ///      │
    ///      ▼
    /// current_uses = 3  ──►  CodeInUse { code: "SUMMER24", uses: 3 }
    ///      │
    ///      ▼
    /// UI suggests deactivating the code instead
    /// ```
    #[error("Referral code '{code}' has been used {uses} time(s) and cannot be deleted")]
    CodeInUse { code: String, uses: u32 },

    /// Open purchases are priced under this code; deleting it would leave
    /// their discount without a code to claim.
    #[error("Referral code '{code}' is attached to {purchases} open purchase(s) and cannot be deleted")]
    CodeAttached { code: String, purchases: u32 },

    /// A used code keeps its code string so commissions stay traceable.
    #[error("Referral code '{code}' has been used and cannot be renamed")]
    CodeLocked { code: String },

    /// Status change not allowed by the entity's transition table.
    #[error("{entity} {id} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    /// Code has reached `max_uses`.
    #[error("Referral code '{code}' reached its usage limit of {max_uses}")]
    UsageLimitReached { code: String, max_uses: u32 },

    /// Code is deactivated.
    #[error("Referral code '{0}' is inactive")]
    CodeInactive(String),

    /// Purchase has already left the pending state with a non-success outcome.
    #[error("Purchase {purchase_id} is already {status}")]
    PurchaseAlreadyFinalized { purchase_id: String, status: String },

    /// Purchase carries a different referral code than the one supplied.
    #[error("Purchase {purchase_id} is already attached to a different referral code")]
    ReferralCodeMismatch { purchase_id: String },

    /// Random code generation kept colliding with existing codes.
    #[error("Could not generate a unique referral code after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },

    /// Only approved marketers may own referral codes.
    #[error("User {0} is not an approved marketer")]
    NotAMarketer(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::CodeNotFound(_)
            | CoreError::PurchaseNotFound(_)
            | CoreError::CommissionNotFound(_)
            | CoreError::MarketerRequestNotFound(_) => ErrorKind::NotFound,

            CoreError::DuplicateCode(_)
            | CoreError::DuplicateApplication { .. }
            | CoreError::ReferralCodeMismatch { .. } => ErrorKind::Conflict,

            CoreError::CodeInUse { .. }
            | CoreError::CodeAttached { .. }
            | CoreError::CodeLocked { .. }
            | CoreError::InvalidTransition { .. }
            | CoreError::CodeInactive(_)
            | CoreError::PurchaseAlreadyFinalized { .. }
            | CoreError::NotAMarketer(_) => ErrorKind::State,

            CoreError::UsageLimitReached { .. } | CoreError::CodeGenerationExhausted { .. } => {
                ErrorKind::Exhausted
            }

            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID, non-alphanumeric code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = CoreError::UsageLimitReached {
            code: "SPRING".to_string(),
            max_uses: 3,
        };
        assert_eq!(err.to_string(), "Referral code 'SPRING' reached its usage limit of 3");

        let err = CoreError::InvalidTransition {
            entity: "commission",
            id: "c-1".to_string(),
            from: "paid".to_string(),
            to: "cancelled".to_string(),
        };
        assert_eq!(err.to_string(), "commission c-1 cannot move from paid to cancelled");
    }

    #[test]
    fn test_validation_converts_into_core_error() {
        let core: CoreError = ValidationError::Required {
            field: "code".to_string(),
        }
        .into();
        assert_eq!(core.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(CoreError::CodeNotFound("X".into()).kind(), ErrorKind::NotFound);
        assert_eq!(CoreError::DuplicateCode("X".into()).kind(), ErrorKind::Conflict);
        assert_eq!(CoreError::CodeInactive("X".into()).kind(), ErrorKind::State);
        assert_eq!(
            CoreError::CodeGenerationExhausted { attempts: 5 }.kind(),
            ErrorKind::Exhausted
        );
    }
}
