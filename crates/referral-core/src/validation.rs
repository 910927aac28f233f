//! # Validation Module
//!
//! Input validation for codes, amounts and marketer applications.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (serde)                                        │
//! │  ├── Type validation (deserialization, Percentage parsing)             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Code charset and length                                           │
//! │  ├── Non-negative amounts                                              │
//! │  └── Applicant profile fields                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE(code), UNIQUE(purchase_id) on commissions                  │
//! │  └── CHECK(current_uses <= max_uses)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::MarketerProfile;
use crate::MAX_CODE_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 100;
const MAX_PHONE_LEN: usize = 15;
const MAX_EMAIL_LEN: usize = 254;
const MAX_TEXT_LEN: usize = 2000;
const MAX_HANDLE_LEN: usize = 100;
const MAX_ID_LEN: usize = 64;

// =============================================================================
// Referral Codes
// =============================================================================

/// Validates a referral code string.
///
/// ## Rules
/// - 1 to 20 characters
/// - ASCII letters and digits only
/// - Case is preserved; `abc` and `ABC` are different codes
///
/// ## Example
/// ```rust
/// use referral_core::validation::validate_code;
///
/// assert!(validate_code("SPRING24").is_ok());
/// assert!(validate_code("spring24").is_ok());
/// assert!(validate_code("").is_err());
/// assert!(validate_code("HAS-DASH").is_err());
/// assert!(validate_code(&"A".repeat(21)).is_err());
/// ```
pub fn validate_code(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "only letters A-Z, a-z and digits 0-9 are allowed".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional usage limit. Limits start at one.
pub fn validate_max_uses(max_uses: Option<u32>) -> ValidationResult<()> {
    match max_uses {
        Some(0) => Err(ValidationError::OutOfRange {
            field: "max_uses".to_string(),
            min: 1,
            max: u32::MAX as i64,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Amounts & Identifiers
// =============================================================================

/// Validates that an amount is not negative.
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an opaque identifier (user id, target id, reviewer id).
pub fn validate_identifier(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }
    Ok(())
}

/// Validates free-form text such as admin notes or a cancel reason.
pub fn validate_notes(field: &str, text: &str) -> ValidationResult<()> {
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Marketer Profile
// =============================================================================

fn required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

fn optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates a phone number: optional leading `+`, then 7 to 15 digits.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    required_text("phone_number", phone, MAX_PHONE_LEN + 1)?;

    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.len() < 7 || digits.len() > MAX_PHONE_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone_number".to_string(),
            reason: "expected 7-15 digits, optionally prefixed with +".to_string(),
        });
    }
    Ok(())
}

/// Validates an email address (shape only; delivery is not checked).
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    required_text("email", email, MAX_EMAIL_LEN)?;

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "expected name@domain.tld".to_string(),
        });
    }
    Ok(())
}

/// Validates a full applicant profile.
pub fn validate_profile(profile: &MarketerProfile) -> ValidationResult<()> {
    required_text("full_name", &profile.full_name, MAX_NAME_LEN)?;
    validate_phone(&profile.phone_number)?;
    validate_email(&profile.email)?;
    required_text("motivation", &profile.motivation, MAX_TEXT_LEN)?;
    optional_text("current_job", profile.current_job.as_deref(), MAX_NAME_LEN)?;
    optional_text(
        "marketing_experience",
        profile.marketing_experience.as_deref(),
        MAX_TEXT_LEN,
    )?;
    optional_text("instagram_handle", profile.instagram_handle.as_deref(), MAX_HANDLE_LEN)?;
    optional_text("telegram_handle", profile.telegram_handle.as_deref(), MAX_HANDLE_LEN)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExperienceLevel, InterestArea};

    fn profile() -> MarketerProfile {
        MarketerProfile {
            full_name: "Sara Ahmadi".to_string(),
            phone_number: "+989121234567".to_string(),
            email: "sara@example.com".to_string(),
            experience_level: ExperienceLevel::Intermediate,
            current_job: Some("Nurse".to_string()),
            interest_area: InterestArea::Medical,
            motivation: "I run a study group for nursing students.".to_string(),
            marketing_experience: None,
            instagram_handle: Some("@sara.studies".to_string()),
            telegram_handle: None,
        }
    }

    #[test]
    fn test_code_rules() {
        assert!(validate_code("A").is_ok());
        assert!(validate_code(&"Z9".repeat(10)).is_ok());
        assert!(validate_code(" SPRING").is_err());
        assert!(validate_code("نوروز").is_err());
        assert!(matches!(
            validate_code(&"A".repeat(21)),
            Err(ValidationError::TooLong { max: 20, .. })
        ));
    }

    #[test]
    fn test_max_uses() {
        assert!(validate_max_uses(None).is_ok());
        assert!(validate_max_uses(Some(1)).is_ok());
        assert!(validate_max_uses(Some(0)).is_err());
    }

    #[test]
    fn test_amount() {
        assert!(validate_amount("base_amount", Money::zero()).is_ok());
        assert!(validate_amount("base_amount", Money::from_toman(-1)).is_err());
    }

    #[test]
    fn test_identifier() {
        assert!(validate_identifier("user_id", "u-1").is_ok());
        assert!(validate_identifier("user_id", "   ").is_err());
        assert!(validate_identifier("user_id", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_profile_ok() {
        assert!(validate_profile(&profile()).is_ok());
    }

    #[test]
    fn test_profile_rejects_bad_fields() {
        let mut p = profile();
        p.email = "not-an-email".to_string();
        assert!(matches!(
            validate_profile(&p),
            Err(ValidationError::InvalidFormat { ref field, .. }) if field == "email"
        ));

        let mut p = profile();
        p.phone_number = "12ab".to_string();
        assert!(validate_profile(&p).is_err());

        let mut p = profile();
        p.full_name = "  ".to_string();
        assert!(matches!(
            validate_profile(&p),
            Err(ValidationError::Required { ref field }) if field == "full_name"
        ));

        let mut p = profile();
        p.telegram_handle = Some("t".repeat(101));
        assert!(validate_profile(&p).is_err());
    }

    #[test]
    fn test_email_shapes() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("@b.co").is_err());
        assert!(validate_email("a@@b.co").is_err());
        assert!(validate_email("a b@c.co").is_err());
    }
}
