//! # API Error Responses
//!
//! Every failure leaves the server as
//!
//! ```text
//! HTTP 4xx/5xx
//! { "code": "USAGE_LIMIT_REACHED", "message": "Referral code 'SAVE10' reached ..." }
//! ```
//!
//! `code` is stable and meant for clients (checkout shows "code invalid or
//! expired" on `CODE_NOT_FOUND`, `CODE_INACTIVE` and `USAGE_LIMIT_REACHED`);
//! `message` is for humans and logs.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use referral_core::CoreError;
use referral_db::DbError;
use referral_engine::{DirectoryError, EngineError};

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    ValidationFailed,
    CodeNotFound,
    PurchaseNotFound,
    CommissionNotFound,
    MarketerRequestNotFound,
    DuplicateCode,
    DuplicateApplication,
    ReferralCodeMismatch,
    CodeInUse,
    CodeLocked,
    InvalidTransition,
    CodeInactive,
    PurchaseAlreadyFinalized,
    NotAMarketer,
    UsageLimitReached,
    CodeGenerationExhausted,
    StorageUnavailable,
    DirectoryUnavailable,
    Internal,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest | ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,

            ErrorCode::CodeNotFound
            | ErrorCode::PurchaseNotFound
            | ErrorCode::CommissionNotFound
            | ErrorCode::MarketerRequestNotFound => StatusCode::NOT_FOUND,

            ErrorCode::DuplicateCode
            | ErrorCode::DuplicateApplication
            | ErrorCode::ReferralCodeMismatch
            | ErrorCode::CodeInUse
            | ErrorCode::CodeLocked
            | ErrorCode::InvalidTransition
            | ErrorCode::PurchaseAlreadyFinalized => StatusCode::CONFLICT,

            ErrorCode::CodeInactive | ErrorCode::NotAMarketer | ErrorCode::UsageLimitReached => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            ErrorCode::CodeGenerationExhausted
            | ErrorCode::StorageUnavailable
            | ErrorCode::DirectoryUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::CodeNotFound(_) => ErrorCode::CodeNotFound,
            CoreError::PurchaseNotFound(_) => ErrorCode::PurchaseNotFound,
            CoreError::CommissionNotFound(_) => ErrorCode::CommissionNotFound,
            CoreError::MarketerRequestNotFound(_) => ErrorCode::MarketerRequestNotFound,
            CoreError::DuplicateCode(_) => ErrorCode::DuplicateCode,
            CoreError::DuplicateApplication { .. } => ErrorCode::DuplicateApplication,
            CoreError::ReferralCodeMismatch { .. } => ErrorCode::ReferralCodeMismatch,
            CoreError::CodeInUse { .. } | CoreError::CodeAttached { .. } => ErrorCode::CodeInUse,
            CoreError::CodeLocked { .. } => ErrorCode::CodeLocked,
            CoreError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            CoreError::UsageLimitReached { .. } => ErrorCode::UsageLimitReached,
            CoreError::CodeInactive(_) => ErrorCode::CodeInactive,
            CoreError::PurchaseAlreadyFinalized { .. } => ErrorCode::PurchaseAlreadyFinalized,
            CoreError::CodeGenerationExhausted { .. } => ErrorCode::CodeGenerationExhausted,
            CoreError::NotAMarketer(_) => ErrorCode::NotAMarketer,
            CoreError::Validation(_) => ErrorCode::ValidationFailed,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            return ApiError::new(ErrorCode::StorageUnavailable, "Database is busy, try again");
        }
        error!(error = %err, "Storage failure");
        ApiError::new(ErrorCode::Internal, "Internal storage error")
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(err) => err.into(),
            EngineError::Storage(err) => err.into(),
            EngineError::Directory(DirectoryError::Storage(err)) => err.into(),
            EngineError::Directory(err @ DirectoryError::Unavailable(_)) => {
                ApiError::new(ErrorCode::DirectoryUnavailable, err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(ErrorCode::InvalidRequest, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(ErrorCode::InvalidRequest, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use referral_core::ValidationError;

    #[test]
    fn test_business_errors_map_to_client_statuses() {
        let cases = [
            (CoreError::CodeNotFound("X".into()), StatusCode::NOT_FOUND),
            (CoreError::DuplicateCode("X".into()), StatusCode::CONFLICT),
            (
                CoreError::UsageLimitReached {
                    code: "X".into(),
                    max_uses: 1,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CoreError::Validation(ValidationError::Required {
                    field: "code".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).code.status(), status);
        }
    }

    #[test]
    fn test_infrastructure_errors_hide_details() {
        let busy = ApiError::from(EngineError::Storage(DbError::Busy("locked".into())));
        assert_eq!(busy.code, ErrorCode::StorageUnavailable);

        let internal = ApiError::from(EngineError::Storage(DbError::QueryFailed("syntax".into())));
        assert_eq!(internal.code, ErrorCode::Internal);
        assert!(!internal.message.contains("syntax"));
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::UsageLimitReached).unwrap();
        assert_eq!(json, "\"USAGE_LIMIT_REACHED\"");
    }
}
