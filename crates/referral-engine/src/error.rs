//! # Engine Error Types
//!
//! Every engine operation returns [`EngineResult`]. Business-rule
//! violations arrive as [`CoreError`]; storage and directory failures keep
//! their own variants so callers can tell "your request is wrong" apart
//! from "try again later".
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        EngineError                                      │
//! │                                                                         │
//! │  ┌───────────────────┐  ┌───────────────────┐  ┌─────────────────────┐ │
//! │  │  Core             │  │  Storage          │  │  Directory          │ │
//! │  │                   │  │                   │  │                     │ │
//! │  │  Validation       │  │  Busy       (retry)│  │  Storage            │ │
//! │  │  NotFound         │  │  PoolExhausted    │  │  Unavailable        │ │
//! │  │  Conflict / State │  │  QueryFailed ...  │  │                     │ │
//! │  │  Exhausted        │  │                   │  │                     │ │
//! │  └───────────────────┘  └───────────────────┘  └─────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use referral_core::{ClaimError, CoreError, ErrorKind, ValidationError};
use referral_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure of the external user/role service.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The SQLite-backed directory hit a storage error.
    #[error(transparent)]
    Storage(#[from] DbError),

    /// An external role service could not be reached.
    #[error("Marketer directory unavailable: {0}")]
    Unavailable(String),
}

/// Engine operation errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule refused the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The database failed.
    #[error(transparent)]
    Storage(#[from] DbError),

    /// The marketer directory failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl EngineError {
    /// `true` when repeating the same call may succeed.
    ///
    /// Only lock contention and pool exhaustion qualify; business errors
    /// never change on retry.
    pub fn is_retriable(&self) -> bool {
        match self {
            EngineError::Storage(err) => err.is_transient(),
            EngineError::Directory(DirectoryError::Storage(err)) => err.is_transient(),
            EngineError::Directory(DirectoryError::Unavailable(_)) => true,
            EngineError::Core(_) => false,
        }
    }

    /// Business error kind, or `None` for infrastructure failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            EngineError::Core(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// The wrapped business error, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            EngineError::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl From<ClaimError> for EngineError {
    fn from(err: ClaimError) -> Self {
        EngineError::Core(err.into())
    }
}
