//! # Mutation Errors
//!
//! What a ledger write can tell its caller. Transport failures are not in
//! here: they are logged, toasted and reported as `Ok(None)`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outcome of one mutation                              │
//! │                                                                         │
//! │  no user ─────────────► toast + Err(Unauthenticated)    (no write)      │
//! │  invalid record ──────► toast + Err(Invalid)            (no write)      │
//! │  workflow refusal ────► toast + Err(Rejected)           (no write)      │
//! │  transport failure ───► toast + error! + Ok(None)                       │
//! │  written ─────────────► Ok(Some(key))                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The frontend receives [`ErrorPayload`], a machine-readable `code` next to
//! the message already shown in the toast.

use serde::Serialize;
use thiserror::Error;
use till_core::ValidationErrors;

pub const NOT_AUTHORIZED: &str = "Not authorized. Please log in.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    #[error("Not authorized. Please log in.")]
    Unauthenticated,

    #[error("Invalid {label}: {issues}")]
    Invalid {
        label: &'static str,
        issues: ValidationErrors,
    },

    /// The workflow refused the action (till already open, sign-off missing).
    #[error("{0}")]
    Rejected(String),
}

impl MutationError {
    pub fn rejected(message: impl Into<String>) -> Self {
        MutationError::Rejected(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MutationError::Unauthenticated => ErrorCode::Unauthenticated,
            MutationError::Invalid { .. } => ErrorCode::ValidationError,
            MutationError::Rejected(_) => ErrorCode::BusinessLogic,
        }
    }
}

/// Convenience type alias for mutation results.
///
/// `Ok(None)` means the write was attempted and failed in transport.
pub type MutationResult<T> = Result<T, MutationError>;

// =============================================================================
// Frontend Payload
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthenticated,
    ValidationError,
    BusinessLogic,
}

/// Serialized form of a [`MutationError`].
///
/// ```json
/// { "code": "VALIDATION_ERROR", "message": "Invalid cash count: user is required" }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&MutationError> for ErrorPayload {
    fn from(err: &MutationError) -> Self {
        ErrorPayload {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::ValidationError;

    #[test]
    fn test_payload_codes() {
        let invalid = MutationError::Invalid {
            label: "cash count",
            issues: ValidationError::Required {
                field: "user".to_string(),
            }
            .into(),
        };
        let payload = ErrorPayload::from(&invalid);
        assert_eq!(payload.code, ErrorCode::ValidationError);
        assert!(payload.message.starts_with("Invalid cash count: "));

        let json = serde_json::to_value(ErrorPayload::from(&MutationError::Unauthenticated)).unwrap();
        assert_eq!(json["code"], "UNAUTHENTICATED");
        assert_eq!(json["message"], NOT_AUTHORIZED);
    }
}
