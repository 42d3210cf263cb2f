//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError         - General domain errors                         │
//! │  ├── ValidationError   - One failed field rule                         │
//! │  └── ValidationErrors  - Every issue found in a record or snapshot     │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  └── DbError           - Store / transport failures                    │
//! │                                                                         │
//! │  reception errors (in app)                                             │
//! │  └── MutationError     - What a mutation caller sees                   │
//! │                                                                         │
//! │  Flow: ValidationError → ValidationErrors → toast text / MutationError │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use thiserror::Error;

/// How many issues are spelled out before the rest are summarised.
pub const MAX_LISTED_ISSUES: usize = 3;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A business date could not be parsed.
    #[error("Invalid business date: {0}")]
    InvalidDate(String),

    /// Validation failed (wraps ValidationErrors).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),
}

// =============================================================================
// Validation Error
// =============================================================================

/// A single field-level validation failure.
///
/// `field` is a dotted path; snapshot parsing prefixes it with the record key
/// (`-Nx1.count`).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field must be absent in the record's current state.
    #[error("{field} must not be set {reason}")]
    Unexpected { field: String, reason: String },

    /// Value must be strictly positive.
    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    /// Value must be a finite number.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Invalid format (e.g. a malformed date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The record could not be decoded at all.
    #[error("{field} is malformed: {reason}")]
    Malformed { field: String, reason: String },
}

impl ValidationError {
    /// Returns the field path this error refers to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::Unexpected { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::NotFinite { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::Malformed { field, .. } => field,
        }
    }

    /// Prefixes the field path with `prefix.`.
    pub fn within(self, prefix: &str) -> Self {
        let nest = |field: String| {
            if field.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}.{field}")
            }
        };
        match self {
            ValidationError::Required { field } => ValidationError::Required { field: nest(field) },
            ValidationError::Unexpected { field, reason } => ValidationError::Unexpected {
                field: nest(field),
                reason,
            },
            ValidationError::MustBePositive { field } => {
                ValidationError::MustBePositive { field: nest(field) }
            }
            ValidationError::NotFinite { field } => ValidationError::NotFinite { field: nest(field) },
            ValidationError::InvalidFormat { field, reason } => ValidationError::InvalidFormat {
                field: nest(field),
                reason,
            },
            ValidationError::Malformed { field, reason } => ValidationError::Malformed {
                field: nest(field),
                reason,
            },
        }
    }
}

// =============================================================================
// Validation Errors (collection)
// =============================================================================

/// Every issue found while validating a record or a whole snapshot.
///
/// ## Display
/// ```text
/// 4 issues → "a is required; b must be a finite number; c is required (and 1 more)"
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors {
    issues: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        ValidationErrors::default()
    }

    /// Records one issue.
    pub fn push(&mut self, issue: ValidationError) {
        self.issues.push(issue);
    }

    /// Records every issue from `other`.
    pub fn extend(&mut self, other: impl IntoIterator<Item = ValidationError>) {
        self.issues.extend(other);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[ValidationError] {
        &self.issues
    }

    /// `Ok(())` when no issue was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(issues: Vec<ValidationError>) -> Self {
        ValidationErrors { issues }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(issue: ValidationError) -> Self {
        ValidationErrors {
            issues: vec![issue],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "no issues");
        }
        let listed: Vec<String> = self
            .issues
            .iter()
            .take(MAX_LISTED_ISSUES)
            .map(ToString::to_string)
            .collect();
        write!(f, "{}", listed.join("; "))?;
        let remaining = self.issues.len().saturating_sub(MAX_LISTED_ISSUES);
        if remaining > 0 {
            write!(f, " (and {remaining} more)")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
