//! Error kinds surfaced to the caller.
//!
//! All of them are recoverable: validation blocks a single submission, auth
//! failure degrades the session, persistence failure only loses the save.

use std::fmt;

/// A submission could not be turned into a `ClinicalRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required numeric fields were absent (field names, in form order).
    MissingFields(Vec<&'static str>),
    /// Age must be a positive integer.
    InvalidAge(i64),
    /// A numeric field was NaN or infinite.
    NotFinite(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingFields(fields) => {
                write!(f, "Please fill in all fields (missing: {})", fields.join(", "))
            }
            ValidationError::InvalidAge(age) => write!(f, "Age must be positive, got {}", age),
            ValidationError::NotFinite(field) => write!(f, "Field '{}' is not a number", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Identity bootstrap failed. Non-fatal: the session continues degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The provider refuses anonymous sign-in.
    AnonymousDisabled,
    /// The provider failed for another reason.
    Provider(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::AnonymousDisabled => write!(f, "anonymous sign-in is disabled"),
            AuthError::Provider(msg) => write!(f, "auth provider error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// The single store write for a result failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceError(pub String);

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PersistenceError {}

impl From<anyhow::Error> for PersistenceError {
    fn from(e: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line.
        PersistenceError(format!("{:#}", e))
    }
}

/// Why `Orchestrator::submit` refused to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Validation(ValidationError),
    /// A previous submission is still in flight.
    Busy,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Validation(e) => write!(f, "{}", e),
            SubmitError::Busy => write!(f, "A prediction is already in progress"),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Validation(e) => Some(e),
            SubmitError::Busy => None,
        }
    }
}

impl From<ValidationError> for SubmitError {
    fn from(e: ValidationError) -> Self {
        SubmitError::Validation(e)
    }
}
