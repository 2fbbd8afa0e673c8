//! Validation errors for core primitives

use thiserror::Error;

/// Errors raised when constructing validated core types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Secret identifier was empty
    #[error("Secret id cannot be empty")]
    EmptySecretId,

    /// Secret identifier failed validation rules
    #[error("Invalid secret id '{id}': {reason}")]
    InvalidSecretId { id: String, reason: String },
}
