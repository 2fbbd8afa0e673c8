//! Rotation-specific error types
//!
//! Defines every error that can occur while rotating a secret. Step-level
//! failures during an execution are captured on the step record rather than
//! propagated; only precondition violations reach callers as errors.

use keywheel_core::{ExecutionId, SecretId};
use thiserror::Error;

/// Errors that can occur during secret rotation
#[derive(Debug, Error)]
pub enum RotationError {
    /// Requested secret id has no active configuration
    #[error("No active configuration for secret {secret_id}")]
    ConfigurationNotFound { secret_id: SecretId },

    /// The per-configuration lock is held; caller should retry later
    #[error("Rotation already in progress for secret {secret_id}")]
    RotationInProgress { secret_id: SecretId },

    /// Secure-random source or entropy policy failure; fatal for this attempt
    #[error("Secret generation failed: {reason}")]
    Generation { reason: String },

    /// Storage write failed; nothing downstream changed yet
    #[error("Deployment to {path} failed: {reason}")]
    Deployment { path: String, reason: String },

    /// A dependent service failed its post-deploy health check
    #[error("Dependent service '{service}' unhealthy: {reason}")]
    DependencyUnhealthy { service: String, reason: String },

    /// Restoring the old value failed - the most serious condition
    #[error("Rollback failed for execution {execution_id}: {reason}")]
    Rollback {
        execution_id: ExecutionId,
        reason: String,
    },

    /// State transition is not allowed
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Execution record not found
    #[error("Execution not found: {execution_id}")]
    ExecutionNotFound { execution_id: ExecutionId },

    /// Emergency request record not found
    #[error("Emergency request not found: {request_id}")]
    RequestNotFound { request_id: keywheel_core::RequestId },

    /// Policy or configuration validation failed
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Emergency gate refused the request
    #[error("Emergency request rejected: {reason}")]
    RequestRejected { reason: String },

    /// Backing store failure
    #[error("Store error: {reason}")]
    Store { reason: String },
}

/// Result type for rotation operations
pub type RotationResult<T> = Result<T, RotationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_subject() {
        let id = SecretId::new("db-password").unwrap();
        let err = RotationError::RotationInProgress { secret_id: id };
        assert_eq!(
            err.to_string(),
            "Rotation already in progress for secret db-password"
        );
    }
}
