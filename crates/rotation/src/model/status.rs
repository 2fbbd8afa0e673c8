//! Execution status state machine
//!
//! Encodes the rotation lifecycle and its legal transitions:
//!
//! ```text
//! Pending → Generating → Validating → Deploying → Verifying
//!                                                    │
//!                                 ┌──────────────────┴─────────────┐
//!                                 ▼                                ▼
//!                            DualAccept ────────────────────► Completed
//!
//! Failed     reachable from any non-terminal state
//! RolledBack reachable from DualAccept, Completed, or Failed
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RotationError, RotationResult};

/// Lifecycle state of a rotation execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Execution created, nothing started yet
    Pending,

    /// Pre-rotation check passed, new value being generated
    Generating,

    /// Generated value being checked against length/entropy policy
    Validating,

    /// New value being written to the storage location
    Deploying,

    /// Dependent services being updated and health-checked
    Verifying,

    /// Both old and new values valid for the grace window
    DualAccept,

    /// Rotation finished; old value may be retired by the storage layer
    Completed,

    /// A step failed; later steps were skipped
    Failed,

    /// Old value was restored by explicit operator action
    RolledBack,
}

impl ExecutionStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::RolledBack)
    }

    /// Check whether a transition to `next` is legal
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            // Linear happy path.
            (Self::Pending, Self::Generating)
            | (Self::Generating, Self::Validating)
            | (Self::Validating, Self::Deploying)
            | (Self::Deploying, Self::Verifying)
            | (Self::Verifying, Self::DualAccept | Self::Completed)
            | (Self::DualAccept, Self::Completed) => true,

            // Failure from any non-terminal state.
            (from, Self::Failed) => !from.is_terminal(),

            // Rollback only after a value may have been deployed (the
            // Failed-with-deploy precondition is checked by the executor,
            // which knows the step history).
            (Self::DualAccept | Self::Completed | Self::Failed, Self::RolledBack) => true,

            _ => false,
        }
    }

    /// Validate and perform a transition
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::InvalidStateTransition`] when the move is
    /// not in the transition table.
    pub fn transition_to(self, next: Self) -> RotationResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(RotationError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    /// Stable snake_case name, matching the serialized form
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Validating => "validating",
            Self::Deploying => "deploying",
            Self::Verifying => "verifying",
            Self::DualAccept => "dual_accept",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
