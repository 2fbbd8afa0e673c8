//! Rotation execution record
//!
//! One [`SecretRotationExecution`] per rotation attempt, immutable once the
//! status reaches a terminal value. Steps are append-only within one
//! execution; each validation flag is set exactly once by the step that
//! produces it.

use chrono::{DateTime, Utc};
use keywheel_core::{ExecutionId, SecretId};
use serde::{Deserialize, Serialize};

use super::status::ExecutionStatus;
use crate::error::RotationResult;

/// What initiated a rotation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Scheduled,
    Manual,
    Emergency,
    Compliance,
}

/// Descriptive metadata about a secret value - never the raw value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretMetadata {
    /// Age of the value in days at the time of recording
    pub age_days: u32,

    /// Heuristic strength score, 0-100
    pub strength_score: u8,

    /// Entropy of the generation process in bits
    pub entropy_bits: u32,

    /// Generation algorithm / encoding label
    pub algorithm: String,
}

/// Status of one step within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One named, independently recorded unit of the rotation protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationStep {
    /// Step position, 1-based
    pub id: u8,

    /// Step name (e.g. "deploy_secret")
    pub name: String,

    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Populated when `status` is `Failed`
    pub error_message: Option<String>,

    /// True once external state may have changed and a restore is defined
    pub rollback_possible: bool,
}

impl RotationStep {
    fn pending(id: u8, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            error_message: None,
            rollback_possible: false,
        }
    }
}

/// Independent outcome flags, each set exactly once by its producing step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResults {
    pub pre_rotation_check: Option<bool>,
    pub generation_valid: Option<bool>,
    pub deployed: Option<bool>,
    pub post_verified: Option<bool>,
    pub dependent_services_healthy: Option<bool>,
}

/// Populated only when a rollback was invoked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackInfo {
    pub rollback_executed: bool,
    pub rollback_successful: bool,
    pub rollback_reason: String,
    pub rollback_requested_by: String,
    pub rollback_completed_at: DateTime<Utc>,
}

/// Canonical step names, in protocol order
pub const STEP_NAMES: [&str; 5] = [
    "pre_rotation_check",
    "generate_secret",
    "validate_secret",
    "deploy_secret",
    "verify_dependents",
];

/// One rotation attempt for one secret configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRotationExecution {
    pub id: ExecutionId,

    /// Configuration being rotated
    pub secret_id: SecretId,

    pub trigger_type: TriggerType,

    /// Free-text reason supplied by the trigger
    pub reason: String,

    pub status: ExecutionStatus,

    pub old_secret_metadata: Option<SecretMetadata>,
    pub new_secret_metadata: Option<SecretMetadata>,

    /// Step records, append-only within this execution
    pub rotation_steps: Vec<RotationStep>,

    pub validation_results: ValidationResults,

    pub rollback_info: Option<RollbackInfo>,

    /// When the dual-accept window ends, if one was entered
    pub dual_accept_until: Option<DateTime<Utc>>,

    pub started_at: DateTime<Utc>,

    /// Set iff `status` is terminal
    pub completed_at: Option<DateTime<Utc>>,

    /// `completed_at - started_at`, whenever both are set
    pub duration_ms: Option<u64>,

    /// Error summary for a failed execution
    pub error_message: Option<String>,
}

impl SecretRotationExecution {
    /// Create a pending execution with all protocol steps pre-declared
    pub fn new(
        secret_id: SecretId,
        trigger_type: TriggerType,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let rotation_steps = STEP_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| RotationStep::pending(i as u8 + 1, name))
            .collect();

        Self {
            id: ExecutionId::new(),
            secret_id,
            trigger_type,
            reason: reason.into(),
            status: ExecutionStatus::Pending,
            old_secret_metadata: None,
            new_secret_metadata: None,
            rotation_steps,
            validation_results: ValidationResults::default(),
            rollback_info: None,
            dual_accept_until: None,
            started_at: now,
            completed_at: None,
            duration_ms: None,
            error_message: None,
        }
    }

    /// Validated state transition; stamps `completed_at` on terminal states
    pub fn transition_to(&mut self, next: ExecutionStatus, now: DateTime<Utc>) -> RotationResult<()> {
        self.status = self.status.transition_to(next)?;

        if self.status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
            self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
        }

        Ok(())
    }

    /// Mark a step as running
    pub fn begin_step(&mut self, name: &str, now: DateTime<Utc>) {
        if let Some(step) = self.step_mut(name) {
            step.status = StepStatus::Running;
            step.started_at = Some(now);
        }
    }

    /// Mark a step completed
    pub fn complete_step(&mut self, name: &str, rollback_possible: bool, now: DateTime<Utc>) {
        if let Some(step) = self.step_mut(name) {
            step.status = StepStatus::Completed;
            step.completed_at = Some(now);
            step.rollback_possible = rollback_possible;
        }
    }

    /// Record a step failure and skip everything after it
    pub fn fail_step(&mut self, name: &str, error: impl Into<String>, now: DateTime<Utc>) {
        let error = error.into();
        let mut failed_seen = false;
        for step in &mut self.rotation_steps {
            if step.name == name {
                step.status = StepStatus::Failed;
                step.completed_at = Some(now);
                step.error_message = Some(error.clone());
                failed_seen = true;
            } else if failed_seen {
                step.status = StepStatus::Skipped;
            }
        }
        self.error_message = Some(error);
    }

    /// Whether the deploy step completed (a restore is well-defined)
    pub fn deploy_succeeded(&self) -> bool {
        self.rotation_steps
            .iter()
            .any(|s| s.name == "deploy_secret" && s.status == StepStatus::Completed)
    }

    /// Whether this execution still counts against the concurrency gate
    ///
    /// Dual-accept holds a slot: the executor is still responsible for the
    /// old value until the window elapses.
    pub fn holds_slot(&self) -> bool {
        !self.status.is_terminal()
    }

    fn step_mut(&mut self, name: &str) -> Option<&mut RotationStep> {
        self.rotation_steps.iter_mut().find(|s| s.name == name)
    }

    /// Look up a step by name
    pub fn step(&self, name: &str) -> Option<&RotationStep> {
        self.rotation_steps.iter().find(|s| s.name == name)
    }
}
