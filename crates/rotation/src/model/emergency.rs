//! Emergency rotation request model
//!
//! A gate record, separate from the execution it may spawn. Captures
//! urgency, explicit bypass flags, and approval state; on approval it
//! spawns exactly one execution and records that execution's id.

use chrono::{DateTime, Utc};
use keywheel_core::{ExecutionId, RequestId, SecretId};
use serde::{Deserialize, Serialize};

/// Why an emergency rotation was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyReason {
    CompromiseSuspected,
    CompromiseConfirmed,
    EmployeeDeparture,
    PolicyViolation,
    AuditRequirement,
}

/// Urgency of the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Critical,
}

/// Lifecycle of an emergency request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    PendingApproval,
    Approved,
    Rejected,
    /// Spawned execution finished successfully
    Completed,
    /// Spawned execution ended in failure
    Failed,
}

/// Emergency rotation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRotationRequest {
    pub id: RequestId,
    pub secret_id: SecretId,
    pub reason: EmergencyReason,
    pub urgency: Urgency,

    /// Free-text context from the requester
    pub detail: Option<String>,

    /// Bypass the approval policy entirely
    pub skip_approval: bool,

    /// Run the execution without a dual-accept window
    pub skip_grace_period: bool,

    /// Instruct the executor to cut over immediately even when the
    /// configuration's grace period is nonzero
    pub force_immediate_cutover: bool,

    pub status: RequestStatus,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    /// Execution spawned on approval (1:0..1)
    pub execution_id: Option<ExecutionId>,
}

impl EmergencyRotationRequest {
    /// Create a request awaiting the gate's approval decision
    pub fn new(
        secret_id: SecretId,
        reason: EmergencyReason,
        urgency: Urgency,
        requested_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            secret_id,
            reason,
            urgency,
            detail: None,
            skip_approval: false,
            skip_grace_period: false,
            force_immediate_cutover: false,
            status: RequestStatus::PendingApproval,
            requested_by: requested_by.into(),
            requested_at: now,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            execution_id: None,
        }
    }

    /// Set bypass flags
    pub fn with_bypass(
        mut self,
        skip_approval: bool,
        skip_grace_period: bool,
        force_immediate_cutover: bool,
    ) -> Self {
        self.skip_approval = skip_approval;
        self.skip_grace_period = skip_grace_period;
        self.force_immediate_cutover = force_immediate_cutover;
        self
    }

    /// Attach requester context
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Whether the execution should skip the dual-accept window
    pub fn wants_immediate_cutover(&self) -> bool {
        self.skip_grace_period || self.force_immediate_cutover
    }

    /// Record the approval decision
    pub fn approve(&mut self, approver: impl Into<String>, now: DateTime<Utc>) {
        self.status = RequestStatus::Approved;
        self.approved_by = Some(approver.into());
        self.approved_at = Some(now);
    }

    /// Record a rejection
    pub fn reject(
        &mut self,
        approver: impl Into<String>,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.status = RequestStatus::Rejected;
        self.approved_by = Some(approver.into());
        self.approved_at = Some(now);
        self.rejection_reason = Some(reason.into());
    }

    /// Mirror the spawned execution's terminal outcome
    pub fn record_outcome(&mut self, execution_id: ExecutionId, succeeded: bool) {
        self.execution_id = Some(execution_id);
        self.status = if succeeded {
            RequestStatus::Completed
        } else {
            RequestStatus::Failed
        };
    }
}
