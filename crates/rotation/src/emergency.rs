//! Emergency rotation gate
//!
//! Front door for out-of-band rotations. Decides whether a request needs
//! human approval, records the decision trail, and forwards approved
//! requests to the executor with emergency semantics (immediate cutover
//! when the bypass flags say so).

use std::sync::Arc;

use keywheel_core::{RequestId, SecretId};
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditLog};
use crate::clock::Clock;
use crate::error::{RotationError, RotationResult};
use crate::executor::{RotateOptions, RotationExecutor};
use crate::model::{
    EmergencyReason, EmergencyRotationRequest, ExecutionStatus, RequestStatus, TriggerType,
    Urgency,
};
use crate::store::{ConfigStore, ExecutionStore, RequestStore};

/// Options for an emergency rotation request
#[derive(Debug, Clone)]
pub struct EmergencyOptions {
    pub reason: EmergencyReason,
    pub urgency: Urgency,
    pub detail: Option<String>,
    pub requested_by: String,

    /// Bypass the configuration's approval requirement
    pub skip_approval: bool,

    /// Run without a dual-accept window
    pub skip_grace_period: bool,

    /// Cut over immediately even when the grace period is nonzero
    pub force_immediate_cutover: bool,
}

impl EmergencyOptions {
    pub fn new(reason: EmergencyReason, urgency: Urgency, requested_by: impl Into<String>) -> Self {
        Self {
            reason,
            urgency,
            detail: None,
            requested_by: requested_by.into(),
            skip_approval: false,
            skip_grace_period: false,
            force_immediate_cutover: false,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Full bypass: no approval, no grace period, immediate cutover
    pub fn bypass_all(mut self) -> Self {
        self.skip_approval = true;
        self.skip_grace_period = true;
        self.force_immediate_cutover = true;
        self
    }
}

/// Approval gate for emergency rotations
pub struct EmergencyGate {
    config_store: Arc<dyn ConfigStore>,
    execution_store: Arc<dyn ExecutionStore>,
    request_store: Arc<dyn RequestStore>,
    executor: Arc<RotationExecutor>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl EmergencyGate {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        execution_store: Arc<dyn ExecutionStore>,
        request_store: Arc<dyn RequestStore>,
        executor: Arc<RotationExecutor>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config_store,
            execution_store,
            request_store,
            executor,
            audit,
            clock,
        }
    }

    /// Submit an emergency rotation request
    ///
    /// When the configuration requires approval and `skip_approval` is not
    /// set, the request is recorded as `pending_approval` and no execution
    /// starts. Otherwise the request auto-approves and the rotation runs
    /// before this call returns.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::ConfigurationNotFound`] when the secret has
    /// no active configuration; executor preconditions (e.g.
    /// [`RotationError::RotationInProgress`]) propagate from the invoke
    /// path after the request is recorded as failed.
    pub async fn request(
        &self,
        secret_id: &SecretId,
        options: EmergencyOptions,
    ) -> RotationResult<EmergencyRotationRequest> {
        let config = self
            .config_store
            .get(secret_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| RotationError::ConfigurationNotFound {
                secret_id: secret_id.clone(),
            })?;

        let now = self.clock.now();
        let mut request = EmergencyRotationRequest::new(
            secret_id.clone(),
            options.reason,
            options.urgency,
            options.requested_by.clone(),
            now,
        )
        .with_bypass(
            options.skip_approval,
            options.skip_grace_period,
            options.force_immediate_cutover,
        );
        if let Some(detail) = options.detail {
            request = request.with_detail(detail);
        }

        self.record_audit(
            &request,
            &options.requested_by,
            format!(
                "emergency rotation requested ({:?}, urgency {:?})",
                options.reason, options.urgency
            ),
        )
        .await;

        let needs_approval = config.rotation_policy.require_approval && !request.skip_approval;
        if needs_approval {
            info!(
                secret_id = %secret_id,
                request_id = %request.id,
                "Emergency rotation awaiting approval"
            );
            self.request_store.insert(request.clone()).await?;
            return Ok(request);
        }

        // Policy does not require approval, or the requester bypassed it:
        // the requester's own authority stands as the approval record.
        request.approve(&options.requested_by, now);
        self.request_store.insert(request.clone()).await?;
        self.invoke(&mut request).await?;
        Ok(request)
    }

    /// Approve a pending request and run the rotation
    pub async fn approve(
        &self,
        request_id: &RequestId,
        approver: impl Into<String>,
    ) -> RotationResult<EmergencyRotationRequest> {
        let approver = approver.into();
        let mut request = self.load(request_id).await?;

        if request.status != RequestStatus::PendingApproval {
            return Err(RotationError::RequestRejected {
                reason: format!(
                    "request {} is not pending approval (status {:?})",
                    request_id, request.status
                ),
            });
        }

        request.approve(&approver, self.clock.now());
        self.request_store.update(request.clone()).await?;
        self.record_audit(&request, &approver, "emergency rotation approved")
            .await;

        self.invoke(&mut request).await?;
        Ok(request)
    }

    /// Reject a pending request; no execution is spawned
    pub async fn reject(
        &self,
        request_id: &RequestId,
        approver: impl Into<String>,
        reason: impl Into<String>,
    ) -> RotationResult<EmergencyRotationRequest> {
        let approver = approver.into();
        let reason = reason.into();
        let mut request = self.load(request_id).await?;

        if request.status != RequestStatus::PendingApproval {
            return Err(RotationError::RequestRejected {
                reason: format!(
                    "request {} is not pending approval (status {:?})",
                    request_id, request.status
                ),
            });
        }

        request.reject(&approver, reason.clone(), self.clock.now());
        self.request_store.update(request.clone()).await?;
        self.record_audit(
            &request,
            &approver,
            format!("emergency rotation rejected: {reason}"),
        )
        .await;
        Ok(request)
    }

    /// Run the rotation for an approved request and mirror its outcome
    async fn invoke(&self, request: &mut EmergencyRotationRequest) -> RotationResult<()> {
        let options = RotateOptions {
            trigger: TriggerType::Emergency,
            reason: format!("emergency: {:?}", request.reason),
            force_immediate_cutover: request.wants_immediate_cutover(),
            actor: request.requested_by.clone(),
        };

        let execution_id = match self.executor.rotate(&request.secret_id, options).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    request_id = %request.id,
                    secret_id = %request.secret_id,
                    error = %e,
                    "Emergency rotation could not start"
                );
                request.status = RequestStatus::Failed;
                self.request_store.update(request.clone()).await?;
                return Err(e);
            }
        };

        // The executor ran synchronously; mirror the outcome when it is
        // known. A dual-accept execution stays approved until the window
        // closes and the next sync_outcome call observes it.
        request.execution_id = Some(execution_id);
        if let Some(execution) = self.execution_store.get(&execution_id).await? {
            match execution.status {
                ExecutionStatus::Completed => request.record_outcome(execution_id, true),
                ExecutionStatus::Failed | ExecutionStatus::RolledBack => {
                    request.record_outcome(execution_id, false);
                }
                _ => {}
            }
        }
        self.request_store.update(request.clone()).await?;
        Ok(())
    }

    /// Re-read the spawned execution and mirror a terminal outcome onto an
    /// approved request (used after a dual-accept window closes)
    pub async fn sync_outcome(&self, request_id: &RequestId) -> RotationResult<EmergencyRotationRequest> {
        let mut request = self.load(request_id).await?;
        let Some(execution_id) = request.execution_id else {
            return Ok(request);
        };
        if request.status != RequestStatus::Approved {
            return Ok(request);
        }

        if let Some(execution) = self.execution_store.get(&execution_id).await? {
            if execution.status.is_terminal() {
                let succeeded = execution.status == ExecutionStatus::Completed;
                request.record_outcome(execution_id, succeeded);
                self.request_store.update(request.clone()).await?;
            }
        }
        Ok(request)
    }

    async fn load(&self, request_id: &RequestId) -> RotationResult<EmergencyRotationRequest> {
        self.request_store
            .get(request_id)
            .await?
            .ok_or(RotationError::RequestNotFound {
                request_id: *request_id,
            })
    }

    async fn record_audit(
        &self,
        request: &EmergencyRotationRequest,
        actor: &str,
        action: impl Into<String>,
    ) {
        let entry = AuditEntry::new(
            request.secret_id.clone(),
            request.execution_id,
            actor,
            action,
            self.clock.now(),
        );
        if let Err(e) = self.audit.append(entry).await {
            warn!(request_id = %request.id, error = %e, "Audit append failed");
        }
    }
}
