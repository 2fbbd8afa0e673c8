//! Rotation executor
//!
//! Runs the multi-step rotation protocol for one secret against one
//! configuration, producing a [`SecretRotationExecution`] record:
//!
//! 1. `pre_rotation_check` - functional check against the current secret
//! 2. `generate_secret` - invoke the generator
//! 3. `validate_secret` - length/entropy policy for the secret type
//! 4. `deploy_secret` - write to the storage location (first external write)
//! 5. `verify_dependents` - apply update methods, poll health checks
//!
//! Step-level failures are captured on the step record and the execution
//! ends in `failed`; only precondition violations (unknown configuration,
//! rotation already in progress) surface as errors to the caller.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use keywheel_core::{ExecutionId, SecretId, SecretString};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::audit::{AuditEntry, AuditLog};
use crate::clock::Clock;
use crate::error::{RotationError, RotationResult};
use crate::events::{emit_event, Notifier, RotationEvent};
use crate::generator::{minimum_entropy_bits, GeneratedSecret, SecretGenerator};
use crate::model::{
    ExecutionStatus, RollbackInfo, SecretConfiguration, SecretMetadata, SecretRotationExecution,
    TriggerType,
};
use crate::probe::DependencyProbe;
use crate::storage::SecretStorage;
use crate::store::{ConfigStore, ExecutionStore};

/// Executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound on any single externally-touching step (probe calls,
    /// storage writes); a timed-out step fails the execution
    #[serde(with = "humantime_serde")]
    pub step_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
        }
    }
}

/// Options for one rotation attempt
#[derive(Debug, Clone)]
pub struct RotateOptions {
    pub trigger: TriggerType,
    pub reason: String,

    /// Skip the dual-accept window even when the configuration's grace
    /// period is nonzero (emergency cutover)
    pub force_immediate_cutover: bool,

    /// Who requested the rotation, for the audit trail
    pub actor: String,
}

impl RotateOptions {
    pub fn scheduled(reason: impl Into<String>) -> Self {
        Self {
            trigger: TriggerType::Scheduled,
            reason: reason.into(),
            force_immediate_cutover: false,
            actor: "scheduler".to_string(),
        }
    }

    pub fn manual(reason: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            trigger: TriggerType::Manual,
            reason: reason.into(),
            force_immediate_cutover: false,
            actor: actor.into(),
        }
    }
}

/// The old value captured by one deploy, tied to the execution that
/// overwrote it
struct RetainedBackup {
    execution_id: ExecutionId,
    value: SecretString,
}

/// Executes the rotation protocol with injected collaborators
pub struct RotationExecutor {
    config_store: Arc<dyn ConfigStore>,
    execution_store: Arc<dyn ExecutionStore>,
    secret_storage: Arc<dyn SecretStorage>,
    generator: SecretGenerator,
    probe: Arc<dyn DependencyProbe>,
    audit: Arc<dyn AuditLog>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: ExecutorConfig,

    /// At most one retained old value per secret: the one displaced by
    /// the most recent deploy. A newer deploy replaces the entry, which
    /// forecloses rollback of the superseded execution; restoring a
    /// value two generations stale would clobber the live secret.
    backups: RwLock<HashMap<SecretId, RetainedBackup>>,
}

/// Builder for [`RotationExecutor`]
#[derive(Default)]
pub struct RotationExecutorBuilder {
    config_store: Option<Arc<dyn ConfigStore>>,
    execution_store: Option<Arc<dyn ExecutionStore>>,
    secret_storage: Option<Arc<dyn SecretStorage>>,
    probe: Option<Arc<dyn DependencyProbe>>,
    audit: Option<Arc<dyn AuditLog>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    config: Option<ExecutorConfig>,
}

impl RotationExecutorBuilder {
    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn execution_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.execution_store = Some(store);
        self
    }

    pub fn secret_storage(mut self, storage: Arc<dyn SecretStorage>) -> Self {
        self.secret_storage = Some(storage);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn DependencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the executor
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::InvalidConfiguration`] when a required
    /// collaborator (stores, storage, probe) is missing. Audit, notifier,
    /// and clock default to in-memory/tracing/system implementations.
    pub fn build(self) -> RotationResult<RotationExecutor> {
        let missing = |name: &str| RotationError::InvalidConfiguration {
            reason: format!("executor requires a {name}"),
        };

        Ok(RotationExecutor {
            config_store: self.config_store.ok_or_else(|| missing("config store"))?,
            execution_store: self
                .execution_store
                .ok_or_else(|| missing("execution store"))?,
            secret_storage: self
                .secret_storage
                .ok_or_else(|| missing("secret storage"))?,
            generator: SecretGenerator::new(),
            probe: self.probe.ok_or_else(|| missing("dependency probe"))?,
            audit: self
                .audit
                .unwrap_or_else(|| Arc::new(crate::audit::MemoryAuditLog::new())),
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(crate::events::TracingNotifier)),
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(crate::clock::SystemClock)),
            config: self.config.unwrap_or_default(),
            backups: RwLock::new(HashMap::new()),
        })
    }
}

impl RotationExecutor {
    pub fn builder() -> RotationExecutorBuilder {
        RotationExecutorBuilder::default()
    }

    /// Run the rotation protocol for one secret
    ///
    /// Returns the execution id; the outcome is observed through the
    /// execution record's `status` and `error_message`, not through this
    /// function's error. Only two preconditions error synchronously:
    ///
    /// - [`RotationError::ConfigurationNotFound`] - no active configuration
    /// - [`RotationError::RotationInProgress`] - the per-configuration lock
    ///   is held; retry later, requests are never queued implicitly
    pub async fn rotate(
        &self,
        secret_id: &SecretId,
        options: RotateOptions,
    ) -> RotationResult<ExecutionId> {
        let config = self
            .config_store
            .get(secret_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| RotationError::ConfigurationNotFound {
                secret_id: secret_id.clone(),
            })?;

        let now = self.clock.now();
        let mut execution = SecretRotationExecution::new(
            secret_id.clone(),
            options.trigger,
            options.reason.clone(),
            now,
        );
        execution.old_secret_metadata = Some(SecretMetadata {
            age_days: config.age(now).num_days().max(0) as u32,
            strength_score: 0,
            entropy_bits: 0,
            algorithm: "unknown".to_string(),
        });

        // Acquires the per-configuration active-execution marker; a second
        // rotate() for the same configuration fails fast here.
        self.execution_store.try_begin(execution.clone()).await?;

        let execution_id = execution.id;
        info!(
            secret_id = %secret_id,
            execution_id = %execution_id,
            trigger = ?options.trigger,
            "Rotation started"
        );
        self.record_audit(
            &execution,
            &options.actor,
            format!("rotation requested ({})", options.reason),
        )
        .await;
        emit_event(
            self.notifier.as_ref(),
            RotationEvent::RotationStarted {
                secret_id: secret_id.clone(),
                execution_id,
                at: now,
            },
        )
        .await;

        if let Err(e) = self.run_protocol(&mut execution, &config, &options).await {
            self.abort_after_store_failure(&mut execution, &e).await;
            return Err(e);
        }

        Ok(execution_id)
    }

    /// Drive the step sequence; step failures terminate the execution in
    /// `failed` and are not returned as errors.
    async fn run_protocol(
        &self,
        execution: &mut SecretRotationExecution,
        config: &SecretConfiguration,
        options: &RotateOptions,
    ) -> RotationResult<()> {
        // Step 1: pre-rotation health check against the *current* secret.
        // Cheapest failure point - aborts before any new value exists.
        self.begin_step(execution, "pre_rotation_check").await;
        let pre_check = match &config.validation {
            Some(spec) => self.functional_check_bounded(spec).await,
            None => Ok(()),
        };
        execution.validation_results.pre_rotation_check = Some(pre_check.is_ok());
        if let Err(e) = pre_check {
            return self.fail(execution, "pre_rotation_check", &e, options).await;
        }
        self.finish_step(execution, "pre_rotation_check", false, ExecutionStatus::Generating)
            .await?;

        // Step 2: generate the new value.
        self.begin_step(execution, "generate_secret").await;
        let generated = match self.generator.generate(config.secret_type) {
            Ok(generated) => generated,
            Err(e) => {
                execution.validation_results.generation_valid = Some(false);
                return self.fail(execution, "generate_secret", &e, options).await;
            }
        };
        execution.new_secret_metadata = Some(generated.metadata.clone());
        self.finish_step(execution, "generate_secret", false, ExecutionStatus::Validating)
            .await?;

        // Step 3: entropy/length policy for the secret type.
        self.begin_step(execution, "validate_secret").await;
        let policy_ok = validate_generated(&generated, config);
        execution.validation_results.generation_valid = Some(policy_ok.is_ok());
        if let Err(e) = policy_ok {
            return self.fail(execution, "validate_secret", &e, options).await;
        }
        self.finish_step(execution, "validate_secret", false, ExecutionStatus::Deploying)
            .await?;

        // Step 4: the only step permitted to mutate external state before
        // verification. The old value is backed up first so a restore is
        // always defined from here on.
        self.begin_step(execution, "deploy_secret").await;
        let path = &config.storage_location.path;
        match self.secret_storage.read(path).await {
            Ok(Some(old_value)) => {
                self.backups.write().insert(
                    execution.secret_id.clone(),
                    RetainedBackup {
                        execution_id: execution.id,
                        value: old_value,
                    },
                );
            }
            Ok(None) => {
                // Nothing lived at the path; any stale entry must not
                // survive to masquerade as this deploy's backup.
                self.backups.write().remove(&execution.secret_id);
            }
            Err(e) => {
                execution.validation_results.deployed = Some(false);
                return self.fail(execution, "deploy_secret", &e, options).await;
            }
        }
        let write = self
            .bounded(self.secret_storage.write(path, &generated.value), |t| {
                RotationError::Deployment {
                    path: path.clone(),
                    reason: format!("storage write timed out after {t:?}"),
                }
            })
            .await;
        if let Err(e) = write {
            execution.validation_results.deployed = Some(false);
            return self.fail(execution, "deploy_secret", &e, options).await;
        }
        execution.validation_results.deployed = Some(true);
        self.finish_step(execution, "deploy_secret", true, ExecutionStatus::Verifying)
            .await?;

        // Step 5: update dependents in declared order and poll health.
        self.begin_step(execution, "verify_dependents").await;
        let post_check = match &config.validation {
            Some(spec) => self.functional_check_bounded(spec).await,
            None => Ok(()),
        };
        execution.validation_results.post_verified = Some(post_check.is_ok());
        if let Err(e) = post_check {
            execution.validation_results.dependent_services_healthy = Some(false);
            return self.fail(execution, "verify_dependents", &e, options).await;
        }
        for dependency in &config.dependencies {
            let result = self
                .bounded(
                    async {
                        self.probe.apply_update(dependency).await?;
                        self.probe.check_health(dependency).await
                    },
                    |t| RotationError::DependencyUnhealthy {
                        service: dependency.service.clone(),
                        reason: format!("update/health check timed out after {t:?}"),
                    },
                )
                .await;
            if let Err(e) = result {
                execution.validation_results.dependent_services_healthy = Some(false);
                return self.fail(execution, "verify_dependents", &e, options).await;
            }
        }
        execution.validation_results.dependent_services_healthy = Some(true);

        // Steps done; either enter the dual-accept window or cut over now.
        let grace = config.rotation_policy.grace_period();
        let enter_dual_accept = !grace.is_zero() && !options.force_immediate_cutover;
        if enter_dual_accept {
            let now = self.clock.now();
            execution.dual_accept_until = Some(
                now + chrono::Duration::from_std(grace)
                    .unwrap_or_else(|_| chrono::Duration::zero()),
            );
            self.finish_step(execution, "verify_dependents", true, ExecutionStatus::DualAccept)
                .await?;
            info!(
                execution_id = %execution.id,
                until = ?execution.dual_accept_until,
                "Dual-accept window opened; old and new values both valid"
            );
        } else {
            self.finish_step(execution, "verify_dependents", true, ExecutionStatus::Completed)
                .await?;
            self.on_completed(execution).await?;
        }

        Ok(())
    }

    /// Close an elapsed dual-accept window
    ///
    /// Returns `Ok(true)` when the execution transitioned to `completed`,
    /// `Ok(false)` when the window has not elapsed yet.
    pub async fn complete_dual_accept(&self, execution_id: &ExecutionId) -> RotationResult<bool> {
        let mut execution = self.load_execution(execution_id).await?;

        if execution.status != ExecutionStatus::DualAccept {
            return Err(RotationError::InvalidStateTransition {
                from: execution.status.as_str().to_string(),
                to: ExecutionStatus::Completed.as_str().to_string(),
            });
        }

        let now = self.clock.now();
        match execution.dual_accept_until {
            Some(until) if now >= until => {}
            _ => return Ok(false),
        }

        execution.transition_to(ExecutionStatus::Completed, now)?;
        self.record_audit(
            &execution,
            "scheduler",
            "status: dual_accept -> completed (window elapsed)",
        )
        .await;
        self.execution_store.update(execution.clone()).await?;
        self.on_completed(&execution).await?;
        Ok(true)
    }

    /// Restore the old value by explicit operator action
    ///
    /// Permitted while the execution is in `dual_accept`, `completed`, or
    /// `failed` with a prior successful deploy. A failed restore is
    /// recorded on the execution and surfaced as a compliance alert, but
    /// never propagates past this call.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Rollback`] when nothing was deployed yet
    /// (e.g. the execution failed during generation or validation).
    pub async fn rollback(
        &self,
        execution_id: &ExecutionId,
        reason: impl Into<String>,
        actor: impl Into<String>,
    ) -> RotationResult<()> {
        let reason = reason.into();
        let actor = actor.into();
        let mut execution = self.load_execution(execution_id).await?;

        let permitted = match execution.status {
            ExecutionStatus::DualAccept | ExecutionStatus::Completed => true,
            ExecutionStatus::Failed => execution.deploy_succeeded(),
            _ => false,
        };
        if !permitted {
            return Err(RotationError::Rollback {
                execution_id: *execution_id,
                reason: format!(
                    "rollback not permitted from status '{}' (nothing deployed)",
                    execution.status
                ),
            });
        }

        let config = self
            .config_store
            .get(&execution.secret_id)
            .await?
            .ok_or_else(|| RotationError::ConfigurationNotFound {
                secret_id: execution.secret_id.clone(),
            })?;

        // Only the execution behind the most recent deploy may restore;
        // anything older would overwrite the live value with a secret
        // two or more generations stale.
        let backup = {
            let mut backups = self.backups.write();
            match backups.get(&execution.secret_id) {
                Some(retained) if retained.execution_id == *execution_id => {
                    backups.remove(&execution.secret_id).map(|r| r.value)
                }
                Some(_) => {
                    return Err(RotationError::Rollback {
                        execution_id: *execution_id,
                        reason: "superseded by a newer rotation; its old value is no longer retained"
                            .to_string(),
                    });
                }
                None => None,
            }
        };
        let restore_result = match backup {
            Some(old_value) => {
                self.secret_storage
                    .write(&config.storage_location.path, &old_value)
                    .await
            }
            None => Err(RotationError::Rollback {
                execution_id: *execution_id,
                reason: "no backup of the old value is available".to_string(),
            }),
        };

        let now = self.clock.now();
        let successful = restore_result.is_ok();
        execution.rollback_info = Some(RollbackInfo {
            rollback_executed: true,
            rollback_successful: successful,
            rollback_reason: reason.clone(),
            rollback_requested_by: actor.clone(),
            rollback_completed_at: now,
        });
        execution.transition_to(ExecutionStatus::RolledBack, now)?;
        self.execution_store.update(execution.clone()).await?;
        self.record_audit(
            &execution,
            &actor,
            format!("rollback ({reason}): successful={successful}"),
        )
        .await;

        if let Err(e) = restore_result {
            // The system may now hold no known-good credential: standalone
            // alert, manual escalation, but the caller is not crashed.
            error!(
                execution_id = %execution_id,
                secret_id = %execution.secret_id,
                error = %e,
                "Rollback failed; no known-good credential may be deployed"
            );
            emit_event(
                self.notifier.as_ref(),
                RotationEvent::ComplianceViolation {
                    secret_id: execution.secret_id.clone(),
                    at: now,
                    detail: format!("rollback failed: {e}"),
                },
            )
            .await;
        } else {
            info!(
                execution_id = %execution_id,
                secret_id = %execution.secret_id,
                "Rollback completed; old value restored"
            );
        }

        Ok(())
    }

    // step plumbing

    /// Bound an externally-touching call by the step timeout
    async fn bounded<T, F>(
        &self,
        call: F,
        on_timeout: impl FnOnce(Duration) -> RotationError,
    ) -> RotationResult<T>
    where
        F: Future<Output = RotationResult<T>>,
    {
        match tokio::time::timeout(self.config.step_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(self.config.step_timeout)),
        }
    }

    async fn functional_check_bounded(
        &self,
        spec: &crate::model::ValidationSpec,
    ) -> RotationResult<()> {
        self.bounded(self.probe.functional_check(spec), |t| {
            RotationError::DependencyUnhealthy {
                service: spec.endpoint.clone(),
                reason: format!("functional validation timed out after {t:?}"),
            }
        })
        .await
    }

    async fn begin_step(&self, execution: &mut SecretRotationExecution, name: &str) {
        let now = self.clock.now();
        execution.begin_step(name, now);
        // Best-effort persistence of intermediate progress.
        if let Err(e) = self.execution_store.update(execution.clone()).await {
            warn!(execution_id = %execution.id, error = %e, "Failed to persist step start");
        }
    }

    async fn finish_step(
        &self,
        execution: &mut SecretRotationExecution,
        name: &str,
        rollback_possible: bool,
        next: ExecutionStatus,
    ) -> RotationResult<()> {
        let now = self.clock.now();
        let from = execution.status;
        execution.complete_step(name, rollback_possible, now);
        execution.transition_to(next, now)?;
        self.record_audit(
            execution,
            "executor",
            format!("status: {from} -> {next}"),
        )
        .await;
        self.execution_store.update(execution.clone()).await
    }

    async fn fail(
        &self,
        execution: &mut SecretRotationExecution,
        step: &str,
        error: &RotationError,
        options: &RotateOptions,
    ) -> RotationResult<()> {
        let now = self.clock.now();
        let from = execution.status;
        execution.fail_step(step, error.to_string(), now);
        execution.transition_to(ExecutionStatus::Failed, now)?;
        self.execution_store.update(execution.clone()).await?;

        warn!(
            secret_id = %execution.secret_id,
            execution_id = %execution.id,
            step,
            error = %error,
            "Rotation failed"
        );
        self.record_audit(
            execution,
            &options.actor,
            format!("status: {from} -> failed at step '{step}'"),
        )
        .await;
        emit_event(
            self.notifier.as_ref(),
            RotationEvent::RotationFailed {
                secret_id: execution.secret_id.clone(),
                execution_id: execution.id,
                at: now,
                error: error.to_string(),
            },
        )
        .await;
        Ok(())
    }

    /// Best-effort release of the active-execution marker when a store
    /// update failed mid-protocol; a non-terminal execution would
    /// otherwise hold its configuration's lock until a restart.
    async fn abort_after_store_failure(
        &self,
        execution: &mut SecretRotationExecution,
        cause: &RotationError,
    ) {
        if execution.status.is_terminal() {
            return;
        }

        let now = self.clock.now();
        execution.error_message = Some(cause.to_string());
        if execution
            .transition_to(ExecutionStatus::Failed, now)
            .is_err()
        {
            return;
        }
        if let Err(e) = self.execution_store.update(execution.clone()).await {
            error!(
                secret_id = %execution.secret_id,
                execution_id = %execution.id,
                error = %e,
                "Could not release the active-execution lock; manual intervention required"
            );
        }
    }

    async fn on_completed(&self, execution: &SecretRotationExecution) -> RotationResult<()> {
        let now = self.clock.now();
        self.config_store
            .record_rotation(&execution.secret_id, now)
            .await?;
        emit_event(
            self.notifier.as_ref(),
            RotationEvent::RotationCompleted {
                secret_id: execution.secret_id.clone(),
                execution_id: execution.id,
                at: now,
                duration_ms: execution.duration_ms.unwrap_or(0),
            },
        )
        .await;
        Ok(())
    }

    async fn load_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> RotationResult<SecretRotationExecution> {
        self.execution_store
            .get(execution_id)
            .await?
            .ok_or(RotationError::ExecutionNotFound {
                execution_id: *execution_id,
            })
    }

    async fn record_audit(
        &self,
        execution: &SecretRotationExecution,
        actor: &str,
        action: impl Into<String>,
    ) {
        let entry = AuditEntry::new(
            execution.secret_id.clone(),
            Some(execution.id),
            actor,
            action,
            self.clock.now(),
        );
        if let Err(e) = self.audit.append(entry).await {
            warn!(execution_id = %execution.id, error = %e, "Audit append failed");
        }
    }
}

/// Minimum length/entropy policy for a generated value
fn validate_generated(
    generated: &GeneratedSecret,
    config: &SecretConfiguration,
) -> RotationResult<()> {
    if generated.value.is_empty() {
        return Err(RotationError::Generation {
            reason: "generated value is empty".to_string(),
        });
    }

    let floor = minimum_entropy_bits(config.secret_type);
    if generated.metadata.entropy_bits < floor {
        return Err(RotationError::Generation {
            reason: format!(
                "entropy {} bits below the {} bit floor for {:?}",
                generated.metadata.entropy_bits, floor, config.secret_type
            ),
        });
    }

    Ok(())
}
