//! End-to-end rotation protocol behavior: dual-accept windows, failure
//! capture, the per-configuration lock, and rollback safety.

mod common;

use std::time::Duration;

use common::{dependency, old_value, Harness};
use keywheel_rotation::{
    AuditLog, Clock, ExecutionStatus, RotateOptions, RotationError, RotationEvent, StepStatus,
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn scheduled_rotation_enters_and_completes_dual_accept() {
    // GIVEN an overdue configuration with a 48-hour grace period
    let harness = Harness::new();
    let secret_id = harness.add_config("webhook-signing-secret", 48).await;
    let start = harness.clock.now();

    // WHEN a rotation runs
    let execution_id = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("age threshold", "ops"))
        .await
        .unwrap();

    // THEN every step completed and the execution parked in dual_accept
    let execution = get_execution(&harness, &execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::DualAccept);
    assert!(execution
        .rotation_steps
        .iter()
        .all(|s| s.status == StepStatus::Completed));
    assert_eq!(execution.validation_results.pre_rotation_check, Some(true));
    assert_eq!(execution.validation_results.generation_valid, Some(true));
    assert_eq!(execution.validation_results.deployed, Some(true));
    assert_eq!(execution.validation_results.post_verified, Some(true));
    assert_eq!(
        execution.validation_results.dependent_services_healthy,
        Some(true)
    );

    // Not terminal: no completion stamp, and the lock is still held.
    assert!(execution.completed_at.is_none());
    assert_eq!(
        execution.dual_accept_until,
        Some(start + chrono::Duration::hours(48))
    );
    assert_eq!(harness.store.active_marker_count(), 1);

    // The new value is live but differs from the old one.
    let deployed = harness.stored_value("webhook-signing-secret").await;
    assert_ne!(deployed, old_value("webhook-signing-secret"));

    // WHEN the window has not elapsed yet
    harness.clock.advance(Duration::from_secs(47 * 3600));
    let closed = harness
        .executor
        .complete_dual_accept(&execution_id)
        .await
        .unwrap();
    assert!(!closed);

    // WHEN the 48 hours are up
    harness.clock.advance(Duration::from_secs(3600));
    let closed = harness
        .executor
        .complete_dual_accept(&execution_id)
        .await
        .unwrap();
    assert!(closed);

    // THEN the execution is terminal, the lock released, and the
    // configuration stamped with the rotation time
    let execution = get_execution(&harness, &execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert!(execution.completed_at.is_some());
    assert!(execution.duration_ms.is_some());
    assert_eq!(harness.store.active_marker_count(), 0);

    let config = harness.config(&secret_id).await;
    assert_eq!(config.last_rotated_at, Some(harness.clock.now()));

    // Started and completed events were emitted, plus an audit trail.
    let events = harness.notifier.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, RotationEvent::RotationStarted { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, RotationEvent::RotationCompleted { .. })));
    let trail = harness
        .audit
        .entries_for_execution(&execution_id)
        .await
        .unwrap();
    assert!(trail.len() >= 6, "expected a full transition trail");
}

#[tokio::test]
async fn zero_grace_period_completes_immediately() {
    let harness = Harness::new();
    let secret_id = harness.add_config("api-key", 0).await;

    let execution_id = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("drill", "ops"))
        .await
        .unwrap();

    let execution = get_execution(&harness, &execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert!(execution.dual_accept_until.is_none());
    assert!(execution.completed_at.is_some());
    assert_eq!(harness.store.active_marker_count(), 0);
}

#[tokio::test]
async fn unknown_configuration_is_a_synchronous_error() {
    let harness = Harness::new();
    let secret_id = keywheel_core::SecretId::new("never-registered").unwrap();

    let err = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("drill", "ops"))
        .await
        .unwrap_err();
    assert!(matches!(err, RotationError::ConfigurationNotFound { .. }));
}

#[tokio::test]
async fn unhealthy_dependent_fails_the_execution_not_the_caller() {
    // GIVEN a dependency scripted to fail its health check
    let harness = Harness::new();
    let secret_id = harness.add_config("db-password", 0).await;
    let mut config = harness.config(&secret_id).await;
    config.dependencies = vec![dependency("billing")];
    harness.put_config(config).await;
    harness.probe.mark_unhealthy("billing", "connection refused");

    // WHEN the rotation runs, the call still returns the execution id
    let execution_id = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("drill", "ops"))
        .await
        .unwrap();

    // THEN the failure is captured on the record
    let execution = get_execution(&harness, &execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(
        execution.validation_results.dependent_services_healthy,
        Some(false)
    );
    assert_eq!(
        execution.step("verify_dependents").unwrap().status,
        StepStatus::Failed
    );
    assert!(execution
        .error_message
        .as_deref()
        .unwrap()
        .contains("billing"));
    assert_eq!(harness.store.active_marker_count(), 0);

    let events = harness.notifier.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, RotationEvent::RotationFailed { .. })));
}

#[tokio::test]
async fn early_failure_skips_the_remaining_steps() {
    let harness = Harness::new();
    let secret_id = harness.add_config("api-key", 0).await;
    let mut config = harness.config(&secret_id).await;
    config.validation = Some(keywheel_rotation::ValidationSpec {
        endpoint: "https://api.internal/ping".to_string(),
        method: "GET".to_string(),
        expected_status: 200,
    });
    harness.put_config(config).await;
    harness.probe.fail_functional_check("endpoint returned 500");

    let execution_id = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("drill", "ops"))
        .await
        .unwrap();

    let execution = get_execution(&harness, &execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.validation_results.pre_rotation_check, Some(false));
    assert_eq!(
        execution.step("pre_rotation_check").unwrap().status,
        StepStatus::Failed
    );
    for later in [
        "generate_secret",
        "validate_secret",
        "deploy_secret",
        "verify_dependents",
    ] {
        assert_eq!(execution.step(later).unwrap().status, StepStatus::Skipped);
    }

    // Nothing was deployed: the old value is untouched.
    assert_eq!(
        harness.stored_value("api-key").await,
        old_value("api-key")
    );
}

#[tokio::test]
async fn second_rotation_is_rejected_while_one_is_active() {
    // GIVEN a rotation parked in its dual-accept window (still active)
    let harness = Harness::new();
    let secret_id = harness.add_config("oauth-token", 48).await;

    harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("first", "ops"))
        .await
        .unwrap();

    // WHEN a second rotation is requested for the same configuration
    let err = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("second", "ops"))
        .await
        .unwrap_err();

    // THEN it fails fast and no second record exists
    assert!(matches!(err, RotationError::RotationInProgress { .. }));
    let executions = list_for_secret(&harness, &secret_id).await;
    assert_eq!(executions.len(), 1);
}

#[tokio::test]
async fn rollback_restores_the_old_value() {
    let harness = Harness::new();
    let secret_id = harness.add_config("encryption-key", 0).await;

    let execution_id = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("drill", "ops"))
        .await
        .unwrap();
    assert_ne!(
        harness.stored_value("encryption-key").await,
        old_value("encryption-key")
    );

    harness
        .executor
        .rollback(&execution_id, "new key breaks decryption", "oncall")
        .await
        .unwrap();

    let execution = get_execution(&harness, &execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::RolledBack);
    let info = execution.rollback_info.unwrap();
    assert!(info.rollback_executed);
    assert!(info.rollback_successful);
    assert_eq!(info.rollback_requested_by, "oncall");

    assert_eq!(
        harness.stored_value("encryption-key").await,
        old_value("encryption-key")
    );
}

#[tokio::test]
async fn rollback_of_a_superseded_rotation_is_rejected() {
    // GIVEN two successive completed rotations of the same secret
    let harness = Harness::new();
    let secret_id = harness.add_config("api-key", 0).await;

    let first = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("first", "ops"))
        .await
        .unwrap();
    let first_value = harness.stored_value("api-key").await;

    let second = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("second", "ops"))
        .await
        .unwrap();
    let second_value = harness.stored_value("api-key").await;
    assert_ne!(first_value, second_value);

    // WHEN the older execution is rolled back
    let err = harness
        .executor
        .rollback(&first, "operator picked the wrong execution", "oncall")
        .await
        .unwrap_err();

    // THEN it is refused and the live value is untouched; restoring the
    // pre-first value would be two generations stale
    assert!(matches!(err, RotationError::Rollback { .. }));
    assert_eq!(harness.stored_value("api-key").await, second_value);
    let execution = get_execution(&harness, &first).await;
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert!(execution.rollback_info.is_none());

    // The newest execution can still restore its own predecessor.
    harness
        .executor
        .rollback(&second, "new key rejected downstream", "oncall")
        .await
        .unwrap();
    assert_eq!(harness.stored_value("api-key").await, first_value);
}

#[tokio::test]
async fn rollback_before_deploy_is_rejected() {
    // GIVEN an execution that failed before anything was deployed
    let harness = Harness::new();
    let secret_id = harness.add_config("api-key", 0).await;
    let mut config = harness.config(&secret_id).await;
    config.validation = Some(keywheel_rotation::ValidationSpec {
        endpoint: "https://api.internal/ping".to_string(),
        method: "GET".to_string(),
        expected_status: 200,
    });
    harness.put_config(config).await;
    harness.probe.fail_functional_check("endpoint down");

    let execution_id = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("drill", "ops"))
        .await
        .unwrap();

    // WHEN a rollback is requested anyway
    let err = harness
        .executor
        .rollback(&execution_id, "operator mistake", "oncall")
        .await
        .unwrap_err();

    // THEN it is refused; there is nothing to restore
    assert!(matches!(err, RotationError::Rollback { .. }));
}

#[tokio::test]
async fn failed_restore_is_recorded_and_alerted_not_thrown() {
    let harness = Harness::new();
    let secret_id = harness.add_config("db-password", 0).await;

    let execution_id = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("drill", "ops"))
        .await
        .unwrap();

    // Storage backend breaks before the restore.
    harness.storage.set_fail_writes(true);

    harness
        .executor
        .rollback(&execution_id, "bad deploy", "oncall")
        .await
        .unwrap();

    let execution = get_execution(&harness, &execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::RolledBack);
    let info = execution.rollback_info.unwrap();
    assert!(info.rollback_executed);
    assert!(!info.rollback_successful);

    let events = harness.notifier.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, RotationEvent::ComplianceViolation { .. })));
}

#[tokio::test]
async fn rollback_during_dual_accept_uses_the_retained_old_value() {
    let harness = Harness::new();
    let secret_id = harness.add_config("webhook-signing-secret", 48).await;

    let execution_id = harness
        .executor
        .rotate(&secret_id, RotateOptions::manual("drill", "ops"))
        .await
        .unwrap();
    let execution = get_execution(&harness, &execution_id).await;
    assert_eq!(execution.status, ExecutionStatus::DualAccept);

    harness
        .executor
        .rollback(&execution_id, "consumer cannot verify signatures", "oncall")
        .await
        .unwrap();

    assert_eq!(
        harness.stored_value("webhook-signing-secret").await,
        old_value("webhook-signing-secret")
    );
    // The terminal rollback releases the lock.
    assert_eq!(harness.store.active_marker_count(), 0);
}

async fn get_execution(
    harness: &Harness,
    execution_id: &keywheel_core::ExecutionId,
) -> keywheel_rotation::SecretRotationExecution {
    use keywheel_rotation::ExecutionStore as _;
    harness
        .store
        .get(execution_id)
        .await
        .unwrap()
        .expect("execution exists")
}

async fn list_for_secret(
    harness: &Harness,
    secret_id: &keywheel_core::SecretId,
) -> Vec<keywheel_rotation::SecretRotationExecution> {
    use keywheel_rotation::ExecutionStore as _;
    harness.store.list_for_secret(secret_id).await.unwrap()
}
