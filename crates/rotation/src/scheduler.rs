//! Rotation scheduler
//!
//! Periodically finds overdue configurations and starts rotations up to a
//! concurrency ceiling. Due rotations that do not fit are skipped until the
//! next cycle, with a backpressure event; nothing is queued implicitly.

use std::sync::Arc;
use std::time::Duration;

use keywheel_core::{ExecutionId, SecretId};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::RotationResult;
use crate::events::{emit_event, Notifier, RotationEvent};
use crate::executor::{RotateOptions, RotationExecutor};
use crate::model::ExecutionStatus;
use crate::store::{ConfigStore, ExecutionStore};

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Global ceiling on in-flight executions (dual-accept holds a slot)
    pub max_concurrent_rotations: usize,

    /// How often the loop checks the schedule (humantime strings in
    /// config files, e.g. "60s")
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_rotations: 3,
            check_interval: Duration::from_secs(60),
        }
    }
}

/// One configuration due for rotation
#[derive(Debug, Clone)]
pub struct DueSecret {
    pub secret_id: SecretId,

    /// How far past the age threshold the secret is
    pub overdue_by: chrono::Duration,
}

/// Outcome of one scheduling cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Configurations due at the start of the cycle
    pub due: usize,

    /// Executions started this cycle
    pub started: Vec<ExecutionId>,

    /// Due rotations deferred because the ceiling was reached
    pub skipped_backpressure: usize,

    /// Rotations that failed to start (e.g. lock contention); a failed
    /// start hands its slot to the next due candidate
    pub failed_to_start: usize,

    /// Dual-accept windows closed by this cycle's reconciliation
    pub completed_dual_accept: usize,
}

/// Drives scheduled rotations against the configured ceiling
pub struct RotationScheduler {
    config_store: Arc<dyn ConfigStore>,
    execution_store: Arc<dyn ExecutionStore>,
    executor: Arc<RotationExecutor>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl RotationScheduler {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        execution_store: Arc<dyn ExecutionStore>,
        executor: Arc<RotationExecutor>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            config_store,
            execution_store,
            executor,
            notifier,
            clock,
            config,
        }
    }

    /// Compute which configurations are due, most overdue first
    ///
    /// Pure over store state and the clock: calling it twice without an
    /// intervening rotation returns the same list. Ties in overdue time
    /// break by secret id for a stable order.
    pub async fn check_schedule(&self) -> RotationResult<Vec<DueSecret>> {
        let now = self.clock.now();
        let mut due: Vec<DueSecret> = self
            .config_store
            .list_active()
            .await?
            .into_iter()
            .filter(|c| c.rotation_policy.auto_rotate && c.is_overdue(now))
            .map(|c| DueSecret {
                overdue_by: c.overdue_by(now),
                secret_id: c.id,
            })
            .collect();

        due.sort_by(|a, b| {
            b.overdue_by
                .cmp(&a.overdue_by)
                .then_with(|| a.secret_id.as_str().cmp(b.secret_id.as_str()))
        });
        Ok(due)
    }

    /// Run one scheduling cycle
    ///
    /// Reconciles elapsed dual-accept windows, then starts due rotations
    /// into the available slots. A rotation that fails to start does not
    /// consume a slot or block the rest of the cycle.
    pub async fn run_cycle(&self) -> RotationResult<CycleReport> {
        let mut report = CycleReport::default();

        report.completed_dual_accept = self.reconcile_dual_accept().await?;

        let due = self.check_schedule().await?;
        report.due = due.len();
        if due.is_empty() {
            return Ok(report);
        }

        let current_load = self.execution_store.list_non_terminal().await?.len();
        let slots = self
            .config
            .max_concurrent_rotations
            .saturating_sub(current_load);

        let mut attempted = 0;
        for candidate in &due {
            if report.started.len() >= slots {
                break;
            }
            attempted += 1;
            let reason = format!(
                "scheduled rotation (overdue by {}h)",
                candidate.overdue_by.num_hours()
            );
            match self
                .executor
                .rotate(&candidate.secret_id, RotateOptions::scheduled(reason))
                .await
            {
                Ok(execution_id) => report.started.push(execution_id),
                Err(e) => {
                    // The slot passes to the next due candidate.
                    warn!(
                        secret_id = %candidate.secret_id,
                        error = %e,
                        "Scheduled rotation failed to start"
                    );
                    report.failed_to_start += 1;
                }
            }
        }

        if attempted < due.len() {
            report.skipped_backpressure = due.len() - attempted;
            info!(
                due = due.len(),
                skipped = report.skipped_backpressure,
                current_load,
                "Concurrency ceiling reached; deferring due rotations to the next cycle"
            );
            emit_event(
                self.notifier.as_ref(),
                RotationEvent::BackpressureSkip {
                    at: self.clock.now(),
                    due_count: due.len(),
                    skipped_count: report.skipped_backpressure,
                    current_load,
                },
            )
            .await;
        }

        Ok(report)
    }

    /// Close dual-accept windows whose grace period has elapsed
    async fn reconcile_dual_accept(&self) -> RotationResult<usize> {
        let now = self.clock.now();
        let mut closed = 0;
        for execution in self.execution_store.list_non_terminal().await? {
            if execution.status != ExecutionStatus::DualAccept {
                continue;
            }
            let elapsed = matches!(execution.dual_accept_until, Some(until) if now >= until);
            if !elapsed {
                continue;
            }
            match self.executor.complete_dual_accept(&execution.id).await {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        execution_id = %execution.id,
                        error = %e,
                        "Failed to close dual-accept window"
                    );
                }
            }
        }
        Ok(closed)
    }

    /// Run cycles until the token is cancelled
    pub async fn run_loop(&self, shutdown: CancellationToken) {
        info!(
            interval = ?self.config.check_interval,
            ceiling = self.config.max_concurrent_rotations,
            "Rotation scheduler started"
        );

        loop {
            tokio::select! {
                () = tokio::time::sleep(self.config.check_interval) => {
                    match self.run_cycle().await {
                        Ok(report) => {
                            debug!(
                                due = report.due,
                                started = report.started.len(),
                                skipped = report.skipped_backpressure,
                                "Scheduling cycle finished"
                            );
                        }
                        Err(e) => error!(error = %e, "Scheduling cycle failed"),
                    }
                }
                () = shutdown.cancelled() => {
                    info!("Rotation scheduler stopping");
                    return;
                }
            }
        }
    }
}
