//! Rotation health aggregation
//!
//! Read-only summary over stored executions and configurations; computing
//! a report never mutates engine state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::RotationResult;
use crate::model::ExecutionStatus;
use crate::store::{ConfigStore, ExecutionStore};

/// Point-in-time rotation health summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationHealthReport {
    /// Executions started within the window, any status
    pub total_executions: usize,
    pub completed: usize,
    pub failed: usize,
    pub rolled_back: usize,

    /// completed / (completed + failed); 0.0 when neither occurred
    pub rotation_success_rate: f64,

    /// Active configurations currently past their age threshold
    pub overdue_rotations: usize,

    /// Percentage of active configurations within policy, 0-100
    pub compliance_score: f64,

    /// Mean wall time of terminal executions in the window
    pub average_rotation_duration_minutes: f64,
}

/// Computes [`RotationHealthReport`]s over a reporting window
pub struct HealthAggregator {
    config_store: Arc<dyn ConfigStore>,
    execution_store: Arc<dyn ExecutionStore>,
    clock: Arc<dyn Clock>,
}

impl HealthAggregator {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        execution_store: Arc<dyn ExecutionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config_store,
            execution_store,
            clock,
        }
    }

    /// Summarize executions started within the trailing window
    pub async fn summarize(&self, window: Duration) -> RotationResult<RotationHealthReport> {
        let now = self.clock.now();
        let cutoff =
            now - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());

        let executions = self.execution_store.list_since(cutoff).await?;
        let completed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count();
        let failed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .count();
        let rolled_back = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::RolledBack)
            .count();

        let attempts = completed + failed;
        let rotation_success_rate = if attempts == 0 {
            0.0
        } else {
            completed as f64 / attempts as f64
        };

        let durations: Vec<u64> = executions
            .iter()
            .filter(|e| e.status.is_terminal())
            .filter_map(|e| e.duration_ms)
            .collect();
        let average_rotation_duration_minutes = if durations.is_empty() {
            0.0
        } else {
            let total_ms: u64 = durations.iter().sum();
            total_ms as f64 / durations.len() as f64 / 60_000.0
        };

        let active = self.config_store.list_active().await?;
        let overdue_rotations = active.iter().filter(|c| c.is_overdue(now)).count();
        let compliance_score = if active.is_empty() {
            // Vacuously compliant: nothing is managed, nothing is overdue.
            100.0
        } else {
            let within = active.len() - overdue_rotations;
            within as f64 / active.len() as f64 * 100.0
        };

        Ok(RotationHealthReport {
            total_executions: executions.len(),
            completed,
            failed,
            rolled_back,
            rotation_success_rate,
            overdue_rotations,
            compliance_score,
            average_rotation_duration_minutes,
        })
    }
}
