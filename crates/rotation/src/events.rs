//! Rotation lifecycle events
//!
//! Structured events emitted to an external sink. Delivery failures are
//! logged and swallowed - a notification must never fail the rotation
//! that produced it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keywheel_core::{ExecutionId, SecretId};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::RotationResult;

/// Event emitted at key points of the rotation lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RotationEvent {
    /// A rotation execution started
    RotationStarted {
        secret_id: SecretId,
        execution_id: ExecutionId,
        at: DateTime<Utc>,
    },

    /// An execution reached `completed`
    RotationCompleted {
        secret_id: SecretId,
        execution_id: ExecutionId,
        at: DateTime<Utc>,
        duration_ms: u64,
    },

    /// An execution reached `failed`
    RotationFailed {
        secret_id: SecretId,
        execution_id: ExecutionId,
        at: DateTime<Utc>,
        error: String,
    },

    /// A policy or rollback-safety violation needing operator attention
    ComplianceViolation {
        secret_id: SecretId,
        at: DateTime<Utc>,
        detail: String,
    },

    /// The scheduler skipped due rotations because the ceiling was reached
    BackpressureSkip {
        at: DateTime<Utc>,
        due_count: usize,
        skipped_count: usize,
        current_load: usize,
    },
}

impl RotationEvent {
    /// Human-readable event summary
    pub fn description(&self) -> String {
        match self {
            Self::RotationStarted {
                secret_id,
                execution_id,
                ..
            } => format!("Rotation started for secret {secret_id} (execution {execution_id})"),
            Self::RotationCompleted {
                secret_id,
                duration_ms,
                ..
            } => format!("Rotation completed for secret {secret_id} in {duration_ms}ms"),
            Self::RotationFailed {
                secret_id, error, ..
            } => format!("Rotation failed for secret {secret_id}: {error}"),
            Self::ComplianceViolation {
                secret_id, detail, ..
            } => format!("Compliance violation for secret {secret_id}: {detail}"),
            Self::BackpressureSkip {
                due_count,
                skipped_count,
                current_load,
                ..
            } => format!(
                "Backpressure: skipped {skipped_count} of {due_count} due rotations (load {current_load})"
            ),
        }
    }
}

/// Sink for rotation events
///
/// Implement for chat webhooks, pager integrations, event buses, or
/// logging. The engine calls [`notify`](Notifier::notify) through
/// [`emit_event`], which never lets a delivery failure escape.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event
    async fn notify(&self, event: &RotationEvent) -> RotationResult<()>;
}

/// Default notifier: structured log lines, no external delivery
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &RotationEvent) -> RotationResult<()> {
        match event {
            RotationEvent::RotationFailed { .. } | RotationEvent::ComplianceViolation { .. } => {
                warn!(event = %event.description(), "rotation event");
            }
            _ => info!(event = %event.description(), "rotation event"),
        }
        Ok(())
    }
}

/// Emit an event, logging (never propagating) delivery failures
pub async fn emit_event(notifier: &dyn Notifier, event: RotationEvent) {
    if let Err(e) = notifier.notify(&event).await {
        error!(
            error = %e,
            event = %event.description(),
            "Event delivery failed; continuing"
        );
    }
}
