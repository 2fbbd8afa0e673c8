//! Append-only audit log
//!
//! Every state transition, access event, and rollback is appended here.
//! Entries are ordered by local logical time within a single execution;
//! no global ordering across configurations is guaranteed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keywheel_core::{AuditEntryId, ExecutionId, SecretId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::RotationResult;

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub at: DateTime<Utc>,
    pub secret_id: SecretId,
    pub execution_id: Option<ExecutionId>,

    /// Who performed the action ("scheduler", "emergency-gate", operator id)
    pub actor: String,

    /// What happened (e.g. "status: deploying -> verifying")
    pub action: String,

    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn new(
        secret_id: SecretId,
        execution_id: Option<ExecutionId>,
        actor: impl Into<String>,
        action: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            at,
            secret_id,
            execution_id,
            actor: actor.into(),
            action: action.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Append-only audit sink
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one entry; entries are never mutated or removed
    async fn append(&self, entry: AuditEntry) -> RotationResult<()>;

    /// Entries for one execution, in append order
    async fn entries_for_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> RotationResult<Vec<AuditEntry>>;
}

/// In-memory audit log
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries (test observability)
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> RotationResult<()> {
        self.entries.write().push(entry);
        Ok(())
    }

    async fn entries_for_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> RotationResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.execution_id.as_ref() == Some(execution_id))
            .cloned()
            .collect())
    }
}
