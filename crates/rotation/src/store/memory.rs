//! In-memory store
//!
//! Single-process implementation of all three store traits, suitable for a
//! single-instance engine and for tests. The active-execution marker is a
//! `HashSet<SecretId>` entry inserted under the same write lock that
//! inserts the execution, which makes the lock acquisition atomic.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keywheel_core::{ExecutionId, RequestId, SecretId};
use parking_lot::RwLock;

use super::{ConfigStore, ExecutionStore, RequestStore};
use crate::error::{RotationError, RotationResult};
use crate::model::{EmergencyRotationRequest, SecretConfiguration, SecretRotationExecution};

/// In-memory configuration, execution, and request store
#[derive(Debug, Default)]
pub struct MemoryStore {
    configs: RwLock<HashMap<SecretId, SecretConfiguration>>,
    executions: RwLock<HashMap<ExecutionId, SecretRotationExecution>>,
    active_markers: RwLock<HashSet<SecretId>>,
    requests: RwLock<HashMap<RequestId, EmergencyRotationRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of held active-execution markers (test observability)
    pub fn active_marker_count(&self) -> usize {
        self.active_markers.read().len()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, id: &SecretId) -> RotationResult<Option<SecretConfiguration>> {
        Ok(self.configs.read().get(id).cloned())
    }

    async fn put(&self, config: SecretConfiguration) -> RotationResult<()> {
        self.configs.write().insert(config.id.clone(), config);
        Ok(())
    }

    async fn list_active(&self) -> RotationResult<Vec<SecretConfiguration>> {
        Ok(self
            .configs
            .read()
            .values()
            .filter(|c| c.active)
            .cloned()
            .collect())
    }

    async fn record_rotation(&self, id: &SecretId, at: DateTime<Utc>) -> RotationResult<()> {
        let mut configs = self.configs.write();
        let config = configs.get_mut(id).ok_or_else(|| {
            RotationError::ConfigurationNotFound {
                secret_id: id.clone(),
            }
        })?;
        config.last_rotated_at = Some(at);
        config.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn try_begin(&self, execution: SecretRotationExecution) -> RotationResult<()> {
        // Marker insert and execution insert happen under one write lock so
        // two concurrent rotate() calls cannot both pass the gate.
        let mut markers = self.active_markers.write();
        if !markers.insert(execution.secret_id.clone()) {
            return Err(RotationError::RotationInProgress {
                secret_id: execution.secret_id.clone(),
            });
        }
        self.executions.write().insert(execution.id, execution);
        Ok(())
    }

    async fn update(&self, execution: SecretRotationExecution) -> RotationResult<()> {
        if execution.status.is_terminal() {
            self.active_markers.write().remove(&execution.secret_id);
        }
        self.executions.write().insert(execution.id, execution);
        Ok(())
    }

    async fn get(&self, id: &ExecutionId) -> RotationResult<Option<SecretRotationExecution>> {
        Ok(self.executions.read().get(id).cloned())
    }

    async fn list_non_terminal(&self) -> RotationResult<Vec<SecretRotationExecution>> {
        Ok(self
            .executions
            .read()
            .values()
            .filter(|e| !e.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn list_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RotationResult<Vec<SecretRotationExecution>> {
        Ok(self
            .executions
            .read()
            .values()
            .filter(|e| e.started_at >= cutoff)
            .cloned()
            .collect())
    }

    async fn list_for_secret(
        &self,
        secret_id: &SecretId,
    ) -> RotationResult<Vec<SecretRotationExecution>> {
        let mut executions: Vec<_> = self
            .executions
            .read()
            .values()
            .filter(|e| &e.secret_id == secret_id)
            .cloned()
            .collect();
        executions.sort_by_key(|e| e.started_at);
        Ok(executions)
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert(&self, request: EmergencyRotationRequest) -> RotationResult<()> {
        self.requests.write().insert(request.id, request);
        Ok(())
    }

    async fn update(&self, request: EmergencyRotationRequest) -> RotationResult<()> {
        self.requests.write().insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: &RequestId) -> RotationResult<Option<EmergencyRotationRequest>> {
        Ok(self.requests.read().get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionStatus, TriggerType};

    fn execution(secret: &str) -> SecretRotationExecution {
        SecretRotationExecution::new(
            SecretId::new(secret).unwrap(),
            TriggerType::Manual,
            "test",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn second_begin_for_same_secret_is_rejected() {
        let store = MemoryStore::new();

        store.try_begin(execution("db-password")).await.unwrap();

        let err = store.try_begin(execution("db-password")).await.unwrap_err();
        assert!(matches!(err, RotationError::RotationInProgress { .. }));

        // A different secret is unaffected.
        store.try_begin(execution("api-key")).await.unwrap();
        assert_eq!(store.active_marker_count(), 2);
    }

    #[tokio::test]
    async fn terminal_update_releases_marker() {
        let store = MemoryStore::new();
        let mut exec = execution("db-password");
        store.try_begin(exec.clone()).await.unwrap();

        let now = Utc::now();
        exec.transition_to(ExecutionStatus::Failed, now).unwrap();
        ExecutionStore::update(&store, exec).await.unwrap();

        assert_eq!(store.active_marker_count(), 0);
        store.try_begin(execution("db-password")).await.unwrap();
    }

    #[tokio::test]
    async fn list_for_secret_is_time_ordered() {
        let store = MemoryStore::new();
        let mut first = execution("api-key");
        first.started_at = Utc::now() - chrono::Duration::hours(2);
        let mut second = execution("api-key");
        second.started_at = Utc::now() - chrono::Duration::hours(1);

        // Insert out of order; both must be terminal to release markers.
        store.try_begin(second.clone()).await.unwrap();
        second
            .transition_to(ExecutionStatus::Failed, Utc::now())
            .unwrap();
        ExecutionStore::update(&store, second.clone()).await.unwrap();
        store.try_begin(first.clone()).await.unwrap();

        let listed = store
            .list_for_secret(&SecretId::new("api-key").unwrap())
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }
}
