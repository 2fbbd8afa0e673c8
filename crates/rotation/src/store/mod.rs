//! Persistence seams
//!
//! The engine needs create/read/update of three record kinds plus simple
//! equality/range queries. No cross-record transactions are required beyond
//! the per-configuration active-execution lock, which [`ExecutionStore`]
//! owns as a create-if-absent marker.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keywheel_core::{ExecutionId, RequestId, SecretId};

use crate::error::RotationResult;
use crate::model::{EmergencyRotationRequest, SecretConfiguration, SecretRotationExecution};

pub use memory::MemoryStore;

/// Store for secret configurations
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch a configuration by id
    async fn get(&self, id: &SecretId) -> RotationResult<Option<SecretConfiguration>>;

    /// Create or replace a configuration
    async fn put(&self, config: SecretConfiguration) -> RotationResult<()>;

    /// All configurations with `active == true`
    async fn list_active(&self) -> RotationResult<Vec<SecretConfiguration>>;

    /// Stamp `last_rotated_at` after a successful rotation
    async fn record_rotation(&self, id: &SecretId, at: DateTime<Utc>) -> RotationResult<()>;
}

/// Store for rotation executions, including the per-configuration lock
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a new execution, acquiring the active-execution marker
    ///
    /// The marker is a create-if-absent write keyed by configuration id:
    /// the sole mutual-exclusion primitive the engine requires.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::RotationError::RotationInProgress`] when a
    /// non-terminal execution already exists for the configuration.
    async fn try_begin(&self, execution: SecretRotationExecution) -> RotationResult<()>;

    /// Persist an updated execution; releases the marker once terminal
    async fn update(&self, execution: SecretRotationExecution) -> RotationResult<()>;

    /// Fetch an execution by id
    async fn get(&self, id: &ExecutionId) -> RotationResult<Option<SecretRotationExecution>>;

    /// Executions whose status is not terminal, i.e. holding a slot
    async fn list_non_terminal(&self) -> RotationResult<Vec<SecretRotationExecution>>;

    /// Executions started at or after the cutoff, any status
    async fn list_since(&self, cutoff: DateTime<Utc>)
        -> RotationResult<Vec<SecretRotationExecution>>;

    /// All executions for one configuration, time-ordered
    async fn list_for_secret(
        &self,
        secret_id: &SecretId,
    ) -> RotationResult<Vec<SecretRotationExecution>>;
}

/// Store for emergency rotation requests
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a new request
    async fn insert(&self, request: EmergencyRotationRequest) -> RotationResult<()>;

    /// Persist an updated request
    async fn update(&self, request: EmergencyRotationRequest) -> RotationResult<()>;

    /// Fetch a request by id
    async fn get(&self, id: &RequestId) -> RotationResult<Option<EmergencyRotationRequest>>;
}
