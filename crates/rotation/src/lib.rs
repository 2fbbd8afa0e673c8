//! Secrets rotation engine
//!
//! Automates the credential rotation lifecycle: scheduling by age policy,
//! multi-step execution with verification, an emergency path with an
//! approval gate, dual-accept grace windows, explicit rollback, and an
//! append-only audit trail.
//!
//! # Architecture
//!
//! - [`RotationExecutor`] runs the five-step protocol for one secret and
//!   owns dual-accept completion and rollback
//! - [`RotationScheduler`] finds overdue configurations and starts
//!   rotations under a concurrency ceiling
//! - [`EmergencyGate`] fronts out-of-band rotations with approval state
//! - [`HealthAggregator`] produces read-only fleet health reports
//!
//! Persistence ([`store`]), the live secret backend ([`storage`]), and
//! dependent-service probing ([`probe`]) are trait seams with in-memory
//! and HTTP implementations.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use keywheel_core::SecretId;
//! use keywheel_rotation::{
//!     HttpProbe, MemorySecretStorage, MemoryStore, RotateOptions, RotationExecutor,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let executor = RotationExecutor::builder()
//!     .config_store(store.clone())
//!     .execution_store(store.clone())
//!     .secret_storage(Arc::new(MemorySecretStorage::new()))
//!     .probe(Arc::new(HttpProbe::new(Duration::from_secs(10))))
//!     .build()?;
//!
//! let secret_id = SecretId::new("webhook-signing-secret")?;
//! let execution_id = executor
//!     .rotate(&secret_id, RotateOptions::manual("key rotation drill", "ops"))
//!     .await?;
//! # let _ = execution_id;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod clock;
pub mod emergency;
pub mod error;
pub mod events;
pub mod executor;
pub mod generator;
pub mod metrics;
pub mod model;
pub mod probe;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use audit::{AuditEntry, AuditLog, MemoryAuditLog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use emergency::{EmergencyGate, EmergencyOptions};
pub use error::{RotationError, RotationResult};
pub use events::{Notifier, RotationEvent, TracingNotifier};
pub use executor::{ExecutorConfig, RotateOptions, RotationExecutor, RotationExecutorBuilder};
pub use generator::{GeneratedSecret, SecretGenerator};
pub use metrics::{HealthAggregator, RotationHealthReport};
pub use model::{
    EmergencyReason, EmergencyRotationRequest, ExecutionStatus, RequestStatus, RollbackInfo,
    RotationFrequency, RotationPolicyConfig, RotationStep, SecretConfiguration, SecretMetadata,
    SecretRotationExecution, SecretRotationPolicy, SecretType, ServiceDependency, StepStatus,
    StorageLocation, TriggerType, UpdateMethod, Urgency, ValidationResults, ValidationSpec,
};
pub use probe::{DependencyProbe, HttpProbe, StaticProbe};
pub use scheduler::{CycleReport, DueSecret, RotationScheduler, SchedulerConfig};
pub use storage::{MemorySecretStorage, SecretStorage};
pub use store::{ConfigStore, ExecutionStore, MemoryStore, RequestStore};
