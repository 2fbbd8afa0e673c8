//! Data model for the rotation engine
//!
//! - [`config`] - per-secret configuration and rotation policy
//! - [`execution`] - per-attempt execution record with step history
//! - [`emergency`] - emergency gate requests
//! - [`policy`] - cross-cutting named rule sets
//! - [`status`] - the execution lifecycle state machine

pub mod config;
pub mod emergency;
pub mod execution;
pub mod policy;
pub mod status;

pub use config::{
    RotationFrequency, RotationPolicyConfig, SecretConfiguration, SecretType, ServiceDependency,
    StorageLocation, UpdateMethod, ValidationSpec,
};
pub use emergency::{EmergencyReason, EmergencyRotationRequest, RequestStatus, Urgency};
pub use execution::{
    RollbackInfo, RotationStep, SecretMetadata, SecretRotationExecution, StepStatus, TriggerType,
    ValidationResults, STEP_NAMES,
};
pub use policy::SecretRotationPolicy;
pub use status::ExecutionStatus;
