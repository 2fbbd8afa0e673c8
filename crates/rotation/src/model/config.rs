//! Secret configuration model
//!
//! One [`SecretConfiguration`] per managed credential: what kind of secret
//! it is, where the live value lives, how often it rotates, which services
//! depend on it, and how to functionally validate a new value.

use std::time::Duration;

use chrono::{DateTime, Utc};
use keywheel_core::SecretId;
use serde::{Deserialize, Serialize};

use crate::error::{RotationError, RotationResult};

/// Kind of managed credential
///
/// Determines the generation strategy and default strength target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    ApiKey,
    DatabasePassword,
    EncryptionKey,
    Certificate,
    OauthToken,
    WebhookSecret,
}

/// Where the live secret value is read from
///
/// Opaque to the rotation logic; only the deploy step and rollback touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Backend kind (e.g. "vault", "env", "file")
    pub kind: String,

    /// Path within the backend
    pub path: String,

    /// Whether the backend stores the value encrypted at rest
    pub encrypted: bool,
}

/// Rotation frequency class
///
/// Supplies a default maximum age; an explicit `max_age_days` on the policy
/// overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Custom,
}

impl RotationFrequency {
    /// Default maximum age for the class
    pub fn default_max_age_days(self) -> u32 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Quarterly => 90,
            Self::Custom => 90,
        }
    }
}

/// Per-secret rotation policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicyConfig {
    /// Frequency class supplying the default age threshold
    pub frequency: RotationFrequency,

    /// Maximum age before the secret is due (overrides the class default)
    pub max_age_days: Option<u32>,

    /// Dual-accept window length; 0 disables the window
    pub grace_period_hours: u32,

    /// Whether the scheduler may rotate this secret on its own
    pub auto_rotate: bool,

    /// Whether emergency rotation needs an approval step
    pub require_approval: bool,
}

impl RotationPolicyConfig {
    /// Create a validated policy
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::InvalidConfiguration`] when `max_age_days`
    /// is zero or the grace period exceeds the maximum age.
    pub fn new(
        frequency: RotationFrequency,
        max_age_days: Option<u32>,
        grace_period_hours: u32,
        auto_rotate: bool,
        require_approval: bool,
    ) -> RotationResult<Self> {
        let policy = Self {
            frequency,
            max_age_days,
            grace_period_hours,
            auto_rotate,
            require_approval,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Validate policy invariants
    pub fn validate(&self) -> RotationResult<()> {
        if self.max_age_days == Some(0) {
            return Err(RotationError::InvalidConfiguration {
                reason: "max_age_days must be positive".to_string(),
            });
        }

        let max_age_hours = u64::from(self.effective_max_age_days()) * 24;
        if u64::from(self.grace_period_hours) > max_age_hours {
            return Err(RotationError::InvalidConfiguration {
                reason: format!(
                    "grace period ({}h) cannot exceed maximum age ({}h)",
                    self.grace_period_hours, max_age_hours
                ),
            });
        }

        Ok(())
    }

    /// Age threshold after which the secret is due
    pub fn effective_max_age_days(&self) -> u32 {
        self.max_age_days
            .unwrap_or_else(|| self.frequency.default_max_age_days())
    }

    /// Dual-accept window as a duration
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.grace_period_hours) * 3600)
    }
}

/// How a dependent service picks up the new value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMethod {
    ApiCall,
    ConfigReload,
    ServiceRestart,
    Manual,
}

/// A service that consumes the secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDependency {
    /// Service identifier
    pub service: String,

    /// Health-check URL polled after the update is applied
    pub health_check: Option<String>,

    /// Whether the service must be restarted to pick up the new value
    pub restart_required: bool,

    /// How the new value is delivered to the service
    pub update_method: UpdateMethod,
}

/// Functional test descriptor for end-to-end validation of the new value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSpec {
    /// Endpoint exercised with the live secret
    pub endpoint: String,

    /// HTTP method
    pub method: String,

    /// Expected response status
    pub expected_status: u16,
}

/// Configuration for one managed secret
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfiguration {
    /// Stable identifier
    pub id: SecretId,

    /// Human-readable name
    pub name: String,

    /// Free-text description
    pub description: Option<String>,

    /// Kind of credential; drives generation
    pub secret_type: SecretType,

    /// Where the live value is stored
    pub storage_location: StorageLocation,

    /// When and how the secret rotates
    pub rotation_policy: RotationPolicyConfig,

    /// Dependent services, in update order
    pub dependencies: Vec<ServiceDependency>,

    /// Optional functional validation contract
    pub validation: Option<ValidationSpec>,

    /// Soft-disable flag; inactive configurations are never rotated
    pub active: bool,

    /// Completion time of the last successful rotation
    pub last_rotated_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretConfiguration {
    /// Create an active configuration with no dependents or validation
    pub fn new(
        id: SecretId,
        name: impl Into<String>,
        secret_type: SecretType,
        storage_location: StorageLocation,
        rotation_policy: RotationPolicyConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            secret_type,
            storage_location,
            rotation_policy,
            dependencies: Vec::new(),
            validation: None,
            active: true,
            last_rotated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Age since the last successful rotation (falls back to creation time)
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_rotated_at.unwrap_or(self.created_at)
    }

    /// Whether the secret has exceeded its policy age threshold
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        let threshold =
            chrono::Duration::days(i64::from(self.rotation_policy.effective_max_age_days()));
        self.age(now) >= threshold
    }

    /// How far past the threshold the secret is (zero when not overdue)
    pub fn overdue_by(&self, now: DateTime<Utc>) -> chrono::Duration {
        let threshold =
            chrono::Duration::days(i64::from(self.rotation_policy.effective_max_age_days()));
        (self.age(now) - threshold).max(chrono::Duration::zero())
    }
}
