//! Cross-cutting rotation rule sets
//!
//! Named policies applied to classes of configuration by type and
//! environment. Descriptive metadata consumed by the scheduler and the
//! approval gate; the data model does not enforce them.

use serde::{Deserialize, Serialize};

use super::config::{SecretConfiguration, SecretType};

/// Named rule set for a class of secrets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRotationPolicy {
    /// Policy name (e.g. "pci-production")
    pub name: String,

    /// Secret types the policy applies to; empty means all
    pub applies_to_types: Vec<SecretType>,

    /// Environments the policy applies to; empty means all
    pub applies_to_environments: Vec<String>,

    /// Maximum permitted age for matching secrets
    pub max_age_days: u32,

    /// Minimum spacing between rotations of the same secret
    pub min_rotation_interval_hours: u32,

    /// Types whose emergency rotation needs an approval step
    pub require_approval_for: Vec<SecretType>,

    /// Whether emergency rotation is permitted at all
    pub allow_emergency: bool,

    /// Notify this many days before a matching secret becomes overdue
    pub notify_before_expiry_days: u32,
}

impl SecretRotationPolicy {
    /// Whether this policy covers the given configuration
    pub fn applies_to(&self, config: &SecretConfiguration) -> bool {
        self.applies_to_types.is_empty() || self.applies_to_types.contains(&config.secret_type)
    }

    /// Whether the type needs approval for emergency rotation under this policy
    pub fn requires_approval(&self, secret_type: SecretType) -> bool {
        self.require_approval_for.contains(&secret_type)
    }
}
