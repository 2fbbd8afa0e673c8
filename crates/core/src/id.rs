//! Identifier types with validation
//!
//! Provides a validated [`SecretId`] newtype that prevents path traversal
//! and injection through strict character rules, plus UUID-backed ids for
//! execution, emergency-request, and audit records.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length for secret IDs (prevents abuse via oversized keys)
const MAX_ID_LENGTH: usize = 255;

/// Unique secret configuration identifier (validated)
///
/// Only allows alphanumeric characters, hyphens, and underscores so ids are
/// safe to use as storage paths and log fields.
///
/// # Examples
///
/// ```
/// use keywheel_core::SecretId;
///
/// let id = SecretId::new("webhook-signing-secret").unwrap();
/// assert_eq!(id.as_str(), "webhook-signing-secret");
///
/// assert!(SecretId::new("").is_err());
/// assert!(SecretId::new("../etc/passwd").is_err());
/// assert!(SecretId::new("id with spaces").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretId(String);

impl SecretId {
    /// Creates a new validated secret ID
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptySecretId`] for an empty string, and
    /// [`ValidationError::InvalidSecretId`] when the id exceeds 255
    /// characters or contains anything other than alphanumerics, hyphens,
    /// or underscores.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();

        if id.is_empty() {
            return Err(ValidationError::EmptySecretId);
        }

        if id.len() > MAX_ID_LENGTH {
            return Err(ValidationError::InvalidSecretId {
                id,
                reason: format!("exceeds maximum length of {MAX_ID_LENGTH} characters"),
            });
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidSecretId {
                id,
                reason: "only alphanumeric characters, hyphens, and underscores are allowed"
                    .to_string(),
            });
        }

        Ok(Self(id))
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SecretId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SecretId> for String {
    fn from(id: SecretId) -> Self {
        id.0
    }
}

impl AsRef<str> for SecretId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a rotation execution
    ExecutionId
}

uuid_id! {
    /// Unique identifier for an emergency rotation request
    RequestId
}

uuid_id! {
    /// Unique identifier for an audit log entry
    AuditEntryId
}
