//! Secret storage backend seam
//!
//! The engine never interprets the storage medium; it only writes a new
//! value during the deploy step and reads/writes during rollback, through
//! this opaque contract.

use std::collections::HashMap;

use async_trait::async_trait;
use keywheel_core::SecretString;
use parking_lot::RwLock;

use crate::error::{RotationError, RotationResult};

/// Opaque write/read contract for the live secret value
#[async_trait]
pub trait SecretStorage: Send + Sync {
    /// Write a value to a storage path
    async fn write(&self, path: &str, value: &SecretString) -> RotationResult<()>;

    /// Read the value at a storage path
    async fn read(&self, path: &str) -> RotationResult<Option<SecretString>>;
}

/// In-memory secret storage with failure injection for tests
#[derive(Default)]
pub struct MemorySecretStorage {
    values: RwLock<HashMap<String, SecretString>>,
    fail_writes: RwLock<bool>,
}

impl MemorySecretStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (simulates a broken backend)
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    /// Seed a path with an existing value
    pub fn seed(&self, path: impl Into<String>, value: SecretString) {
        self.values.write().insert(path.into(), value);
    }
}

#[async_trait]
impl SecretStorage for MemorySecretStorage {
    async fn write(&self, path: &str, value: &SecretString) -> RotationResult<()> {
        if *self.fail_writes.read() {
            return Err(RotationError::Deployment {
                path: path.to_string(),
                reason: "storage backend unavailable".to_string(),
            });
        }
        self.values.write().insert(path.to_string(), value.clone());
        Ok(())
    }

    async fn read(&self, path: &str) -> RotationResult<Option<SecretString>> {
        Ok(self.values.read().get(path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let storage = MemorySecretStorage::new();
        storage
            .write("kv/app/key", &SecretString::new("v1"))
            .await
            .unwrap();

        let value = storage.read("kv/app/key").await.unwrap().unwrap();
        assert_eq!(value.expose_secret(str::to_owned), "v1");
        assert!(storage.read("kv/app/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_deployment_error() {
        let storage = MemorySecretStorage::new();
        storage.set_fail_writes(true);

        let err = storage
            .write("kv/app/key", &SecretString::new("v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RotationError::Deployment { .. }));
    }
}
