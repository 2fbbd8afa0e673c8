//! Dependent-service probes
//!
//! Applies a dependency's update method and polls its health check, and
//! runs a configuration's functional validation endpoint. Every network
//! call carries a bounded timeout; a timeout counts as that step's
//! failure, never an indefinite hang.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::{RotationError, RotationResult};
use crate::model::{ServiceDependency, UpdateMethod, ValidationSpec};

/// Probe contract for dependent services and functional validation
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Deliver the new value to one dependent service
    async fn apply_update(&self, dependency: &ServiceDependency) -> RotationResult<()>;

    /// Poll the dependency's health check; `Err` means unhealthy
    async fn check_health(&self, dependency: &ServiceDependency) -> RotationResult<()>;

    /// Exercise the configuration's functional validation endpoint
    async fn functional_check(&self, spec: &ValidationSpec) -> RotationResult<()>;
}

/// HTTP probe with a bounded per-call timeout
///
/// Any non-2xx response (other than the declared expected status for
/// functional checks) or timeout is treated as unhealthy.
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe; `timeout` bounds every outbound call (5-15s
    /// recommended)
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl DependencyProbe for HttpProbe {
    async fn apply_update(&self, dependency: &ServiceDependency) -> RotationResult<()> {
        // Delivery mechanics belong to the consuming service; the engine
        // records which method applies and verifies via health checks.
        match dependency.update_method {
            UpdateMethod::Manual => {
                warn!(
                    service = %dependency.service,
                    "Dependency requires manual credential update"
                );
            }
            method => {
                info!(
                    service = %dependency.service,
                    update_method = ?method,
                    restart_required = dependency.restart_required,
                    "Applying credential update to dependent service"
                );
            }
        }
        Ok(())
    }

    async fn check_health(&self, dependency: &ServiceDependency) -> RotationResult<()> {
        let Some(url) = dependency.health_check.as_deref() else {
            // No probe configured: nothing to verify for this dependency.
            return Ok(());
        };

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RotationError::DependencyUnhealthy {
                service: dependency.service.clone(),
                reason: format!("health check request failed: {e}"),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RotationError::DependencyUnhealthy {
                service: dependency.service.clone(),
                reason: format!("health check returned {}", response.status()),
            })
        }
    }

    async fn functional_check(&self, spec: &ValidationSpec) -> RotationResult<()> {
        let method = reqwest::Method::from_bytes(spec.method.as_bytes()).map_err(|_| {
            RotationError::InvalidConfiguration {
                reason: format!("invalid validation method '{}'", spec.method),
            }
        })?;

        let response = self
            .client
            .request(method, &spec.endpoint)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RotationError::DependencyUnhealthy {
                service: spec.endpoint.clone(),
                reason: format!("validation request failed: {e}"),
            })?;

        if response.status().as_u16() == spec.expected_status {
            Ok(())
        } else {
            Err(RotationError::DependencyUnhealthy {
                service: spec.endpoint.clone(),
                reason: format!(
                    "validation returned {} (expected {})",
                    response.status(),
                    spec.expected_status
                ),
            })
        }
    }
}

/// Scripted probe for tests
///
/// Services and endpoints are healthy unless explicitly marked otherwise.
#[derive(Default)]
pub struct StaticProbe {
    unhealthy: RwLock<HashMap<String, String>>,
    fail_functional: RwLock<Option<String>>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a service to fail its health check
    pub fn mark_unhealthy(&self, service: impl Into<String>, reason: impl Into<String>) {
        self.unhealthy.write().insert(service.into(), reason.into());
    }

    /// Script the functional validation endpoint to fail
    pub fn fail_functional_check(&self, reason: impl Into<String>) {
        *self.fail_functional.write() = Some(reason.into());
    }
}

#[async_trait]
impl DependencyProbe for StaticProbe {
    async fn apply_update(&self, _dependency: &ServiceDependency) -> RotationResult<()> {
        Ok(())
    }

    async fn check_health(&self, dependency: &ServiceDependency) -> RotationResult<()> {
        match self.unhealthy.read().get(&dependency.service) {
            Some(reason) => Err(RotationError::DependencyUnhealthy {
                service: dependency.service.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn functional_check(&self, spec: &ValidationSpec) -> RotationResult<()> {
        match self.fail_functional.read().as_ref() {
            Some(reason) => Err(RotationError::DependencyUnhealthy {
                service: spec.endpoint.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}
