//! Shared test harness
//!
//! Wires the executor and its collaborators against in-memory stores, a
//! scripted probe, and a manually advanced clock.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use keywheel_core::{SecretId, SecretString};
use keywheel_rotation::{
    AuditLog, Clock, ManualClock, MemoryAuditLog, MemorySecretStorage, MemoryStore, Notifier,
    RotationEvent, RotationExecutor, RotationFrequency, RotationPolicyConfig, RotationResult,
    SecretConfiguration, SecretType, ServiceDependency, StaticProbe, StorageLocation,
    UpdateMethod,
};
use parking_lot::Mutex;

/// Notifier that records every delivered event
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<RotationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RotationEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &RotationEvent) -> RotationResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemorySecretStorage>,
    pub probe: Arc<StaticProbe>,
    pub audit: Arc<MemoryAuditLog>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: ManualClock,
    pub executor: Arc<RotationExecutor>,
}

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MemorySecretStorage::new());
        let probe = Arc::new(StaticProbe::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = ManualClock::new(Utc::now());

        let executor = Arc::new(
            RotationExecutor::builder()
                .config_store(store.clone())
                .execution_store(store.clone())
                .secret_storage(storage.clone())
                .probe(probe.clone())
                .audit(audit.clone() as Arc<dyn AuditLog>)
                .notifier(notifier.clone() as Arc<dyn Notifier>)
                .clock(Arc::new(clock.clone()) as Arc<dyn Clock>)
                .build()
                .expect("executor wiring"),
        );

        Self {
            store,
            storage,
            probe,
            audit,
            notifier,
            clock,
            executor,
        }
    }

    /// Register an active, 31-day-old configuration (30-day threshold, so
    /// it is already overdue) and seed its storage path with an old value.
    pub async fn add_config(&self, id: &str, grace_period_hours: u32) -> SecretId {
        let secret_id = SecretId::new(id).expect("valid id");
        let now = self.clock.now();

        let policy = RotationPolicyConfig::new(
            RotationFrequency::Monthly,
            Some(30),
            grace_period_hours,
            true,
            false,
        )
        .expect("valid policy");

        let config = SecretConfiguration::new(
            secret_id.clone(),
            format!("Configuration {id}"),
            SecretType::WebhookSecret,
            StorageLocation {
                kind: "vault".to_string(),
                path: storage_path(id),
                encrypted: true,
            },
            policy,
            now - chrono::Duration::days(31),
        );
        self.put_config(config).await;

        self.storage
            .seed(storage_path(id), SecretString::new(old_value(id)));
        secret_id
    }

    pub async fn put_config(&self, config: SecretConfiguration) {
        use keywheel_rotation::ConfigStore as _;
        self.store.put(config).await.expect("store config");
    }

    pub async fn config(&self, id: &SecretId) -> SecretConfiguration {
        use keywheel_rotation::ConfigStore as _;
        self.store
            .get(id)
            .await
            .expect("store get")
            .expect("config exists")
    }

    /// Current plaintext at the configuration's storage path
    pub async fn stored_value(&self, id: &str) -> String {
        use keywheel_rotation::SecretStorage as _;
        self.storage
            .read(&storage_path(id))
            .await
            .expect("storage read")
            .expect("value present")
            .expose_secret(str::to_owned)
    }
}

pub fn storage_path(id: &str) -> String {
    format!("kv/app/{id}")
}

pub fn old_value(id: &str) -> String {
    format!("old-value-of-{id}")
}

pub fn dependency(service: &str) -> ServiceDependency {
    ServiceDependency {
        service: service.to_string(),
        health_check: None,
        restart_required: false,
        update_method: UpdateMethod::ApiCall,
    }
}
