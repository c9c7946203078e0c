//! Device registry
//!
//! Set of supervised cameras keyed by endpoint key. Entries are only ever
//! added; a camera that disappears stays registered and its supervisor keeps
//! retrying.

use crate::camera::{CameraControl, Endpoint};
use crate::supervisor::{Supervisor, SupervisorSettings};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct DeviceRegistry {
    settings: SupervisorSettings,
    devices: RwLock<BTreeMap<String, Arc<Supervisor>>>,
}

impl DeviceRegistry {
    pub fn new(settings: SupervisorSettings) -> Self {
        Self {
            settings,
            devices: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a supervisor for `endpoint` unless one already exists.
    ///
    /// `make_control` is only called for new endpoints. Returns the supervisor
    /// and whether it was newly created.
    pub async fn register_if_absent<F>(
        &self,
        endpoint: Endpoint,
        make_control: F,
    ) -> (Arc<Supervisor>, bool)
    where
        F: FnOnce() -> Arc<dyn CameraControl>,
    {
        let mut devices = self.devices.write().await;
        if let Some(existing) = devices.get(&endpoint.key) {
            return (existing.clone(), false);
        }

        log::info!("Registering camera {}", endpoint);
        let key = endpoint.key.clone();
        let supervisor = Arc::new(Supervisor::new(endpoint, make_control(), self.settings));
        devices.insert(key, supervisor.clone());
        (supervisor, true)
    }

    /// All supervisors, ordered by endpoint key
    pub async fn snapshot(&self) -> Vec<Arc<Supervisor>> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.devices.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}
