//! Control hub
//!
//! Owns the operator's desired-recording flag and builds the aggregated status
//! served to the control surface.

use crate::registry::DeviceRegistry;
use crate::supervisor::DeviceStatus;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// One camera as seen by the control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraView {
    pub connected: bool,
    pub rec: Option<bool>,
    /// Remaining capacity in whole seconds
    pub remaining: Option<u64>,
}

impl From<&DeviceStatus> for CameraView {
    fn from(status: &DeviceStatus) -> Self {
        Self {
            connected: status.connected,
            rec: status.state.recording.known(),
            remaining: status.state.remaining.known().map(|d| d.as_secs()),
        }
    }
}

/// Body of `GET /get_state`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedStatus {
    pub should_record: bool,
    pub cameras: BTreeMap<String, CameraView>,
}

pub struct ControlHub {
    desired: watch::Sender<bool>,
    registry: Arc<DeviceRegistry>,
}

impl ControlHub {
    /// Recording is not desired until the operator asks for it.
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        let (desired, _) = watch::channel(false);
        Self { desired, registry }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn set_desired(&self, should_record: bool) {
        let previous = self.desired.send_replace(should_record);
        if previous != should_record {
            log::info!("Desired recording state set to {}", should_record);
        }
    }

    pub fn desired(&self) -> bool {
        *self.desired.borrow()
    }

    /// Receiver handed to each supervisor
    pub fn subscribe_desired(&self) -> watch::Receiver<bool> {
        self.desired.subscribe()
    }

    /// Status of every registered camera keyed by display name.
    ///
    /// Reads each supervisor's last published status, never the camera itself.
    /// When two cameras report the same name, the later one (by endpoint key)
    /// gets its key appended, plus a counter if that is taken as well. No
    /// camera is ever dropped from the map.
    pub async fn aggregated_status(&self) -> AggregatedStatus {
        let mut cameras = BTreeMap::new();
        for supervisor in self.registry.snapshot().await {
            let status = supervisor.status();
            let key = &supervisor.endpoint().key;
            let mut name = status.name.clone();
            let mut suffix = 1;
            while cameras.contains_key(&name) {
                name = if suffix == 1 {
                    format!("{} [{}]", status.name, key)
                } else {
                    format!("{} [{} #{}]", status.name, key, suffix)
                };
                suffix += 1;
            }
            cameras.insert(name, CameraView::from(&status));
        }

        AggregatedStatus {
            should_record: self.desired(),
            cameras,
        }
    }
}
