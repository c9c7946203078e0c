//! Per-camera supervisor
//!
//! One task per camera owns the connection and serializes every command to
//! it. The loop runs `Disconnected -> Connecting -> Polling` and falls back to
//! `Disconnected` on any failure, forever, until shutdown.

use crate::camera::{CameraControl, CameraError, CameraSession, CameraState, Endpoint};
use crate::policy::{evaluate, Action, PolicyThresholds, WatchdogMemory};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Timing and policy knobs shared by every supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Poll interval while connected
    pub tick: Duration,
    /// Wait before reconnecting after a failure
    pub backoff: Duration,
    /// Upper bound for a single camera call
    pub request_timeout: Duration,
    pub thresholds: PolicyThresholds,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            backoff: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            thresholds: PolicyThresholds::default(),
        }
    }
}

impl From<&crate::config::Config> for SupervisorSettings {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            tick: Duration::from_millis(config.supervisor.tick_ms),
            backoff: Duration::from_millis(config.supervisor.backoff_ms),
            request_timeout: Duration::from_millis(config.supervisor.request_timeout_ms),
            thresholds: config.policy.thresholds(),
        }
    }
}

/// Snapshot published by a supervisor after every tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Display name reported by the camera, or the endpoint key before the
    /// first successful connection
    pub name: String,
    pub connected: bool,
    /// Telemetry of the last completed tick; all unknown while disconnected
    pub state: CameraState,
}

/// How a connected session ended
enum SessionEnd {
    Shutdown,
    Failed(CameraError),
}

pub struct Supervisor {
    endpoint: Endpoint,
    control: Arc<dyn CameraControl>,
    settings: SupervisorSettings,
    status: watch::Sender<DeviceStatus>,
    spawned: AtomicBool,
}

impl Supervisor {
    pub fn new(
        endpoint: Endpoint,
        control: Arc<dyn CameraControl>,
        settings: SupervisorSettings,
    ) -> Self {
        let (status, _) = watch::channel(DeviceStatus {
            name: endpoint.key.clone(),
            connected: false,
            state: CameraState::default(),
        });
        Self {
            endpoint,
            control,
            settings,
            status,
            spawned: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Latest published status. Never blocks on camera I/O.
    pub fn status(&self) -> DeviceStatus {
        self.status.borrow().clone()
    }

    /// Receive every status update as it is published
    pub fn subscribe(&self) -> watch::Receiver<DeviceStatus> {
        self.status.subscribe()
    }

    /// Start the supervision task. Returns `None` if it was already started.
    pub fn spawn(
        self: &Arc<Self>,
        desired: watch::Receiver<bool>,
        shutdown: watch::Receiver<()>,
    ) -> Option<JoinHandle<()>> {
        if self.spawned.swap(true, Ordering::SeqCst) {
            return None;
        }
        let supervisor = self.clone();
        Some(tokio::spawn(async move {
            supervisor.run(desired, shutdown).await;
        }))
    }

    /// Supervise the camera until shutdown. Only reachable through `spawn`.
    async fn run(&self, desired: watch::Receiver<bool>, mut shutdown: watch::Receiver<()>) {
        log::info!("{}: supervisor started", self.endpoint);

        loop {
            match self.connect().await {
                Ok(mut session) => {
                    let end = self
                        .run_session(session.as_mut(), &desired, &mut shutdown)
                        .await;
                    if self
                        .bounded("close", async {
                            session.close().await;
                            Ok(())
                        })
                        .await
                        .is_err()
                    {
                        log::debug!("{}: close timed out", self.endpoint);
                    }
                    self.publish_disconnected();

                    match end {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Failed(e) => {
                            log::warn!("{}: connection lost: {}", self.endpoint, e);
                        }
                    }
                }
                Err(e) => {
                    log::debug!("{}: connect failed: {}", self.endpoint, e);
                }
            }

            if sleep_or_shutdown(self.settings.backoff, &mut shutdown).await {
                break;
            }
        }

        log::info!("{}: supervisor stopped", self.endpoint);
    }

    async fn connect(&self) -> Result<Box<dyn CameraSession>, CameraError> {
        self.bounded("open", self.control.open())
            .await
            .map_err(CameraError::into_connection)
    }

    async fn run_session(
        &self,
        session: &mut dyn CameraSession,
        desired: &watch::Receiver<bool>,
        shutdown: &mut watch::Receiver<()>,
    ) -> SessionEnd {
        if let Err(e) = self.bounded("prepare", session.prepare()).await {
            log::debug!("{}: prepare failed (ignored): {}", self.endpoint, e);
        }

        // History does not survive a reconnect
        let mut memory = WatchdogMemory::default();

        let name = session.display_name();
        log::info!("{}: connected as '{}'", self.endpoint, name);
        self.status.send_modify(|status| {
            status.name = name;
            status.connected = true;
        });

        loop {
            match self.tick(session, desired, memory).await {
                Ok((state, next)) => {
                    memory = next;
                    self.status.send_modify(|status| status.state = state);
                }
                Err(e) => return SessionEnd::Failed(e),
            }

            if sleep_or_shutdown(self.settings.tick, shutdown).await {
                return SessionEnd::Shutdown;
            }
        }
    }

    /// Poll, decide and act once.
    async fn tick(
        &self,
        session: &mut dyn CameraSession,
        desired: &watch::Receiver<bool>,
        memory: WatchdogMemory,
    ) -> Result<(CameraState, WatchdogMemory), CameraError> {
        let state = self.bounded("get_state", session.get_state()).await?;
        let should_record = *desired.borrow();
        let (action, next) = evaluate(&state, should_record, memory, &self.settings.thresholds);

        match action {
            Action::None => {}
            Action::Restart => {
                log::info!("{}: restarting recording", self.endpoint);
                // The camera may already be stopped
                if let Err(e) = self.bounded("stop_recording", session.stop_recording()).await {
                    log::debug!("{}: stop before restart failed: {}", self.endpoint, e);
                }
                self.bounded("start_recording", session.start_recording())
                    .await?;
            }
            Action::Stop => {
                log::info!("{}: stopping recording", self.endpoint);
                self.bounded("stop_recording", session.stop_recording())
                    .await?;
            }
        }

        Ok((state, next))
    }

    /// Run one camera call under the request timeout.
    async fn bounded<T>(
        &self,
        call: &str,
        fut: impl Future<Output = Result<T, CameraError>>,
    ) -> Result<T, CameraError> {
        match tokio::time::timeout(self.settings.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CameraError::Protocol(format!(
                "{} timed out after {:?}",
                call, self.settings.request_timeout
            ))),
        }
    }

    fn publish_disconnected(&self) {
        self.status.send_if_modified(|status| {
            let was_connected = status.connected;
            status.connected = false;
            status.state = CameraState::default();
            was_connected
        });
    }
}

/// Sleep for `duration`. Returns `true` if shutdown was signalled first.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<()>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.changed() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
