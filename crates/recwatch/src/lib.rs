//! Recwatch
//!
//! Keeps networked cameras recording past their per-clip limits. Cameras are
//! discovered over SSDP (or listed in the configuration), each one is owned by
//! a supervisor that polls it and restarts recording when a clip ends, and an
//! HTTP control surface sets the desired recording state.

pub mod camera;
pub mod config;
pub mod discovery;
pub mod http_server;
pub mod hub;
pub mod interfaces;
pub mod policy;
pub mod registry;
pub mod supervisor;

pub use config::Config;
pub use discovery::DiscoveryService;
pub use hub::ControlHub;
pub use registry::DeviceRegistry;
pub use supervisor::{Supervisor, SupervisorSettings};

use camera::VendorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Run discovery, supervisors and the HTTP server until shutdown.
pub async fn run(
    config: Config,
    shutdown: watch::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = SupervisorSettings::from(&config);
    let http = reqwest::Client::builder()
        .connect_timeout(settings.request_timeout)
        .timeout(settings.request_timeout + Duration::from_secs(1))
        .build()?;

    // Static cameras may use a vendor that is not searched for
    let vendors = camera::vendors(&VendorKind::ALL, http, config.discovery.ssdp_timeout());

    let registry = Arc::new(DeviceRegistry::new(settings));
    let hub = Arc::new(ControlHub::new(registry));

    let discovery = DiscoveryService::new(
        vendors,
        config.discovery.vendors.clone(),
        config.discovery.interface_regex()?,
        config.discovery.interval(),
        hub.clone(),
        shutdown.clone(),
    );
    discovery.register_static(&config.cameras).await;
    if !config.cameras.is_empty() {
        log::info!("Supervising {} configured camera(s)", config.cameras.len());
    }

    let discovery_task = if config.discovery.enabled {
        Some(tokio::spawn(discovery.run()))
    } else {
        log::info!("Discovery disabled");
        None
    };

    http_server::run_http_server(hub, &config.http.bind, config.http.port, shutdown).await?;

    if let Some(task) = discovery_task {
        if let Err(e) = task.await {
            log::warn!("Discovery task failed: {}", e);
        }
    }

    Ok(())
}
