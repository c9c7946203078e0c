//! Discovery service
//!
//! Periodically searches every matching interface for cameras of each enabled
//! vendor and hands previously unseen endpoints to the registry.

use crate::camera::{CameraVendor, Endpoint, VendorKind};
use crate::config::StaticCamera;
use crate::hub::ControlHub;
use crate::interfaces::{self, NetworkInterface};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct DiscoveryService {
    /// Drivers for every known vendor, used to build controls
    vendors: Vec<Arc<dyn CameraVendor>>,
    /// Vendors searched for on each sweep
    search: Vec<VendorKind>,
    interface_pattern: Regex,
    interval: Duration,
    hub: Arc<ControlHub>,
    shutdown: watch::Receiver<()>,
}

impl DiscoveryService {
    pub fn new(
        vendors: Vec<Arc<dyn CameraVendor>>,
        search: Vec<VendorKind>,
        interface_pattern: Regex,
        interval: Duration,
        hub: Arc<ControlHub>,
        shutdown: watch::Receiver<()>,
    ) -> Self {
        Self {
            vendors,
            search,
            interface_pattern,
            interval,
            hub,
            shutdown,
        }
    }

    fn vendor(&self, kind: VendorKind) -> Option<&Arc<dyn CameraVendor>> {
        self.vendors.iter().find(|v| v.kind() == kind)
    }

    /// Register an endpoint and start its supervisor if it is new.
    /// Returns whether the endpoint was new.
    pub async fn register(&self, kind: VendorKind, address: &str) -> bool {
        let Some(vendor) = self.vendor(kind) else {
            log::warn!("No driver for {} camera at {}", kind, address);
            return false;
        };

        let endpoint = Endpoint::new(address, kind);
        let (supervisor, created) = self
            .hub
            .registry()
            .register_if_absent(endpoint, || vendor.control(address))
            .await;
        if created {
            supervisor.spawn(self.hub.subscribe_desired(), self.shutdown.clone());
        }
        created
    }

    /// Register the cameras listed in the configuration.
    pub async fn register_static(&self, cameras: &[StaticCamera]) {
        for camera in cameras {
            self.register(camera.vendor, &camera.address).await;
        }
    }

    /// One discovery pass over the given interfaces.
    ///
    /// A failing vendor/interface pair is logged and skipped. Returns the number
    /// of newly registered cameras.
    pub async fn sweep(&self, interfaces: &[NetworkInterface]) -> usize {
        let mut added = 0;
        for kind in &self.search {
            let Some(vendor) = self.vendor(*kind) else {
                continue;
            };
            // One SSDP window per vendor, not per interface
            let results =
                futures::future::join_all(interfaces.iter().map(|i| vendor.discover(i))).await;
            for (interface, result) in interfaces.iter().zip(results) {
                match result {
                    Ok(addresses) => {
                        for address in addresses {
                            if self.register(*kind, &address).await {
                                added += 1;
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("{} discovery on {} failed: {}", kind, interface.name, e);
                    }
                }
            }
        }
        added
    }

    /// Sweep every interval until shutdown.
    pub async fn run(mut self) {
        log::info!(
            "Discovery started (every {:?}, interfaces matching '{}')",
            self.interval,
            self.interface_pattern
        );

        loop {
            // SSDP needs an IPv4 address to bind to
            let found: Vec<NetworkInterface> = interfaces::matching(&self.interface_pattern)
                .into_iter()
                .filter(|i| i.ipv4.is_some())
                .collect();
            if found.is_empty() {
                log::debug!("No IPv4 interface matches '{}'", self.interface_pattern);
            }

            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = shutdown.changed() => break,
                added = self.sweep(&found) => {
                    if added > 0 {
                        log::info!("Discovered {} new camera(s)", added);
                    }
                }
            }

            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        log::info!("Discovery stopped");
    }
}
