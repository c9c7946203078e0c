//! Camera control capability
//!
//! Vendor drivers implement [`CameraVendor`] (discovery + construction),
//! [`CameraControl`] (session establishment) and [`CameraSession`] (in-session
//! commands). The supervisor only ever talks to these traits.

pub mod lumix;
pub mod sony;
pub mod ssdp;
pub mod xml;

use crate::interfaces::NetworkInterface;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by camera drivers.
///
/// The variant decides the recovery action: discovery failures skip one
/// vendor/interface for a sweep, connection failures keep the supervisor
/// disconnected until the next backoff, protocol failures tear down the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl CameraError {
    pub fn discovery(err: impl fmt::Display) -> Self {
        CameraError::Discovery(err.to_string())
    }

    pub fn connection(err: impl fmt::Display) -> Self {
        CameraError::Connection(err.to_string())
    }

    pub fn protocol(err: impl fmt::Display) -> Self {
        CameraError::Protocol(err.to_string())
    }

    /// Reclassify a failure that happened while establishing a session.
    pub fn into_connection(self) -> Self {
        match self {
            CameraError::Discovery(msg)
            | CameraError::Connection(msg)
            | CameraError::Protocol(msg) => CameraError::Connection(msg),
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, CameraError::Connection(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, CameraError::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// A telemetry field that a vendor may or may not expose.
///
/// `Unknown` means "not reported", which the decision policy treats
/// differently from a reported `false` or zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reported<T> {
    Known(T),
    #[default]
    Unknown,
}

impl<T> Reported<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Reported::Known(_))
    }

    pub fn known(self) -> Option<T> {
        match self {
            Reported::Known(v) => Some(v),
            Reported::Unknown => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reported<U> {
        match self {
            Reported::Known(v) => Reported::Known(f(v)),
            Reported::Unknown => Reported::Unknown,
        }
    }
}

impl<T> From<Option<T>> for Reported<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reported::Known(v),
            None => Reported::Unknown,
        }
    }
}

/// One poll worth of telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraState {
    pub recording: Reported<bool>,
    pub remaining: Reported<Duration>,
}

/// Supported camera vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorKind {
    Lumix,
    Sony,
}

impl VendorKind {
    pub const ALL: [VendorKind; 2] = [VendorKind::Lumix, VendorKind::Sony];
}

impl fmt::Display for VendorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VendorKind::Lumix => write!(f, "lumix"),
            VendorKind::Sony => write!(f, "sony"),
        }
    }
}

/// Identity of one camera: its address plus the vendor that speaks to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub key: String,
    pub vendor: VendorKind,
}

impl Endpoint {
    pub fn new(key: impl Into<String>, vendor: VendorKind) -> Self {
        Self {
            key: key.into(),
            vendor,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.vendor)
    }
}

/// Per-vendor entry point: finds cameras and builds controllers for them.
#[async_trait]
pub trait CameraVendor: Send + Sync {
    fn kind(&self) -> VendorKind;

    /// Return the endpoint addresses reachable through `interface`.
    async fn discover(&self, interface: &NetworkInterface) -> Result<Vec<String>>;

    /// Build a controller for a previously discovered (or configured) address.
    fn control(&self, address: &str) -> Arc<dyn CameraControl>;
}

/// Controller bound to one camera address.
#[async_trait]
pub trait CameraControl: Send + Sync {
    /// Establish a session. Failures are reported as [`CameraError::Connection`].
    async fn open(&self) -> Result<Box<dyn CameraSession>>;
}

/// A live session with one camera, exclusively owned by its supervisor.
#[async_trait]
pub trait CameraSession: Send {
    /// Name shown at the control surface.
    fn display_name(&self) -> String;

    /// Best-effort device setup run once per connection.
    async fn prepare(&mut self) -> Result<()>;

    async fn get_state(&mut self) -> Result<CameraState>;

    async fn start_recording(&mut self) -> Result<()>;

    async fn stop_recording(&mut self) -> Result<()>;

    /// Release the session. Called unconditionally when the session ends.
    async fn close(&mut self) {}
}

/// Build the driver for each requested vendor.
pub fn vendors(
    kinds: &[VendorKind],
    http: reqwest::Client,
    ssdp_timeout: Duration,
) -> Vec<Arc<dyn CameraVendor>> {
    kinds
        .iter()
        .map(|kind| -> Arc<dyn CameraVendor> {
            match kind {
                VendorKind::Lumix => {
                    Arc::new(lumix::LumixVendor::new(http.clone(), ssdp_timeout))
                }
                VendorKind::Sony => Arc::new(sony::SonyVendor::new(http.clone(), ssdp_timeout)),
            }
        })
        .collect()
}
