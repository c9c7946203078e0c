//! Panasonic Lumix driver (`cam.cgi` HTTP API)

use super::ssdp;
use super::xml::element_text;
use super::{
    CameraControl, CameraError, CameraSession, CameraState, CameraVendor, Reported, Result,
    VendorKind,
};
use crate::interfaces::NetworkInterface;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// SSDP search target advertised by Lumix bodies
const SEARCH_TARGET: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

/// Marker in the SSDP `SERVER` header identifying a Lumix
const SERVER_MARKER: &str = "Panasonic-UPnP";

const RESULT_OK: &str = "<result>ok</result>";

/// Colour profile applied when a session is prepared
const PREPARE_COLOR_MODE: &str = "cinelike_d";

pub struct LumixVendor {
    http: reqwest::Client,
    ssdp_timeout: Duration,
}

impl LumixVendor {
    pub fn new(http: reqwest::Client, ssdp_timeout: Duration) -> Self {
        Self { http, ssdp_timeout }
    }
}

#[async_trait]
impl CameraVendor for LumixVendor {
    fn kind(&self) -> VendorKind {
        VendorKind::Lumix
    }

    async fn discover(&self, interface: &NetworkInterface) -> Result<Vec<String>> {
        let responses = ssdp::m_search(interface, SEARCH_TARGET, self.ssdp_timeout).await?;
        let mut hosts: Vec<String> = Vec::new();
        for resp in responses {
            if !resp.server.contains(SERVER_MARKER) {
                continue;
            }
            match ssdp::location_host(&resp.location) {
                Some(host) if !hosts.contains(&host) => hosts.push(host),
                Some(_) => {}
                None => log::debug!("Lumix answer with unusable location: {}", resp.location),
            }
        }
        Ok(hosts)
    }

    fn control(&self, address: &str) -> Arc<dyn CameraControl> {
        Arc::new(LumixControl::new(self.http.clone(), address))
    }
}

/// Controller for one Lumix body addressed by IP.
pub struct LumixControl {
    http: reqwest::Client,
    ip: String,
    base_url: String,
}

impl LumixControl {
    pub fn new(http: reqwest::Client, ip: &str) -> Self {
        Self {
            http,
            ip: ip.to_string(),
            base_url: format!("http://{}/cam.cgi", ip),
        }
    }
}

#[async_trait]
impl CameraControl for LumixControl {
    async fn open(&self) -> Result<Box<dyn CameraSession>> {
        let session = LumixSession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            name: format!("Panasonic ({})", self.ip),
        };
        let body = session
            .request(&[("mode", "camcmd"), ("value", "recmode")])
            .await
            .map_err(CameraError::into_connection)?;
        check_result(&body).map_err(CameraError::into_connection)?;
        Ok(Box::new(session))
    }
}

struct LumixSession {
    http: reqwest::Client,
    base_url: String,
    name: String,
}

impl LumixSession {
    async fn request(&self, params: &[(&str, &str)]) -> Result<String> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(params)
            .send()
            .await
            .map_err(CameraError::protocol)?;
        resp.text().await.map_err(CameraError::protocol)
    }

    async fn command(&self, params: &[(&str, &str)]) -> Result<()> {
        let body = self.request(params).await?;
        check_result(&body)
    }
}

#[async_trait]
impl CameraSession for LumixSession {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    async fn prepare(&mut self) -> Result<()> {
        self.command(&[
            ("mode", "setsetting"),
            ("type", "colormode"),
            ("value", PREPARE_COLOR_MODE),
        ])
        .await
    }

    async fn get_state(&mut self) -> Result<CameraState> {
        let body = self.request(&[("mode", "getstate")]).await?;
        parse_state(&body)
    }

    async fn start_recording(&mut self) -> Result<()> {
        self.command(&[("mode", "camcmd"), ("value", "video_recstart")])
            .await
    }

    async fn stop_recording(&mut self) -> Result<()> {
        self.command(&[("mode", "camcmd"), ("value", "video_recstop")])
            .await
    }
}

fn check_result(body: &str) -> Result<()> {
    if body.contains(RESULT_OK) {
        Ok(())
    } else {
        Err(CameraError::Protocol(format!(
            "camera rejected command: {}",
            body.trim()
        )))
    }
}

/// Parse a `mode=getstate` reply.
///
/// Newer bodies (G81 and later) report `<rec>`; older ones (GH3) only report
/// the remaining capacity.
pub fn parse_state(body: &str) -> Result<CameraState> {
    if element_text(body, "state").is_none() {
        return Err(CameraError::Protocol(format!(
            "getstate reply without <state>: {}",
            body.trim()
        )));
    }

    let remaining = element_text(body, "video_remaincapacity")
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .ok_or_else(|| {
            CameraError::Protocol("getstate reply without video_remaincapacity".to_string())
        })?;

    let recording = element_text(body, "rec").map(|v| v == "on");

    Ok(CameraState {
        recording: recording.into(),
        remaining: Reported::Known(remaining),
    })
}
