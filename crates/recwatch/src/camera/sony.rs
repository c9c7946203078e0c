//! Sony Alpha driver (Camera Remote API, JSON-RPC over HTTP)
//!
//! The endpoint address is the device-description URL advertised over SSDP.
//! Sony bodies report an explicit recording status but no remaining capacity.

use super::ssdp;
use super::xml::{all_element_text, element_text};
use super::{
    CameraControl, CameraError, CameraSession, CameraState, CameraVendor, Reported, Result,
    VendorKind,
};
use crate::interfaces::NetworkInterface;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SEARCH_TARGET: &str = "urn:schemas-sony-com:service:ScalarWebAPI:1";

const CAMERA_SERVICE: &str = "camera";

/// `cameraStatus` value while a movie is being recorded
const STATUS_RECORDING: &str = "MovieRecording";

pub struct SonyVendor {
    http: reqwest::Client,
    ssdp_timeout: Duration,
}

impl SonyVendor {
    pub fn new(http: reqwest::Client, ssdp_timeout: Duration) -> Self {
        Self { http, ssdp_timeout }
    }
}

#[async_trait]
impl CameraVendor for SonyVendor {
    fn kind(&self) -> VendorKind {
        VendorKind::Sony
    }

    async fn discover(&self, interface: &NetworkInterface) -> Result<Vec<String>> {
        let responses = ssdp::m_search(interface, SEARCH_TARGET, self.ssdp_timeout).await?;
        Ok(responses.into_iter().map(|r| r.location).collect())
    }

    fn control(&self, address: &str) -> Arc<dyn CameraControl> {
        Arc::new(SonyControl::new(self.http.clone(), address))
    }
}

/// Parsed UPnP device description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    pub friendly_name: String,
    pub camera_url: String,
}

/// Extract the friendly name and the `camera` service endpoint.
pub fn parse_device_description(xml: &str) -> Result<DeviceDescription> {
    let friendly_name = element_text(xml, "friendlyName")
        .filter(|n| !n.is_empty())
        .unwrap_or("Sony")
        .to_string();

    let types = all_element_text(xml, "X_ScalarWebAPI_ServiceType");
    let urls = all_element_text(xml, "X_ScalarWebAPI_ActionList_URL");
    let base = types
        .iter()
        .zip(urls.iter())
        .find(|(ty, _)| **ty == CAMERA_SERVICE)
        .map(|(_, url)| url.trim_end_matches('/'))
        .ok_or_else(|| {
            CameraError::Connection("device description lists no camera service".to_string())
        })?;

    Ok(DeviceDescription {
        friendly_name,
        camera_url: format!("{}/{}", base, CAMERA_SERVICE),
    })
}

/// Unwrap a JSON-RPC reply into its `result` member.
pub fn rpc_result(reply: Value) -> Result<Value> {
    if let Some(err) = reply.get("error") {
        return Err(CameraError::Protocol(format!("camera returned error {}", err)));
    }
    reply
        .get("result")
        .cloned()
        .ok_or_else(|| CameraError::Protocol(format!("reply without result: {}", reply)))
}

/// Interpret a `getEvent` result array.
pub fn parse_event(result: &Value) -> Result<CameraState> {
    let status = result
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .find_map(|item| item.get("cameraStatus").and_then(Value::as_str))
        })
        .ok_or_else(|| CameraError::Protocol("getEvent without cameraStatus".to_string()))?;

    Ok(CameraState {
        recording: Reported::Known(status == STATUS_RECORDING),
        remaining: Reported::Unknown,
    })
}

pub struct SonyControl {
    http: reqwest::Client,
    description_url: String,
}

impl SonyControl {
    pub fn new(http: reqwest::Client, description_url: &str) -> Self {
        Self {
            http,
            description_url: description_url.to_string(),
        }
    }
}

#[async_trait]
impl CameraControl for SonyControl {
    async fn open(&self) -> Result<Box<dyn CameraSession>> {
        let xml = self
            .http
            .get(&self.description_url)
            .send()
            .await
            .map_err(CameraError::connection)?
            .text()
            .await
            .map_err(CameraError::connection)?;
        let description = parse_device_description(&xml)?;

        let session = SonySession {
            http: self.http.clone(),
            camera_url: description.camera_url,
            name: description.friendly_name,
            next_id: AtomicU64::new(1),
        };
        session
            .call("startRecMode", json!([]))
            .await
            .map_err(CameraError::into_connection)?;
        Ok(Box::new(session))
    }
}

struct SonySession {
    http: reqwest::Client,
    camera_url: String,
    name: String,
    next_id: AtomicU64,
}

impl SonySession {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "version": "1.0",
        });
        let reply: Value = self
            .http
            .post(&self.camera_url)
            .json(&body)
            .send()
            .await
            .map_err(CameraError::protocol)?
            .json()
            .await
            .map_err(CameraError::protocol)?;
        rpc_result(reply)
    }
}

#[async_trait]
impl CameraSession for SonySession {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    async fn prepare(&mut self) -> Result<()> {
        self.call("setShootMode", json!(["movie"])).await.map(|_| ())
    }

    async fn get_state(&mut self) -> Result<CameraState> {
        let result = self.call("getEvent", json!([false])).await?;
        parse_event(&result)
    }

    async fn start_recording(&mut self) -> Result<()> {
        self.call("startMovieRec", json!([])).await.map(|_| ())
    }

    async fn stop_recording(&mut self) -> Result<()> {
        self.call("stopMovieRec", json!([])).await.map(|_| ())
    }

    async fn close(&mut self) {
        if let Err(e) = self.call("stopRecMode", json!([])).await {
            log::debug!("{}: stopRecMode on close failed: {}", self.name, e);
        }
    }
}
