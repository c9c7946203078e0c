//! End-to-end: HTTP control surface driving a supervised camera.

use async_trait::async_trait;
use recwatch::camera::{
    self, CameraControl, CameraSession, CameraState, Endpoint, Reported, VendorKind,
};
use recwatch::policy::PolicyThresholds;
use recwatch::{http_server, ControlHub, DeviceRegistry, SupervisorSettings};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Camera that reports an explicit recording flag
#[derive(Clone, Default)]
struct FlagCamera {
    recording: Arc<AtomicBool>,
}

#[async_trait]
impl CameraControl for FlagCamera {
    async fn open(&self) -> camera::Result<Box<dyn CameraSession>> {
        Ok(Box::new(FlagSession {
            recording: self.recording.clone(),
        }))
    }
}

struct FlagSession {
    recording: Arc<AtomicBool>,
}

#[async_trait]
impl CameraSession for FlagSession {
    fn display_name(&self) -> String {
        "ILCE-6000".to_string()
    }

    async fn prepare(&mut self) -> camera::Result<()> {
        Ok(())
    }

    async fn get_state(&mut self) -> camera::Result<CameraState> {
        Ok(CameraState {
            recording: Reported::Known(self.recording.load(Ordering::SeqCst)),
            remaining: Reported::Unknown,
        })
    }

    async fn start_recording(&mut self) -> camera::Result<()> {
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_recording(&mut self) -> camera::Result<()> {
        self.recording.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn fast_settings() -> SupervisorSettings {
    SupervisorSettings {
        tick: Duration::from_millis(20),
        backoff: Duration::from_millis(50),
        request_timeout: Duration::from_secs(1),
        thresholds: PolicyThresholds::default(),
    }
}

/// Poll `/get_state` until `check` accepts it or two seconds pass
async fn wait_for_state(base: &str, check: impl Fn(&Value) -> bool) -> Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let state: Value = reqwest::get(format!("{}/get_state", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if check(&state) || tokio::time::Instant::now() > deadline {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn record_toggle_drives_camera() {
    let registry = Arc::new(DeviceRegistry::new(fast_settings()));
    let hub = Arc::new(ControlHub::new(registry.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let camera = FlagCamera::default();
    let control = camera.clone();
    let (supervisor, _) = registry
        .register_if_absent(
            Endpoint::new("http://192.168.122.1:64321/dd.xml", VendorKind::Sony),
            move || Arc::new(control) as Arc<dyn CameraControl>,
        )
        .await;
    supervisor.spawn(hub.subscribe_desired(), shutdown_rx.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(http_server::serve(listener, hub.clone(), shutdown_rx));

    let idle = wait_for_state(&base, |s| {
        s["cameras"]["ILCE-6000"]["rec"] == json!(false)
    })
    .await;
    assert_eq!(
        idle,
        json!({
            "should_record": false,
            "cameras": {"ILCE-6000": {"connected": true, "rec": false, "remaining": null}}
        })
    );

    let resp = reqwest::Client::new()
        .post(format!("{}/record", base))
        .body("true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let recording = wait_for_state(&base, |s| {
        s["cameras"]["ILCE-6000"]["rec"] == json!(true)
    })
    .await;
    assert_eq!(recording["should_record"], json!(true));
    assert_eq!(recording["cameras"]["ILCE-6000"]["rec"], json!(true));
    assert!(camera.recording.load(Ordering::SeqCst));

    reqwest::Client::new()
        .post(format!("{}/record", base))
        .body("false")
        .send()
        .await
        .unwrap();
    let stopped = wait_for_state(&base, |s| {
        s["cameras"]["ILCE-6000"]["rec"] == json!(false)
    })
    .await;
    assert_eq!(stopped["should_record"], json!(false));
    assert!(!camera.recording.load(Ordering::SeqCst));

    shutdown_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
