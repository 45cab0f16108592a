#![allow(dead_code)]

//! Fake host-app hooks for driving `FfiApp` end to end.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pickup_core::{
    AppReconciler, AppUpdate, DeviceInfoProvider, LocalNotification, NotificationPresenter,
    PermissionStatus, PlatformError, PlatformInfo, PushPlatform, WebViewHost,
};

pub fn write_config(data_dir: &Path, config: serde_json::Value) {
    std::fs::write(
        data_dir.join("pickup_config.json"),
        serde_json::to_vec(&config).unwrap(),
    )
    .unwrap();
}

/// No backend hand-off, no injection delays.
pub fn offline_config() -> serde_json::Value {
    serde_json::json!({
        "disable_network": true,
        "initial_tokens_delay_ms": 0,
        "initial_push_delay_ms": 0,
    })
}

pub fn wait_until(what: &str, timeout: Duration, mut f: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("{what}: condition not met within {timeout:?}");
}

pub fn jwt_expiring_at(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({"sub": "user-1", "exp": exp}).to_string());
    format!("{header}.{payload}.sig")
}

pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Records injected scripts. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingWebView {
    scripts: Arc<Mutex<Vec<String>>>,
    reloads: Arc<AtomicU32>,
}

impl RecordingWebView {
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    /// Envelopes delivered through `window.handleNativeMessage`.
    pub fn messages(&self) -> Vec<serde_json::Value> {
        self.scripts()
            .iter()
            .filter_map(|s| decode_delivered(s))
            .collect()
    }

    pub fn messages_of(&self, kind: &str) -> Vec<serde_json::Value> {
        self.messages()
            .into_iter()
            .filter(|m| m["type"] == kind)
            .collect()
    }

    pub fn reloads(&self) -> u32 {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl WebViewHost for RecordingWebView {
    fn inject_script(&self, script: String) {
        self.scripts.lock().unwrap().push(script);
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

fn decode_delivered(script: &str) -> Option<serde_json::Value> {
    let marker = "window.handleNativeMessage(";
    let start = script.find(marker)? + marker.len();
    let end = script.rfind("); }")?;
    let literal: String = serde_json::from_str(&script[start..end]).ok()?;
    serde_json::from_str(&literal).ok()
}

pub struct StaticPushPlatform {
    pub granted: bool,
    pub token: String,
}

impl PushPlatform for StaticPushPlatform {
    fn request_permission(&self) -> Result<PermissionStatus, PlatformError> {
        Ok(if self.granted {
            PermissionStatus::Authorized
        } else {
            PermissionStatus::Denied
        })
    }

    fn has_permission(&self) -> bool {
        self.granted
    }

    fn fetch_token(&self) -> Result<String, PlatformError> {
        Ok(self.token.clone())
    }

    fn delete_token(&self) -> Result<(), PlatformError> {
        Ok(())
    }
}

pub struct StaticDeviceInfo;

impl DeviceInfoProvider for StaticDeviceInfo {
    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo {
            platform: "ios".into(),
            os_name: "iOS".into(),
            os_version: "18.1".into(),
            brand: "Apple".into(),
            model: "iPhone16,2".into(),
            app_version: "2.3.0".into(),
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingPresenter {
    shown: Arc<Mutex<Vec<LocalNotification>>>,
}

impl RecordingPresenter {
    pub fn shown(&self) -> Vec<LocalNotification> {
        self.shown.lock().unwrap().clone()
    }

    /// Live clones, including the one handed to the app.
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.shown)
    }
}

impl NotificationPresenter for RecordingPresenter {
    fn present(&self, notification: LocalNotification) {
        self.shown.lock().unwrap().push(notification);
    }
}

#[derive(Clone, Default)]
pub struct Collector {
    pub updates: Arc<Mutex<Vec<AppUpdate>>>,
}

impl AppReconciler for Collector {
    fn reconcile(&self, update: AppUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
