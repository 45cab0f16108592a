// Fake platform hooks shared by unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::platform::{
    DeviceInfoProvider, LocalNotification, NotificationPresenter, PermissionStatus, PlatformError,
    PlatformInfo, PushPlatform, WebViewHost,
};

#[derive(Default)]
pub(crate) struct FakeWebView {
    scripts: Mutex<Vec<String>>,
    reloads: AtomicU32,
}

impl FakeWebView {
    pub(crate) fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    /// Envelopes delivered through `handleNativeMessage`, in order.
    pub(crate) fn messages(&self) -> Vec<serde_json::Value> {
        self.scripts()
            .iter()
            .filter_map(|s| crate::bridge::script::decode_delivered(s))
            .collect()
    }

    pub(crate) fn reloads(&self) -> u32 {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl WebViewHost for FakeWebView {
    fn inject_script(&self, script: String) {
        self.scripts.lock().unwrap().push(script);
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakePushPlatform {
    pub(crate) permission: Mutex<Result<PermissionStatus, String>>,
    pub(crate) tokens: Mutex<Vec<Result<String, String>>>,
    pub(crate) fetches: AtomicU32,
    pub(crate) deletes: AtomicU32,
}

impl FakePushPlatform {
    /// Grants permission and hands out `token-1`, `token-2`, ... on each fetch.
    pub(crate) fn granting() -> Self {
        Self {
            permission: Mutex::new(Ok(PermissionStatus::Authorized)),
            tokens: Mutex::new(Vec::new()),
            fetches: AtomicU32::new(0),
            deletes: AtomicU32::new(0),
        }
    }

    pub(crate) fn denying() -> Self {
        let platform = Self::granting();
        *platform.permission.lock().unwrap() = Ok(PermissionStatus::Denied);
        platform
    }

    pub(crate) fn set_permission(&self, permission: Result<PermissionStatus, String>) {
        *self.permission.lock().unwrap() = permission;
    }

    /// Queue the next fetch results; once drained, fetches fall back to `token-N`.
    pub(crate) fn queue_tokens(&self, tokens: Vec<Result<String, String>>) {
        *self.tokens.lock().unwrap() = tokens;
    }
}

impl PushPlatform for FakePushPlatform {
    fn request_permission(&self) -> Result<PermissionStatus, PlatformError> {
        self.permission
            .lock()
            .unwrap()
            .clone()
            .map_err(|reason| PlatformError::Failed { reason })
    }

    fn has_permission(&self) -> bool {
        matches!(*self.permission.lock().unwrap(), Ok(p) if p.is_granted())
    }

    fn fetch_token(&self) -> Result<String, PlatformError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        let mut queued = self.tokens.lock().unwrap();
        if queued.is_empty() {
            return Ok(format!("token-{n}"));
        }
        queued
            .remove(0)
            .map_err(|reason| PlatformError::Failed { reason })
    }

    fn delete_token(&self) -> Result<(), PlatformError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct FakeDeviceInfo;

impl DeviceInfoProvider for FakeDeviceInfo {
    fn platform_info(&self) -> PlatformInfo {
        PlatformInfo {
            platform: "android".into(),
            os_name: "Android".into(),
            os_version: "14".into(),
            brand: "google".into(),
            model: "Pixel 8".into(),
            app_version: "1.0.0".into(),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingPresenter {
    shown: Mutex<Vec<LocalNotification>>,
}

impl RecordingPresenter {
    pub(crate) fn shown(&self) -> Vec<LocalNotification> {
        self.shown.lock().unwrap().clone()
    }
}

impl NotificationPresenter for RecordingPresenter {
    fn present(&self, notification: LocalNotification) {
        self.shown.lock().unwrap().push(notification);
    }
}
