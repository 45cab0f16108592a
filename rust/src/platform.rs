//! Callback interfaces implemented by the iOS/Android shells.
//!
//! The core never talks to the WebView, the push SDK or the notification
//! centre directly; the host app hands us implementations of these traits.

use std::collections::HashMap;

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionStatus {
    NotDetermined,
    Denied,
    Authorized,
    Provisional,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(
            self,
            PermissionStatus::Authorized | PermissionStatus::Provisional
        )
    }
}

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PlatformError {
    #[error("{reason}")]
    Failed { reason: String },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for PlatformError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        PlatformError::Failed { reason: e.reason }
    }
}

/// The hosted WebView. Both calls must be marshalled onto the UI thread by the host.
#[uniffi::export(callback_interface)]
pub trait WebViewHost: Send + Sync + 'static {
    fn inject_script(&self, script: String);
    fn reload(&self);
}

/// Platform push service (FCM on Android, FCM-over-APNs on iOS).
///
/// On Android 13+ `request_permission` is expected to ask for POST_NOTIFICATIONS
/// before asking the messaging SDK.
#[uniffi::export(callback_interface)]
pub trait PushPlatform: Send + Sync + 'static {
    fn request_permission(&self) -> Result<PermissionStatus, PlatformError>;
    fn has_permission(&self) -> bool;
    fn fetch_token(&self) -> Result<String, PlatformError>;
    fn delete_token(&self) -> Result<(), PlatformError>;
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct PlatformInfo {
    /// `android` or `ios`.
    pub platform: String,
    pub os_name: String,
    pub os_version: String,
    pub brand: String,
    pub model: String,
    pub app_version: String,
}

#[uniffi::export(callback_interface)]
pub trait DeviceInfoProvider: Send + Sync + 'static {
    fn platform_info(&self) -> PlatformInfo;
}

/// A push message as delivered by the platform SDK.
#[derive(uniffi::Record, Clone, Debug, Default, PartialEq, Eq)]
pub struct RemotePush {
    pub title: Option<String>,
    pub body: Option<String>,
    pub data: HashMap<String, String>,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
    pub play_sound: bool,
}

#[uniffi::export(callback_interface)]
pub trait NotificationPresenter: Send + Sync + 'static {
    fn present(&self, notification: LocalNotification);
}
