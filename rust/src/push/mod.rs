//! Push token lifecycle: permission, acquisition, refresh, clear.

mod backend;

use std::sync::Arc;

use flume::{Receiver, Sender};

use crate::device::DeviceDescriptor;
use crate::platform::{
    DeviceInfoProvider, LocalNotification, NotificationPresenter, PermissionStatus, PlatformError,
    PushPlatform, RemotePush,
};
use crate::store::{token_prefix, StoreError, TokenStore};

pub use backend::{register_push_token, RegistrationRequest, RetryPolicy};

const DEFAULT_NOTIFICATION_TITLE: &str = "Notification";
const DEFAULT_NOTIFICATION_BODY: &str = "You have a new notification.";

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushRegistrationState {
    Uninitialized,
    PermissionRequested,
    Registered,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushTokenUpdate {
    pub token: String,
    pub device: DeviceDescriptor,
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("notification permission not granted ({0:?})")]
    PermissionDenied(PermissionStatus),
    #[error("push platform: {0}")]
    Platform(#[from] PlatformError),
    #[error("platform returned an empty push token")]
    EmptyToken,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct PushRegistrationManager {
    platform: Arc<dyn PushPlatform>,
    device_info: Arc<dyn DeviceInfoProvider>,
    notifications: Arc<dyn NotificationPresenter>,
    store: TokenStore,
    install_id: String,

    state: PushRegistrationState,
    token: Option<String>,
    device: Option<DeviceDescriptor>,
    subscribers: Vec<Sender<PushTokenUpdate>>,
}

impl PushRegistrationManager {
    pub fn new(
        platform: Arc<dyn PushPlatform>,
        device_info: Arc<dyn DeviceInfoProvider>,
        notifications: Arc<dyn NotificationPresenter>,
        store: TokenStore,
        install_id: String,
    ) -> Self {
        Self {
            platform,
            device_info,
            notifications,
            store,
            install_id,
            state: PushRegistrationState::Uninitialized,
            token: None,
            device: None,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> PushRegistrationState {
        self.state
    }

    pub fn current_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn current_device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    /// Every token refresh is delivered once to each live receiver.
    pub fn subscribe(&mut self) -> Receiver<PushTokenUpdate> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Ask for permission, then for a token. `None` on denial or platform failure;
    /// callers may simply call again later.
    pub fn initialize(&mut self) -> Option<String> {
        match self.try_initialize() {
            Ok(token) => {
                tracing::info!(token = %token_prefix(&token), "push: registered");
                Some(token)
            }
            Err(e) => {
                tracing::warn!(%e, "push: initialize failed");
                self.state = PushRegistrationState::Failed;
                self.token = None;
                None
            }
        }
    }

    fn try_initialize(&mut self) -> Result<String, PushError> {
        self.state = PushRegistrationState::PermissionRequested;
        let status = self.platform.request_permission()?;
        if !status.is_granted() {
            return Err(PushError::PermissionDenied(status));
        }
        let token = self.platform.fetch_token()?;
        if token.is_empty() {
            return Err(PushError::EmptyToken);
        }
        let device = self.collect_device();
        self.persist(&token, &device);
        self.token = Some(token.clone());
        self.device = Some(device);
        self.state = PushRegistrationState::Registered;
        Ok(token)
    }

    fn collect_device(&self) -> DeviceDescriptor {
        DeviceDescriptor::from_platform(self.device_info.platform_info(), &self.install_id)
    }

    fn persist(&self, token: &str, device: &DeviceDescriptor) {
        // The in-memory copy still serves this session if the keystore is unavailable.
        if let Err(e) = self.store.save_push_registration(token, Some(device)) {
            tracing::warn!(%e, "push: token not persisted");
        }
    }

    /// A registration handed over by the page replaces the cached one. Without a
    /// device from the page the cached device is kept. The cache only changes once
    /// the store has the same registration.
    pub fn adopt(
        &mut self,
        token: String,
        device: Option<DeviceDescriptor>,
    ) -> Result<(), PushError> {
        let device = device.or_else(|| self.device.clone());
        self.store.save_push_registration(&token, device.as_ref())?;
        tracing::info!(token = %token_prefix(&token), "push: adopted page registration");
        self.token = Some(token);
        self.device = device;
        self.state = PushRegistrationState::Registered;
        Ok(())
    }

    /// The platform rotated our token.
    pub fn handle_token_refresh(&mut self, token: String) {
        if token.is_empty() {
            tracing::warn!("push: ignoring empty refreshed token");
            return;
        }
        tracing::info!(token = %token_prefix(&token), "push: token refreshed");
        let device = match self.device.clone() {
            Some(device) => device,
            None => self.collect_device(),
        };
        self.persist(&token, &device);
        self.token = Some(token.clone());
        self.device = Some(device.clone());
        self.state = PushRegistrationState::Registered;
        self.notify(PushTokenUpdate { token, device });
    }

    fn notify(&mut self, update: PushTokenUpdate) {
        self.subscribers.retain(|tx| tx.send(update.clone()).is_ok());
    }

    /// Drop the platform token and fetch a fresh one.
    pub fn refresh_token(&mut self) -> Option<String> {
        if let Err(e) = self.platform.delete_token() {
            tracing::warn!(%e, "push: delete before refresh failed");
        }
        match self.platform.fetch_token() {
            Ok(token) if !token.is_empty() => {
                self.handle_token_refresh(token.clone());
                Some(token)
            }
            Ok(_) => {
                tracing::warn!("push: refresh returned empty token");
                None
            }
            Err(e) => {
                tracing::warn!(%e, "push: refresh failed");
                None
            }
        }
    }

    /// Permission granted and a token obtainable right now.
    pub fn check_token_status(&self) -> bool {
        if !self.platform.has_permission() {
            return false;
        }
        match self.platform.fetch_token() {
            Ok(token) => !token.is_empty(),
            Err(e) => {
                tracing::warn!(%e, "push: token status check failed");
                false
            }
        }
    }

    /// Delete platform + persisted token and forget the cached one.
    /// Every step runs; the first error is returned.
    pub fn clear_token(&mut self) -> Result<(), PushError> {
        let platform = self.platform.delete_token().map_err(PushError::from);
        let stored = self
            .store
            .clear_push_registration()
            .map_err(PushError::from);
        self.reset_cache();
        tracing::info!("push: token cleared");
        platform.and(stored)
    }

    /// Forget the in-memory registration only.
    pub fn reset_cache(&mut self) {
        self.token = None;
        self.device = None;
        self.state = PushRegistrationState::Uninitialized;
    }

    /// Foreground delivery goes to the local presenter, never to the page.
    pub fn handle_foreground_message(&self, push: RemotePush) {
        let notification = LocalNotification {
            title: push
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_TITLE.to_string()),
            body: push
                .body
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_BODY.to_string()),
            data: push.data,
            play_sound: true,
        };
        tracing::info!(title = %notification.title, "push: presenting foreground message");
        self.notifications.present(notification);
    }
}

/// Deep link carried by a tapped notification.
pub fn deep_link(push: &RemotePush) -> Option<String> {
    push.data
        .get("url")
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}
