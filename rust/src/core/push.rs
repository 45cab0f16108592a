// Push registration plumbing: backend hand-off and deep links.

use super::AppCore;
use crate::device::DeviceDescriptor;
use crate::platform::RemotePush;
use crate::push::{deep_link, register_push_token, RegistrationRequest};
use crate::state::BackendRegistration;
use crate::store::token_prefix;
use crate::updates::{CoreMsg, InternalEvent};

impl AppCore {
    /// `initialize()` plus the backend hand-off on success.
    pub(super) fn initialize_push(&mut self) -> Option<String> {
        let token = self.push.initialize()?;
        if let Some(device) = self.push.current_device().cloned() {
            self.register_with_backend(&token, &device);
        }
        Some(token)
    }

    pub(super) fn clear_push_token(&mut self) {
        if let Err(e) = self.push.clear_token() {
            tracing::warn!(%e, "push: clear incomplete");
        }
        self.cancel_backend_registration();
    }

    fn idle_backend_state(&self) -> BackendRegistration {
        if self.config.push_registration_url().is_some() {
            BackendRegistration::Idle
        } else {
            BackendRegistration::Disabled
        }
    }

    pub(super) fn register_with_backend(&mut self, token: &str, device: &DeviceDescriptor) {
        let Some(url) = self.config.push_registration_url() else {
            tracing::debug!("push: backend registration disabled");
            self.state.push.backend = BackendRegistration::Disabled;
            return;
        };

        self.backend_generation += 1;
        let generation = self.backend_generation;
        self.state.push.backend = BackendRegistration::Pending;

        let request = RegistrationRequest {
            token: token.to_string(),
            device_id: device.device_id.clone(),
            platform: device.device_type.clone(),
        };
        let policy = self.config.retry_policy();
        let client = self.http_client.clone();
        let tx = self.core_sender.clone();
        tracing::info!(token = %token_prefix(token), generation, "push: registering with backend");

        self.runtime.spawn(async move {
            let result = register_push_token(&client, &url, &request, policy)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::BackendRegistrationFinished { generation, result },
            )));
        });
    }

    pub(super) fn cancel_backend_registration(&mut self) {
        self.backend_generation += 1;
        self.state.push.backend = self.idle_backend_state();
    }

    pub(super) fn handle_backend_registration_finished(
        &mut self,
        generation: u64,
        result: Result<u32, String>,
    ) {
        if generation != self.backend_generation {
            tracing::debug!(generation, "push: stale backend result dropped");
            return;
        }
        self.state.push.backend = match result {
            Ok(attempts) => {
                tracing::info!(attempts, "push: backend registration done");
                BackendRegistration::Registered { attempts }
            }
            Err(error) => {
                tracing::error!(%error, "push: backend registration failed");
                BackendRegistration::Failed { error }
            }
        };
    }

    /// A tapped notification; its `url` opens in the hosted page.
    pub(super) fn open_notification(&mut self, push: RemotePush) {
        let Some(url) = deep_link(&push) else {
            tracing::debug!("push: opened notification has no deep link");
            return;
        };
        if self.bridge.is_ready() && self.bridge.navigate(&url) {
            self.pending_deep_link = None;
            return;
        }
        tracing::info!(url = %url, "push: deep link deferred until page load");
        self.pending_deep_link = Some(url);
    }
}
