// Hosted page lifecycle and page -> native message handlers.

use std::time::Duration;

use super::AppCore;
use crate::bridge::{BridgeMessage, MessageType, Router};
use crate::updates::{CoreMsg, InternalEvent};

pub(super) fn page_router() -> Router<AppCore> {
    Router::new()
        .on(MessageType::SaveTokens, AppCore::on_save_tokens)
        .on(MessageType::ClearTokens, AppCore::on_clear_tokens)
        .on(MessageType::RequestTokens, AppCore::on_request_tokens)
        .on(MessageType::SaveFcmToken, AppCore::on_save_push_token)
        .on(MessageType::ClearFcmToken, AppCore::on_clear_push_token)
        .on(MessageType::RequestFcmToken, AppCore::on_request_push_token)
        .on(MessageType::NavigateTo, AppCore::on_navigate_to)
        .on(MessageType::ReloadPage, AppCore::on_reload_page)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppCore {
    pub(super) fn handle_page_load_started(&mut self, url: String) {
        self.page_load_token += 1;
        self.bridge.mark_ready(false);
        self.state.page.loading = true;
        self.state.page.load_error = None;
        self.state.page.current_url = Some(url);
    }

    pub(super) fn handle_page_load_finished(&mut self, url: String) {
        self.page_load_token += 1;
        self.bridge.mark_ready(true);
        self.state.page.loading = false;
        self.state.page.load_error = None;
        self.state.page.current_url = Some(url);

        let load_token = self.page_load_token;
        self.schedule(
            self.config.initial_tokens_delay(),
            InternalEvent::InjectInitialCredentials { load_token },
        );
        self.schedule(
            self.config.initial_push_delay(),
            InternalEvent::InjectInitialPushToken { load_token },
        );

        self.announce_push_token();

        if let Some(url) = self.pending_deep_link.take() {
            tracing::info!(url = %url, "page: following deferred deep link");
            self.bridge.navigate(&url);
        }
    }

    pub(super) fn handle_page_load_failed(&mut self, description: String) {
        tracing::warn!(%description, "page: load failed");
        self.page_load_token += 1;
        self.bridge.mark_ready(false);
        self.state.page.loading = false;
        self.state.page.load_error = Some(description);
    }

    fn schedule(&self, delay: Duration, event: InternalEvent) {
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(event)));
        });
    }

    pub(super) fn route_page_message(&mut self, message: BridgeMessage) {
        match self.router.handler(message.kind) {
            Some(handler) => handler(self, message),
            None => tracing::warn!(
                kind = message.kind.as_str(),
                "page: message type is native -> page only; ignoring"
            ),
        }
    }

    fn on_save_tokens(&mut self, message: BridgeMessage) {
        let Some(access_token) = non_empty(message.access_token) else {
            tracing::warn!("page: SAVE_TOKENS without accessToken; ignoring");
            return;
        };
        let refresh_token = non_empty(message.refresh_token);
        let _ = self
            .tokens
            .save_credentials(&access_token, refresh_token.as_deref());
    }

    fn on_clear_tokens(&mut self, _: BridgeMessage) {
        let _ = self.tokens.clear_credentials();
    }

    fn on_request_tokens(&mut self, _: BridgeMessage) {
        self.respond_tokens();
    }

    /// TOKEN_RESPONSE with the live credential pair, or no token fields.
    pub(super) fn respond_tokens(&mut self) {
        let credentials = self.tokens.get_credentials();
        self.bridge
            .send_to_page(&BridgeMessage::token_response(credentials));
    }

    fn on_save_push_token(&mut self, message: BridgeMessage) {
        let Some(token) = non_empty(message.fcm_token) else {
            tracing::warn!("page: SAVE_FCM_TOKEN without token; ignoring");
            return;
        };
        if let Err(e) = self.push.adopt(token, message.device_info) {
            tracing::warn!(%e, "page: SAVE_FCM_TOKEN not applied");
        }
    }

    fn on_clear_push_token(&mut self, _: BridgeMessage) {
        self.clear_push_token();
    }

    fn on_request_push_token(&mut self, _: BridgeMessage) {
        self.respond_push_token();
    }

    /// FCM_TOKEN_RESPONSE from the stored registration, registering first when
    /// nothing is stored. Empty on failure.
    pub(super) fn respond_push_token(&mut self) {
        let (token, device) = match self.tokens.get_push_registration() {
            Some(registration) => (Some(registration.push_token), registration.device),
            None => match self.initialize_push() {
                Some(token) => (Some(token), self.push.current_device().cloned()),
                None => (None, None),
            },
        };
        self.bridge
            .send_to_page(&BridgeMessage::push_token_response(token, device));
    }

    /// FCM_TOKEN_READY right at load completion, when a token is already known.
    pub(super) fn announce_push_token(&mut self) {
        let known = match (self.push.current_token(), self.push.current_device()) {
            (Some(token), Some(device)) => Some((token.to_string(), device.clone())),
            _ => self
                .tokens
                .get_push_registration()
                .and_then(|r| r.device.map(|device| (r.push_token, device))),
        };
        match known {
            Some((token, device)) => {
                self.bridge
                    .send_to_page(&BridgeMessage::push_token_ready(&token, &device));
            }
            None => tracing::debug!("page: no push token to announce"),
        }
    }

    fn on_navigate_to(&mut self, message: BridgeMessage) {
        match non_empty(message.url) {
            Some(url) => {
                self.bridge.navigate(&url);
            }
            None => tracing::warn!("page: NAVIGATE_TO without url; ignoring"),
        }
    }

    fn on_reload_page(&mut self, _: BridgeMessage) {
        self.bridge.reload();
    }
}
