mod config;
mod page;
mod push;

use std::sync::{Arc, RwLock};

use flume::{Receiver, Sender};

use crate::actions::AppAction;
use crate::bridge::{BridgeTransport, Router, SharedWebViewHost};
use crate::device::load_or_create_install_id;
use crate::platform::{DeviceInfoProvider, NotificationPresenter, PushPlatform};
use crate::push::{PushRegistrationManager, PushTokenUpdate};
use crate::state::{AppState, BackendRegistration};
use crate::store::{SecureStore, TokenStore};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

use config::AppConfig;

/// Everything the core reaches through the host app.
pub struct PlatformHooks {
    pub web_view: SharedWebViewHost,
    pub push_platform: Arc<dyn PushPlatform>,
    pub device_info: Arc<dyn DeviceInfoProvider>,
    pub notifications: Arc<dyn NotificationPresenter>,
    pub secure_store: Arc<dyn SecureStore>,
}

pub struct AppCore {
    pub state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    config: AppConfig,
    runtime: tokio::runtime::Runtime,
    http_client: reqwest::Client,

    bridge: BridgeTransport,
    router: Router<AppCore>,
    tokens: TokenStore,
    push: PushRegistrationManager,
    push_updates: Receiver<PushTokenUpdate>,

    // Bumped on every page load start/finish; delayed injections carry the value
    // they were scheduled with and are dropped when it no longer matches.
    page_load_token: u64,
    // Bumped per backend hand-off so a stale result never overwrites a newer one.
    backend_generation: u64,
    pending_deep_link: Option<String>,
}

impl AppCore {
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<AppState>>,
        hooks: PlatformHooks,
    ) -> Self {
        let config = config::load_app_config(&data_dir);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        let install_id = load_or_create_install_id(&data_dir);
        let tokens = TokenStore::new(hooks.secure_store);
        let mut push = PushRegistrationManager::new(
            hooks.push_platform,
            hooks.device_info,
            hooks.notifications,
            tokens.clone(),
            install_id,
        );
        let push_updates = push.subscribe();

        let mut state = AppState::empty();
        state.web_url = config.web_url();
        state.user_agent = config.user_agent();
        state.has_credentials = tokens.has_credentials();
        if config.push_registration_url().is_none() {
            state.push.backend = BackendRegistration::Disabled;
        }

        tracing::info!(
            web_url = %state.web_url,
            backend = config.push_registration_url().is_some(),
            "core: started"
        );

        let mut this = Self {
            state,
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            config,
            runtime,
            http_client: reqwest::Client::new(),
            bridge: BridgeTransport::new(hooks.web_view),
            router: page::page_router(),
            tokens,
            push,
            push_updates,
            page_load_token: 0,
            backend_generation: 0,
            pending_deep_link: None,
        };
        this.emit_state();
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    /// Copy service-owned facts into the snapshot.
    fn sync_service_state(&mut self) {
        self.state.page.ready = self.bridge.is_ready();
        self.state.has_credentials = self.tokens.has_credentials();
        self.state.push.registration = self.push.state();
        self.state.push.token = self.push.current_token().map(str::to_string);
        self.state.push.device = self.push.current_device().cloned();
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        let before = self.state.clone();
        match msg {
            CoreMsg::Action(action) => {
                // Never log `?action` directly: page payloads carry tokens.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action);
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
            // Consumed by the actor loop before it gets here.
            CoreMsg::Shutdown => {}
        }
        self.forward_push_updates();
        self.sync_service_state();
        if self.state != before {
            self.emit_state();
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::InjectInitialCredentials { load_token } => {
                if load_token == self.page_load_token {
                    self.respond_tokens();
                } else {
                    tracing::debug!(load_token, "page: stale credential injection dropped");
                }
            }
            InternalEvent::InjectInitialPushToken { load_token } => {
                if load_token == self.page_load_token {
                    self.respond_push_token();
                } else {
                    tracing::debug!(load_token, "page: stale push injection dropped");
                }
            }
            InternalEvent::BackendRegistrationFinished { generation, result } => {
                self.handle_backend_registration_finished(generation, result)
            }
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            // WebView lifecycle
            AppAction::PageLoadStarted { url } => self.handle_page_load_started(url),
            AppAction::PageLoadFinished { url } => self.handle_page_load_finished(url),
            AppAction::PageLoadFailed { description } => {
                self.handle_page_load_failed(description)
            }
            AppAction::NavigationChanged { url, can_go_back } => {
                self.state.page.current_url = Some(url);
                self.state.page.can_go_back = can_go_back;
            }
            AppAction::PageMessage { raw } => {
                if let Some(message) = self.bridge.on_page_message(&raw) {
                    self.route_page_message(message);
                }
            }
            AppAction::ShowPageAlert { title, message } => {
                self.bridge
                    .send_to_page(&crate::bridge::BridgeMessage::alert(title, message));
            }

            // Push
            AppAction::InitializePush => {
                self.initialize_push();
            }
            AppAction::RefreshPushToken => {
                self.push.refresh_token();
            }
            AppAction::ClearPushToken => self.clear_push_token(),
            AppAction::PushTokenRefreshed { token } => self.push.handle_token_refresh(token),
            AppAction::PushMessageReceived { push } => self.push.handle_foreground_message(push),
            AppAction::NotificationOpened { push } => self.open_notification(push),

            // Session
            AppAction::Logout => self.logout(),

            // Lifecycle
            AppAction::Foregrounded => self.handle_foregrounded(),
        }
    }

    fn logout(&mut self) {
        if let Err(e) = self.tokens.clear_all() {
            tracing::warn!(%e, "logout: stored tokens not fully cleared");
        }
        self.push.reset_cache();
        self.cancel_backend_registration();
        self.pending_deep_link = None;
    }

    fn handle_foregrounded(&mut self) {
        // Notification permission may have been revoked from system settings.
        if self.push.state() == crate::push::PushRegistrationState::Registered
            && !self.push.check_token_status()
        {
            tracing::info!("push: permission lost while backgrounded");
            self.push.reset_cache();
        }
    }

    /// Token refreshes observed since the last message go to the page and the backend.
    fn forward_push_updates(&mut self) {
        while let Ok(update) = self.push_updates.try_recv() {
            self.bridge
                .send_to_page(&crate::bridge::BridgeMessage::push_token_response(
                    Some(update.token.clone()),
                    Some(update.device.clone()),
                ));
            self.register_with_backend(&update.token, &update.device);
        }
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::*;
    use crate::platform::{RemotePush, WebViewHost};
    use crate::push::PushRegistrationState;
    use crate::store::{make_token, MemorySecureStore, CREDENTIALS_ACCOUNT, CREDENTIALS_SERVICE};
    use crate::testing::{FakeDeviceInfo, FakePushPlatform, FakeWebView, RecordingPresenter};

    struct Harness {
        core: AppCore,
        core_rx: Receiver<CoreMsg>,
        update_rx: Receiver<AppUpdate>,
        view: Arc<FakeWebView>,
        platform: Arc<FakePushPlatform>,
        presenter: Arc<RecordingPresenter>,
        store: Arc<MemorySecureStore>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn act(&mut self, action: AppAction) {
            self.core.handle_message(CoreMsg::Action(action));
        }

        fn post(&mut self, message: Value) {
            self.act(AppAction::PageMessage {
                raw: message.to_string(),
            });
        }

        /// Feed `n` scheduled internal events back into the actor.
        fn pump(&mut self, n: usize) {
            for _ in 0..n {
                let msg = self
                    .core_rx
                    .recv_timeout(Duration::from_secs(5))
                    .expect("internal event");
                self.core.handle_message(msg);
            }
        }

        fn load_page(&mut self) {
            self.act(AppAction::PageLoadFinished {
                url: "https://app.example.com/".into(),
            });
            self.pump(2);
        }

        fn sent_of(&self, kind: &str) -> Vec<Value> {
            self.view
                .messages()
                .into_iter()
                .filter(|m| m["type"] == kind)
                .collect()
        }
    }

    fn offline_config() -> Value {
        json!({
            "disable_network": true,
            "initial_tokens_delay_ms": 0,
            "initial_push_delay_ms": 0
        })
    }

    fn make_core_with(platform: FakePushPlatform, config: Value) -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(config::CONFIG_FILE_NAME), config.to_string())
            .expect("write config");
        let data_dir = dir.path().to_string_lossy().into_owned();

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded();
        let view = Arc::new(FakeWebView::default());
        let host: Arc<dyn WebViewHost> = view.clone();
        let platform = Arc::new(platform);
        let presenter = Arc::new(RecordingPresenter::default());
        let store = Arc::new(MemorySecureStore::default());

        let core = AppCore::new(
            update_tx,
            core_tx,
            data_dir,
            Arc::new(RwLock::new(AppState::empty())),
            PlatformHooks {
                web_view: Arc::new(RwLock::new(Some(host))),
                push_platform: platform.clone(),
                device_info: Arc::new(FakeDeviceInfo),
                notifications: presenter.clone(),
                secure_store: store.clone(),
            },
        );
        Harness {
            core,
            core_rx,
            update_rx,
            view,
            platform,
            presenter,
            store,
            _dir: dir,
        }
    }

    fn make_core() -> Harness {
        make_core_with(FakePushPlatform::granting(), offline_config())
    }

    fn live_token() -> String {
        make_token(json!({"exp": chrono::Utc::now().timestamp() + 3600}))
    }

    #[test]
    fn initial_state_is_published() {
        let h = make_core();
        let update = h.update_rx.try_recv().expect("initial snapshot");
        assert_eq!(update.rev(), 1);
        assert_eq!(h.core.state.push.backend, BackendRegistration::Disabled);
        assert!(h.core.state.user_agent.contains("WebViewShell Mobile"));
        assert!(!h.core.state.page.ready);
    }

    #[test]
    fn request_tokens_with_nothing_stored_sends_empty_response() {
        let mut h = make_core();
        h.load_page();
        h.post(json!({"type": "REQUEST_TOKENS"}));
        let responses = h.sent_of("TOKEN_RESPONSE");
        // One from the initial injection, one for the request.
        assert_eq!(responses.len(), 2);
        for r in responses {
            assert_eq!(r, json!({"type": "TOKEN_RESPONSE"}));
        }
    }

    #[test]
    fn saved_tokens_come_back_on_request() {
        let mut h = make_core();
        let access = live_token();
        h.load_page();
        h.post(json!({"type": "SAVE_TOKENS", "accessToken": access, "refreshToken": "r-1"}));
        assert!(h.core.state.has_credentials);

        h.post(json!({"type": "REQUEST_TOKENS"}));
        let last = h.sent_of("TOKEN_RESPONSE").pop().unwrap();
        assert_eq!(
            last,
            json!({"type": "TOKEN_RESPONSE", "accessToken": access, "refreshToken": "r-1"})
        );
    }

    #[test]
    fn expired_tokens_are_cleared_before_responding() {
        let mut h = make_core();
        let expired = make_token(json!({"exp": 1_000}));
        h.post(json!({"type": "SAVE_TOKENS", "accessToken": expired}));
        assert!(h.store.raw(CREDENTIALS_SERVICE, CREDENTIALS_ACCOUNT).is_some());

        h.load_page();
        assert_eq!(
            h.sent_of("TOKEN_RESPONSE"),
            vec![json!({"type": "TOKEN_RESPONSE"})]
        );
        assert_eq!(h.store.raw(CREDENTIALS_SERVICE, CREDENTIALS_ACCOUNT), None);
        assert!(!h.core.state.has_credentials);
    }

    #[test]
    fn save_tokens_without_access_token_is_ignored() {
        let mut h = make_core();
        h.post(json!({"type": "SAVE_TOKENS", "refreshToken": "r-only"}));
        assert!(!h.core.state.has_credentials);
    }

    #[test]
    fn clear_tokens_keeps_push_registration() {
        let mut h = make_core();
        h.post(json!({"type": "SAVE_TOKENS", "accessToken": live_token()}));
        h.post(json!({"type": "SAVE_FCM_TOKEN", "fcmToken": "page-token"}));
        h.post(json!({"type": "CLEAR_TOKENS"}));
        assert!(!h.core.state.has_credentials);
        assert_eq!(
            h.core.tokens.get_push_registration().map(|r| r.push_token),
            Some("page-token".to_string())
        );
    }

    #[test]
    fn unknown_message_changes_nothing() {
        let mut h = make_core();
        h.load_page();
        while h.update_rx.try_recv().is_ok() {}
        let before = h.core.state.clone();
        let scripts = h.view.scripts().len();

        h.post(json!({"type": "DELETE_EVERYTHING"}));
        h.act(AppAction::PageMessage {
            raw: "not json".into(),
        });
        h.post(json!({"type": "TOKEN_RESPONSE"}));

        assert_eq!(h.core.state, before);
        assert_eq!(h.view.scripts().len(), scripts);
        assert!(h.update_rx.try_recv().is_err());
    }

    #[test]
    fn nothing_is_injected_before_page_load() {
        let mut h = make_core();
        h.post(json!({"type": "REQUEST_TOKENS"}));
        h.act(AppAction::ShowPageAlert {
            title: "t".into(),
            message: "m".into(),
        });
        assert!(h.view.scripts().is_empty());
    }

    #[test]
    fn page_load_announces_cached_push_token() {
        let mut h = make_core();
        h.act(AppAction::InitializePush);
        assert_eq!(h.core.state.push.registration, PushRegistrationState::Registered);
        assert_eq!(h.core.state.push.token.as_deref(), Some("token-1"));

        h.load_page();
        let ready = h.sent_of("FCM_TOKEN_READY");
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0]["data"]["token"], "token-1");
        assert_eq!(ready[0]["data"]["platform"], "android");
        assert_eq!(ready[0]["data"]["deviceInfo"]["model"], "Pixel 8");
    }

    #[test]
    fn first_page_load_fetches_and_delivers_push_token() {
        let mut h = make_core();
        h.load_page();

        assert_eq!(h.platform.fetches.load(std::sync::atomic::Ordering::SeqCst), 1);
        let responses = h.sent_of("FCM_TOKEN_RESPONSE");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["fcmToken"], "token-1");
        assert_eq!(responses[0]["deviceInfo"]["deviceType"], "android");
        assert!(h.sent_of("FCM_TOKEN_READY").is_empty());
        assert_eq!(h.core.state.push.registration, PushRegistrationState::Registered);
        assert_eq!(h.core.state.push.token.as_deref(), Some("token-1"));
    }

    #[test]
    fn page_saved_push_token_replaces_cached_one() {
        let mut h = make_core();
        h.act(AppAction::InitializePush);
        h.post(json!({"type": "SAVE_FCM_TOKEN", "fcmToken": "page-token"}));
        assert_eq!(h.core.state.push.token.as_deref(), Some("page-token"));

        h.load_page();
        h.post(json!({"type": "REQUEST_FCM_TOKEN"}));

        let ready = h.sent_of("FCM_TOKEN_READY");
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0]["data"]["token"], "page-token");
        let responses = h.sent_of("FCM_TOKEN_RESPONSE");
        assert_eq!(responses.len(), 2);
        for response in responses {
            assert_eq!(response["fcmToken"], "page-token");
            assert_eq!(response["deviceInfo"], ready[0]["data"]["deviceInfo"]);
        }
        assert_eq!(h.platform.fetches.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_injections_are_dropped() {
        let mut h = make_core();
        h.act(AppAction::PageLoadFinished {
            url: "https://app.example.com/a".into(),
        });
        h.act(AppAction::PageLoadStarted {
            url: "https://app.example.com/b".into(),
        });
        h.pump(2);
        assert!(h.view.scripts().is_empty());
        assert!(h.core.state.page.loading);
    }

    #[test]
    fn request_push_token_registers_when_nothing_stored() {
        let mut h = make_core();
        h.load_page();
        h.post(json!({"type": "REQUEST_FCM_TOKEN"}));

        let response = h.sent_of("FCM_TOKEN_RESPONSE").pop().unwrap();
        assert_eq!(response["fcmToken"], "token-1");
        assert_eq!(response["deviceInfo"]["deviceType"], "android");
        assert_eq!(h.core.state.push.registration, PushRegistrationState::Registered);
    }

    #[test]
    fn request_push_token_prefers_stored_registration() {
        let mut h = make_core();
        h.post(json!({"type": "SAVE_FCM_TOKEN", "pushToken": "stored-token"}));
        h.load_page();
        h.post(json!({"type": "REQUEST_FCM_TOKEN"}));

        let response = h.sent_of("FCM_TOKEN_RESPONSE").pop().unwrap();
        assert_eq!(response, json!({"type": "FCM_TOKEN_RESPONSE", "fcmToken": "stored-token"}));
        assert_eq!(h.platform.fetches.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn request_push_token_with_permission_denied_sends_empty_response() {
        let mut h = make_core_with(FakePushPlatform::denying(), offline_config());
        h.load_page();
        h.post(json!({"type": "REQUEST_FCM_TOKEN"}));
        assert_eq!(
            h.sent_of("FCM_TOKEN_RESPONSE"),
            vec![json!({"type": "FCM_TOKEN_RESPONSE"}); 2]
        );
        assert_eq!(h.core.state.push.registration, PushRegistrationState::Failed);
        assert_eq!(h.core.state.push.token, None);
    }

    #[test]
    fn refreshed_token_is_forwarded_to_page() {
        let mut h = make_core();
        h.load_page();
        h.act(AppAction::PushTokenRefreshed {
            token: "rotated".into(),
        });
        let responses = h.sent_of("FCM_TOKEN_RESPONSE");
        // The load injection, then the refresh.
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["fcmToken"], "token-1");
        assert_eq!(responses[1]["fcmToken"], "rotated");
        assert_eq!(responses[1]["deviceInfo"]["deviceId"], h.core.state.push.device.as_ref().unwrap().device_id);
    }

    #[test]
    fn clear_push_token_from_page_resets_registration() {
        let mut h = make_core();
        h.act(AppAction::InitializePush);
        h.post(json!({"type": "CLEAR_FCM_TOKEN"}));
        assert_eq!(h.core.state.push.registration, PushRegistrationState::Uninitialized);
        assert_eq!(h.core.state.push.token, None);
        assert_eq!(h.core.tokens.get_push_registration(), None);
        assert_eq!(h.platform.deletes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn navigate_and_reload_requests_reach_the_web_view() {
        let mut h = make_core();
        h.load_page();
        h.post(json!({"type": "NAVIGATE_TO", "url": "https://app.example.com/orders"}));
        h.post(json!({"type": "NAVIGATE_TO"}));
        h.post(json!({"type": "RELOAD_PAGE"}));
        let navigations: Vec<_> = h
            .view
            .scripts()
            .into_iter()
            .filter(|s| s.starts_with("window.location.href"))
            .collect();
        assert_eq!(navigations.len(), 1);
        assert!(navigations[0].contains("https://app.example.com/orders"));
        assert_eq!(h.view.reloads(), 1);
    }

    #[test]
    fn foreground_push_is_presented_natively_only() {
        let mut h = make_core();
        h.load_page();
        let scripts = h.view.scripts().len();
        h.act(AppAction::PushMessageReceived {
            push: RemotePush {
                title: Some("Order ready".into()),
                body: Some("Table 4".into()),
                ..RemotePush::default()
            },
        });
        let shown = h.presenter.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Order ready");
        assert_eq!(h.view.scripts().len(), scripts);
    }

    #[test]
    fn deep_link_waits_for_page_load() {
        let mut h = make_core();
        let mut push = RemotePush::default();
        push.data
            .insert("url".into(), "https://app.example.com/orders/9".into());
        h.act(AppAction::NotificationOpened { push });
        assert!(h.view.scripts().is_empty());

        h.load_page();
        let scripts = h.view.scripts();
        assert!(scripts[0].contains("https://app.example.com/orders/9"));
        assert!(h.core.pending_deep_link.is_none());
    }

    #[test]
    fn logout_clears_everything() {
        let mut h = make_core();
        h.post(json!({"type": "SAVE_TOKENS", "accessToken": live_token()}));
        h.act(AppAction::InitializePush);
        h.act(AppAction::Logout);
        assert!(!h.core.state.has_credentials);
        assert_eq!(h.core.state.push.token, None);
        assert_eq!(h.core.tokens.get_push_registration(), None);
    }

    #[test]
    fn foreground_drops_registration_when_permission_revoked() {
        let mut h = make_core();
        h.act(AppAction::InitializePush);
        h.platform
            .set_permission(Ok(crate::platform::PermissionStatus::Denied));
        h.act(AppAction::Foregrounded);
        assert_eq!(h.core.state.push.registration, PushRegistrationState::Uninitialized);
    }

    #[test]
    fn stale_backend_results_are_ignored() {
        let mut h = make_core_with(
            FakePushPlatform::granting(),
            json!({"push_registration_url": "http://127.0.0.1:9/register"}),
        );
        h.core.backend_generation = 2;
        h.core.state.push.backend = BackendRegistration::Pending;

        h.core.handle_message(CoreMsg::Internal(Box::new(
            InternalEvent::BackendRegistrationFinished {
                generation: 1,
                result: Ok(1),
            },
        )));
        assert_eq!(h.core.state.push.backend, BackendRegistration::Pending);

        h.core.handle_message(CoreMsg::Internal(Box::new(
            InternalEvent::BackendRegistrationFinished {
                generation: 2,
                result: Err("gave up".into()),
            },
        )));
        assert_eq!(
            h.core.state.push.backend,
            BackendRegistration::Failed {
                error: "gave up".into()
            }
        );
    }

    #[test]
    fn every_change_bumps_rev() {
        let mut h = make_core();
        while h.update_rx.try_recv().is_ok() {}
        h.act(AppAction::NavigationChanged {
            url: "https://app.example.com/x".into(),
            can_go_back: true,
        });
        let update = h.update_rx.try_recv().expect("snapshot");
        assert_eq!(update.rev(), 2);
        assert!(h.core.state.page.can_go_back);
    }
}
