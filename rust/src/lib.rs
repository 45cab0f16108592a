mod actions;
mod bridge;
mod core;
mod device;
mod logging;
mod platform;
mod push;
mod state;
mod store;
mod updates;

#[cfg(any(target_os = "android", target_os = "ios"))]
mod keyring_support;

#[cfg(target_os = "android")]
mod android_keyring;

#[cfg(test)]
mod testing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use actions::AppAction;
pub use bridge::{parse_page_message, BridgeError, BridgeMessage, MessageType};
pub use device::DeviceDescriptor;
pub use platform::*;
pub use push::PushRegistrationState;
pub use state::*;
pub use store::{is_token_expired, CredentialPair, StoreError};
pub use updates::*;

uniffi::setup_scaffolding!();

#[uniffi::export(callback_interface)]
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

#[derive(uniffi::Object)]
pub struct FfiApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
    web_view: bridge::SharedWebViewHost,
}

#[uniffi::export]
impl FfiApp {
    #[uniffi::constructor]
    pub fn new(
        data_dir: String,
        keychain_group: String,
        push_platform: Box<dyn PushPlatform>,
        device_info: Box<dyn DeviceInfoProvider>,
        notifications: Box<dyn NotificationPresenter>,
    ) -> Arc<Self> {
        logging::init_logging(&data_dir);
        tracing::info!(data_dir = %data_dir, "FfiApp::new() starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));
        let web_view: bridge::SharedWebViewHost = Arc::new(RwLock::new(None));

        let hooks = crate::core::PlatformHooks {
            web_view: web_view.clone(),
            push_platform: Arc::from(push_platform),
            device_info: Arc::from(device_info),
            notifications: Arc::from(notifications),
            secure_store: open_secure_store(&data_dir, &keychain_group),
        };

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        thread::spawn(move || {
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                data_dir,
                shared_for_core,
                hooks,
            );
            while let Ok(msg) = core_rx.recv() {
                if let CoreMsg::Shutdown = msg {
                    break;
                }
                core.handle_message(msg);
            }
            tracing::info!("core: stopped");
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
            web_view,
        })
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }

    pub fn attach_web_view(&self, host: Box<dyn WebViewHost>) {
        let host: Arc<dyn WebViewHost> = Arc::from(host);
        match self.web_view.write() {
            Ok(mut slot) => {
                *slot = Some(host);
            }
            Err(poison) => {
                *poison.into_inner() = Some(host);
            }
        }
    }

    /// Later sends are dropped until a view is attached again.
    pub fn detach_web_view(&self) {
        match self.web_view.write() {
            Ok(mut slot) => {
                *slot = None;
            }
            Err(poison) => {
                *poison.into_inner() = None;
            }
        }
    }
}

impl Drop for FfiApp {
    fn drop(&mut self) {
        // The core keeps a sender for its own timers, so the channel never
        // disconnects on its own.
        let _ = self.core_tx.send(CoreMsg::Shutdown);
    }
}

/// Platform keystore on mobile, JSON file in the data dir elsewhere (or when the
/// keystore cannot be opened).
fn open_secure_store(data_dir: &str, keychain_group: &str) -> Arc<dyn store::SecureStore> {
    #[cfg(any(target_os = "android", target_os = "ios"))]
    match keyring_support::KeyringSecureStore::new(keychain_group) {
        Ok(store) => return Arc::new(store),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "keyring unavailable; using file store")
        }
    }
    #[cfg(not(any(target_os = "android", target_os = "ios")))]
    let _ = keychain_group;

    Arc::new(store::FileSecureStore::new(data_dir))
}
