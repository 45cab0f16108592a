//! WebView message bridge: script injection out, posted JSON in.

mod message;
mod router;
pub(crate) mod script;

use std::sync::{Arc, RwLock};

use crate::platform::WebViewHost;

pub use message::{parse_page_message, BridgeError, BridgeMessage, MessageType};
pub use router::Router;

/// Slot for the WebView, filled by the shell once the view exists.
pub type SharedWebViewHost = Arc<RwLock<Option<Arc<dyn WebViewHost>>>>;

/// Delivery is best effort: nothing is queued while the page is not ready, and
/// an injected script cannot be withdrawn.
pub struct BridgeTransport {
    host: SharedWebViewHost,
    ready: bool,
}

impl BridgeTransport {
    pub fn new(host: SharedWebViewHost) -> Self {
        Self { host, ready: false }
    }

    pub fn mark_ready(&mut self, ready: bool) {
        if ready != self.ready {
            tracing::info!(ready, "bridge: page ready changed");
        }
        self.ready = ready;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn host(&self) -> Option<Arc<dyn WebViewHost>> {
        match self.host.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    /// Host to inject into, if the page can take it right now.
    fn ready_host(&self, what: &str) -> Option<Arc<dyn WebViewHost>> {
        if !self.ready {
            tracing::warn!(what, "bridge: page not ready; dropping");
            return None;
        }
        let host = self.host();
        if host.is_none() {
            tracing::warn!(what, "bridge: no web view attached; dropping");
        }
        host
    }

    /// Returns whether a script was injected.
    pub fn send_to_page(&self, message: &BridgeMessage) -> bool {
        let kind = message.kind.as_str();
        let Some(host) = self.ready_host(kind) else {
            return false;
        };
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(%e, kind, "bridge: encode failed");
                return false;
            }
        };
        host.inject_script(script::deliver_message(&json));
        tracing::debug!(kind, "bridge: sent to page");
        true
    }

    /// Parse a message posted by the page. Bad input is logged and dropped.
    pub fn on_page_message(&self, raw: &str) -> Option<BridgeMessage> {
        match parse_page_message(raw) {
            Ok(message) => {
                tracing::debug!(kind = message.kind.as_str(), "bridge: received from page");
                Some(message)
            }
            Err(BridgeError::UnknownType(kind)) => {
                tracing::warn!(kind = %kind, "bridge: ignoring unknown message type");
                None
            }
            Err(e) => {
                tracing::warn!(%e, len = raw.len(), "bridge: dropping page message");
                None
            }
        }
    }

    pub fn navigate(&self, url: &str) -> bool {
        let Some(host) = self.ready_host("navigate") else {
            return false;
        };
        host.inject_script(script::navigate(url));
        tracing::info!(url, "bridge: navigating page");
        true
    }

    pub fn reload(&self) -> bool {
        let Some(host) = self.ready_host("reload") else {
            return false;
        };
        host.reload();
        tracing::info!("bridge: reloading page");
        true
    }
}
