use std::collections::HashMap;

use super::{BridgeMessage, MessageType};

pub type Handler<C> = fn(&mut C, BridgeMessage);

/// Message type -> handler table. Handlers are plain fn pointers so the caller
/// can look one up and then lend itself mutably to it.
pub struct Router<C> {
    handlers: HashMap<MessageType, Handler<C>>,
}

impl<C> Router<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn on(mut self, kind: MessageType, handler: Handler<C>) -> Self {
        if self.handlers.insert(kind, handler).is_some() {
            tracing::warn!(kind = kind.as_str(), "bridge: handler replaced");
        }
        self
    }

    pub fn handler(&self, kind: MessageType) -> Option<Handler<C>> {
        self.handlers.get(&kind).copied()
    }
}

impl<C> Default for Router<C> {
    fn default() -> Self {
        Self::new()
    }
}
