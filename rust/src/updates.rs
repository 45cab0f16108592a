use crate::state::AppState;
use crate::AppAction;

#[derive(uniffi::Enum, Clone, Debug)]
pub enum AppUpdate {
    /// The only update kind: native always reconciles against a full snapshot.
    FullState(AppState),
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
    /// Sent when `FfiApp` is dropped; ends the actor loop.
    Shutdown,
}

#[derive(Debug)]
pub enum InternalEvent {
    // Delayed injection after a page load; stale if `load_token` is not current.
    InjectInitialCredentials {
        load_token: u64,
    },
    InjectInitialPushToken {
        load_token: u64,
    },

    // Backend hand-off result (attempts used, or the final error).
    BackendRegistrationFinished {
        generation: u64,
        result: Result<u32, String>,
    },
}
