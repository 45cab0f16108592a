use crate::device::DeviceDescriptor;
use crate::push::PushRegistrationState;

/// Full snapshot handed to native on every change.
#[derive(uniffi::Record, Clone, Debug, PartialEq)]
pub struct AppState {
    pub rev: u64,
    /// Site the native WebView should load.
    pub web_url: String,
    pub user_agent: String,
    pub page: PageState,
    pub push: PushStatus,
    pub has_credentials: bool,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            web_url: String::new(),
            user_agent: String::new(),
            page: PageState::default(),
            push: PushStatus::default(),
            has_credentials: false,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, Default, PartialEq, Eq)]
pub struct PageState {
    /// Bridge accepts outgoing messages.
    pub ready: bool,
    pub loading: bool,
    pub current_url: Option<String>,
    pub can_go_back: bool,
    pub load_error: Option<String>,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct PushStatus {
    pub registration: PushRegistrationState,
    pub token: Option<String>,
    pub device: Option<DeviceDescriptor>,
    pub backend: BackendRegistration,
}

impl Default for PushStatus {
    fn default() -> Self {
        Self {
            registration: PushRegistrationState::Uninitialized,
            token: None,
            device: None,
            backend: BackendRegistration::Idle,
        }
    }
}

/// Outcome of handing the push token to the application backend.
#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum BackendRegistration {
    Idle,
    /// No registration URL configured, or networking disabled.
    Disabled,
    Pending,
    Registered { attempts: u32 },
    Failed { error: String },
}
