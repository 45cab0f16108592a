use crate::platform::RemotePush;

#[derive(uniffi::Enum, Debug, Clone)]
pub enum AppAction {
    // WebView lifecycle
    PageLoadStarted {
        url: String,
    },
    PageLoadFinished {
        url: String,
    },
    PageLoadFailed {
        description: String,
    },
    NavigationChanged {
        url: String,
        can_go_back: bool,
    },
    /// Raw string the page posted through `ReactNativeWebView.postMessage`.
    PageMessage {
        raw: String,
    },
    ShowPageAlert {
        title: String,
        message: String,
    },

    // Push
    InitializePush,
    RefreshPushToken,
    ClearPushToken,
    PushTokenRefreshed {
        token: String,
    },
    PushMessageReceived {
        push: RemotePush,
    },
    NotificationOpened {
        push: RemotePush,
    },

    // Session
    Logout,

    // Lifecycle
    Foregrounded,
}

impl AppAction {
    /// Log-safe action tag (never includes tokens or page payloads).
    pub fn tag(&self) -> &'static str {
        match self {
            // WebView lifecycle
            AppAction::PageLoadStarted { .. } => "PageLoadStarted",
            AppAction::PageLoadFinished { .. } => "PageLoadFinished",
            AppAction::PageLoadFailed { .. } => "PageLoadFailed",
            AppAction::NavigationChanged { .. } => "NavigationChanged",
            AppAction::PageMessage { .. } => "PageMessage",
            AppAction::ShowPageAlert { .. } => "ShowPageAlert",

            // Push
            AppAction::InitializePush => "InitializePush",
            AppAction::RefreshPushToken => "RefreshPushToken",
            AppAction::ClearPushToken => "ClearPushToken",
            AppAction::PushTokenRefreshed { .. } => "PushTokenRefreshed",
            AppAction::PushMessageReceived { .. } => "PushMessageReceived",
            AppAction::NotificationOpened { .. } => "NotificationOpened",

            // Session
            AppAction::Logout => "Logout",

            // Lifecycle
            AppAction::Foregrounded => "Foregrounded",
        }
    }
}
