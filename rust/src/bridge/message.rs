// Wire envelope shared by both directions of the bridge.

use serde::{Deserialize, Serialize};

use crate::device::DeviceDescriptor;
use crate::store::CredentialPair;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    // Page -> native
    SaveTokens,
    ClearTokens,
    RequestTokens,
    SaveFcmToken,
    ClearFcmToken,
    RequestFcmToken,
    NavigateTo,
    ReloadPage,

    // Native -> page
    TokenResponse,
    FcmTokenResponse,
    FcmTokenReady,
    ShowAlert,
}

impl MessageType {
    pub const ALL: [MessageType; 12] = [
        MessageType::SaveTokens,
        MessageType::ClearTokens,
        MessageType::RequestTokens,
        MessageType::SaveFcmToken,
        MessageType::ClearFcmToken,
        MessageType::RequestFcmToken,
        MessageType::NavigateTo,
        MessageType::ReloadPage,
        MessageType::TokenResponse,
        MessageType::FcmTokenResponse,
        MessageType::FcmTokenReady,
        MessageType::ShowAlert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::SaveTokens => "SAVE_TOKENS",
            MessageType::ClearTokens => "CLEAR_TOKENS",
            MessageType::RequestTokens => "REQUEST_TOKENS",
            MessageType::SaveFcmToken => "SAVE_FCM_TOKEN",
            MessageType::ClearFcmToken => "CLEAR_FCM_TOKEN",
            MessageType::RequestFcmToken => "REQUEST_FCM_TOKEN",
            MessageType::NavigateTo => "NAVIGATE_TO",
            MessageType::ReloadPage => "RELOAD_PAGE",
            MessageType::TokenResponse => "TOKEN_RESPONSE",
            MessageType::FcmTokenResponse => "FCM_TOKEN_RESPONSE",
            MessageType::FcmTokenReady => "FCM_TOKEN_READY",
            MessageType::ShowAlert => "SHOW_ALERT",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(alias = "pushToken", skip_serializing_if = "Option::is_none")]
    pub fcm_token: Option<String>,
    #[serde(alias = "deviceDescriptor", skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl BridgeMessage {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            access_token: None,
            refresh_token: None,
            fcm_token: None,
            device_info: None,
            url: None,
            title: None,
            message: None,
            data: None,
        }
    }

    /// `TOKEN_RESPONSE`; no token fields when `credentials` is `None`.
    pub fn token_response(credentials: Option<CredentialPair>) -> Self {
        let mut msg = Self::new(MessageType::TokenResponse);
        if let Some(pair) = credentials {
            msg.access_token = Some(pair.access_token);
            msg.refresh_token = pair.refresh_token;
        }
        msg
    }

    pub fn push_token_response(token: Option<String>, device: Option<DeviceDescriptor>) -> Self {
        let mut msg = Self::new(MessageType::FcmTokenResponse);
        msg.fcm_token = token;
        msg.device_info = device;
        msg
    }

    pub fn push_token_ready(token: &str, device: &DeviceDescriptor) -> Self {
        let mut msg = Self::new(MessageType::FcmTokenReady);
        msg.data = Some(serde_json::json!({
            "token": token,
            "deviceInfo": device,
            "platform": device.device_type,
        }));
        msg
    }

    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageType::ShowAlert);
        msg.title = Some(title.into());
        msg.message = Some(message.into());
        msg
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("malformed page message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("page message has no string `type`")]
    MissingType,
    #[error("unknown page message type {0:?}")]
    UnknownType(String),
}

/// Parse raw JSON posted by the page.
pub fn parse_page_message(raw: &str) -> Result<BridgeMessage, BridgeError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(BridgeError::MissingType)?;
    if MessageType::from_wire(kind).is_none() {
        return Err(BridgeError::UnknownType(kind.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}
