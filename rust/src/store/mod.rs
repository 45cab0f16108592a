//! Credential + push-registration persistence.

mod jwt;
mod secure_store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceDescriptor;

pub use jwt::is_token_expired;
#[cfg(test)]
pub(crate) use jwt::make_token;
#[cfg(test)]
pub(crate) use secure_store::MemorySecureStore;
pub use secure_store::{FileSecureStore, SecureStore};

pub(crate) const CREDENTIALS_SERVICE: &str = "PickupAppTokens";
pub(crate) const CREDENTIALS_ACCOUNT: &str = "user_tokens";
pub(crate) const PUSH_SERVICE: &str = "PickupAppFCMToken";
pub(crate) const PUSH_ACCOUNT: &str = "fcm_token";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("secure store {op} failed for {service}: {reason}")]
    Backend {
        op: &'static str,
        service: String,
        reason: String,
    },
    #[error("encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn backend(op: &'static str, service: &str, reason: impl ToString) -> Self {
        StoreError::Backend {
            op,
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRegistration {
    #[serde(rename = "fcmToken")]
    pub push_token: String,
    #[serde(rename = "deviceInfo", default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceDescriptor>,
    pub saved_at: DateTime<Utc>,
}

/// Single-tenant token storage: at most one credential pair and one push registration.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn SecureStore>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn SecureStore>) -> Self {
        Self { backend }
    }

    pub fn save_credentials(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        let pair = CredentialPair {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
        };
        let json = serde_json::to_string(&pair)?;
        self.backend
            .set(CREDENTIALS_SERVICE, CREDENTIALS_ACCOUNT, &json)
            .inspect_err(|e| tracing::error!(%e, "tokens: save failed"))?;
        tracing::info!("tokens: saved");
        Ok(())
    }

    /// Stored pair if its access token is still valid. Expired pairs are cleared.
    pub fn get_credentials(&self) -> Option<CredentialPair> {
        self.get_credentials_at(Utc::now().timestamp())
    }

    fn get_credentials_at(&self, now_secs: i64) -> Option<CredentialPair> {
        let pair = self.read_credentials()?;
        if is_token_expired(&pair.access_token, now_secs) {
            tracing::info!("tokens: stored access token expired; clearing");
            let _ = self.clear_credentials();
            return None;
        }
        Some(pair)
    }

    /// Presence check without the expiry side effect.
    pub fn has_credentials(&self) -> bool {
        self.read_credentials().is_some()
    }

    fn read_credentials(&self) -> Option<CredentialPair> {
        let raw = match self.backend.get(CREDENTIALS_SERVICE, CREDENTIALS_ACCOUNT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(%e, "tokens: load failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(pair) => Some(pair),
            Err(e) => {
                tracing::warn!(%e, "tokens: stored credentials unreadable");
                None
            }
        }
    }

    pub fn clear_credentials(&self) -> Result<(), StoreError> {
        self.backend
            .delete(CREDENTIALS_SERVICE, CREDENTIALS_ACCOUNT)
            .inspect_err(|e| tracing::error!(%e, "tokens: clear failed"))?;
        tracing::info!("tokens: cleared");
        Ok(())
    }

    pub fn save_push_registration(
        &self,
        push_token: &str,
        device: Option<&DeviceDescriptor>,
    ) -> Result<(), StoreError> {
        let registration = PushRegistration {
            push_token: push_token.to_string(),
            device: device.cloned(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string(&registration)?;
        self.backend
            .set(PUSH_SERVICE, PUSH_ACCOUNT, &json)
            .inspect_err(|e| tracing::error!(%e, "push registration: save failed"))?;
        tracing::info!(token = %token_prefix(push_token), "push registration: saved");
        Ok(())
    }

    pub fn get_push_registration(&self) -> Option<PushRegistration> {
        let raw = match self.backend.get(PUSH_SERVICE, PUSH_ACCOUNT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(%e, "push registration: load failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(registration) => Some(registration),
            Err(e) => {
                tracing::warn!(%e, "push registration: stored value unreadable");
                None
            }
        }
    }

    pub fn clear_push_registration(&self) -> Result<(), StoreError> {
        self.backend
            .delete(PUSH_SERVICE, PUSH_ACCOUNT)
            .inspect_err(|e| tracing::error!(%e, "push registration: clear failed"))?;
        tracing::info!("push registration: cleared");
        Ok(())
    }

    /// Clears both entries. Both clears always run; the first error wins.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let credentials = self.clear_credentials();
        let push = self.clear_push_registration();
        credentials.and(push)
    }
}

/// Log-safe prefix of a token.
pub(crate) fn token_prefix(token: &str) -> &str {
    match token.char_indices().nth(12) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}
