//! Platform keystore backend for the token store (iOS keychain, Android keystore).

#![cfg(any(target_os = "android", target_os = "ios"))]

use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use keyring_core::Entry;

use crate::store::{SecureStore, StoreError};

pub fn init_keyring_once(#[allow(unused)] keychain_group: &str) -> Result<()> {
    static INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    match INIT.get_or_init(|| init_keyring_inner(keychain_group).map_err(|e| e.to_string())) {
        Ok(()) => Ok(()),
        Err(e) => Err(anyhow!(e.clone())),
    }
}

fn init_keyring_inner(#[allow(unused)] keychain_group: &str) -> Result<()> {
    // `set_default_store` can only be called once per process; guarded by `INIT`.
    #[cfg(target_os = "ios")]
    {
        let mut config = std::collections::HashMap::new();
        if !keychain_group.is_empty() {
            config.insert("access-group", keychain_group);
        }
        let store = apple_native_keyring_store::protected::Store::new_with_configuration(&config)
            .context("failed to create Apple protected keyring store")?;
        keyring_core::set_default_store(store);
        return Ok(());
    }

    #[cfg(target_os = "android")]
    {
        use android_native_keyring_store::credential::AndroidStore;

        let store = AndroidStore::from_ndk_context().context(
            "Android keyring store not initialized. Call Keyring.init(context) early in MainActivity.",
        )?;
        keyring_core::set_default_store(store);
        Ok(())
    }
}

pub struct KeyringSecureStore;

impl KeyringSecureStore {
    pub fn new(keychain_group: &str) -> Result<Self> {
        init_keyring_once(keychain_group)?;
        Ok(Self)
    }

    fn entry(op: &'static str, service: &str, account: &str) -> Result<Entry, StoreError> {
        Entry::new(service, account).map_err(|e| StoreError::backend(op, service, e))
    }
}

impl SecureStore for KeyringSecureStore {
    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), StoreError> {
        Self::entry("set", service, account)?
            .set_password(secret)
            .map_err(|e| StoreError::backend("set", service, e))
    }

    fn get(&self, service: &str, account: &str) -> Result<Option<String>, StoreError> {
        match Self::entry("get", service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring_core::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::backend("get", service, e)),
        }
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), StoreError> {
        match Self::entry("delete", service, account)?.delete_credential() {
            Ok(()) | Err(keyring_core::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::backend("delete", service, e)),
        }
    }
}
