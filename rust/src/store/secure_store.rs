// Service-scoped secret storage backends.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

use super::StoreError;

const FILE_STORE_NAME: &str = "secure_store.json";

/// Key/value secret storage scoped by `(service, account)`.
///
/// `delete` of a missing entry must succeed.
pub trait SecureStore: Send + Sync {
    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), StoreError>;
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, StoreError>;
    fn delete(&self, service: &str, account: &str) -> Result<(), StoreError>;
}

/// Desktop/dev: JSON file next to the rest of the app data, owner-only permissions.
///
/// Mobile builds use the platform keystore via [`crate::keyring_support`].
pub struct FileSecureStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSecureStore {
    pub fn new(data_dir: &str) -> Self {
        Self {
            path: Path::new(data_dir).join(FILE_STORE_NAME),
            lock: Mutex::new(()),
        }
    }

    fn entry_key(service: &str, account: &str) -> String {
        format!("{service}/{account}")
    }

    fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read(&self.path)
            .with_context(|| format!("read secure store: {}", self.path.display()))?;
        if raw.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&raw)
            .with_context(|| format!("parse secure store: {}", self.path.display()))
    }

    /// Replace the file in one rename; the temp file is owner-only from creation.
    fn save(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let json = serde_json::to_vec(entries).context("encode secure store")?;
        let tmp = self.path.with_extension("tmp");
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&tmp)
            .with_context(|| format!("open secure store temp: {}", tmp.display()))?;
        file.write_all(&json)
            .and_then(|()| file.sync_all())
            .with_context(|| format!("write secure store temp: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace secure store: {}", self.path.display()))?;
        Ok(())
    }

    fn update(
        &self,
        op: &'static str,
        service: &str,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut entries = self
            .load()
            .map_err(|e| StoreError::backend(op, service, format!("{e:#}")))?;
        if f(&mut entries) {
            self.save(&entries)
                .map_err(|e| StoreError::backend(op, service, format!("{e:#}")))?;
        }
        Ok(())
    }
}

impl SecureStore for FileSecureStore {
    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), StoreError> {
        let key = Self::entry_key(service, account);
        self.update("set", service, |entries| {
            entries.insert(key, secret.to_string());
            true
        })
    }

    fn get(&self, service: &str, account: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let entries = self
            .load()
            .map_err(|e| StoreError::backend("get", service, format!("{e:#}")))?;
        Ok(entries.get(&Self::entry_key(service, account)).cloned())
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), StoreError> {
        let key = Self::entry_key(service, account);
        self.update("delete", service, |entries| entries.remove(&key).is_some())
    }
}

#[cfg(test)]
pub(crate) use memory::MemorySecureStore;
