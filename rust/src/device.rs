// Device metadata sent alongside the push token.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::platform::PlatformInfo;

const INSTALL_ID_FILE: &str = "install_id.txt";

#[derive(uniffi::Record, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceDescriptor {
    pub device_id: String,
    pub device_type: String,
    pub device_info: String,
    pub app_version: String,
    pub os_version: String,
    pub brand: String,
    pub model: String,
}

impl DeviceDescriptor {
    pub fn from_platform(info: PlatformInfo, install_id: &str) -> Self {
        let device_info = format!(
            "{} {} ({} {})",
            info.os_name, info.os_version, info.brand, info.model
        );
        Self {
            device_id: install_id.to_string(),
            device_type: info.platform,
            device_info,
            app_version: info.app_version,
            os_version: info.os_version,
            brand: info.brand,
            model: info.model,
        }
    }
}

/// Stable per-install identifier. Survives restarts, not reinstalls.
pub fn load_or_create_install_id(data_dir: &str) -> String {
    let path = Path::new(data_dir).join(INSTALL_ID_FILE);
    if let Ok(id) = std::fs::read_to_string(&path) {
        let id = id.trim().to_string();
        if !id.is_empty() {
            return id;
        }
    }
    let id = uuid::Uuid::new_v4().to_string();
    if let Err(e) = std::fs::write(&path, &id) {
        tracing::warn!(%e, path = %path.display(), "failed to persist install id");
    }
    id
}
