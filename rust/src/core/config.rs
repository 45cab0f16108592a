// `pickup_config.json` in the data dir, with env overrides on top.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::push::RetryPolicy;

pub(crate) const CONFIG_FILE_NAME: &str = "pickup_config.json";

const DEFAULT_WEB_URL: &str = "https://www.ezpickup.kr/bizes";
const DEFAULT_PUSH_REGISTRATION_URL: &str = "https://api.ezpickup.kr/api/v1/fcm-token";
const DEFAULT_INITIAL_TOKENS_DELAY_MS: u64 = 500;
const DEFAULT_INITIAL_PUSH_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub web_url: Option<String>,
    /// Empty string disables the backend hand-off.
    pub push_registration_url: Option<String>,
    pub disable_network: Option<bool>,
    pub initial_tokens_delay_ms: Option<u64>,
    pub initial_push_delay_ms: Option<u64>,
    pub registration_max_attempts: Option<u32>,
    pub registration_retry_delay_ms: Option<u64>,
    pub user_agent: Option<String>,
}

impl AppConfig {
    pub fn web_url(&self) -> String {
        non_empty(self.web_url.as_deref())
            .unwrap_or(DEFAULT_WEB_URL)
            .to_string()
    }

    /// `None` when the hand-off is switched off.
    pub fn push_registration_url(&self) -> Option<String> {
        if self.network_disabled() {
            return None;
        }
        match self.push_registration_url.as_deref() {
            Some(url) => non_empty(Some(url)).map(str::to_string),
            None => Some(DEFAULT_PUSH_REGISTRATION_URL.to_string()),
        }
    }

    pub fn network_disabled(&self) -> bool {
        self.disable_network == Some(true)
    }

    pub fn initial_tokens_delay(&self) -> Duration {
        Duration::from_millis(
            self.initial_tokens_delay_ms
                .unwrap_or(DEFAULT_INITIAL_TOKENS_DELAY_MS),
        )
    }

    pub fn initial_push_delay(&self) -> Duration {
        Duration::from_millis(
            self.initial_push_delay_ms
                .unwrap_or(DEFAULT_INITIAL_PUSH_DELAY_MS),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self
                .registration_max_attempts
                .unwrap_or(default.max_attempts),
            delay: self
                .registration_retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.delay),
        }
    }

    pub fn user_agent(&self) -> String {
        match non_empty(self.user_agent.as_deref()) {
            Some(ua) => ua.to_string(),
            None => format!(
                "PickupApp/{} WebViewShell Mobile",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("PICKUP_WEB_URL").filter(|v| !v.trim().is_empty()) {
            self.web_url = Some(url);
        }
        if let Some(url) = lookup("PICKUP_PUSH_REGISTRATION_URL") {
            self.push_registration_url = Some(url);
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn read_app_config(path: &Path) -> anyhow::Result<Option<AppConfig>> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    let config = serde_json::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(config))
}

pub fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let mut config = match read_app_config(&path) {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            AppConfig::default()
        }
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "invalid config; using defaults");
            AppConfig::default()
        }
    };
    config.apply_env(|key| std::env::var(key).ok());
    config
}
