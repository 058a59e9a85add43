//! Environment configuration.

use std::env;
use std::time::Duration;

use tracing::warn;
use wren_api::{ReconnectPolicy, WrenApiConfig, DEFAULT_WREN_BASE_URL};

pub const API_URL_ENV: &str = "WREN_API_URL";
pub const USER_ID_ENV: &str = "WREN_USER_ID";
pub const TIMEOUT_ENV: &str = "WREN_TIMEOUT_SEC";
pub const RECONNECT_BASE_ENV: &str = "WREN_RECONNECT_BASE_MS";
pub const RECONNECT_CAP_ENV: &str = "WREN_RECONNECT_CAP_MS";
pub const RECONNECT_MAX_RETRIES_ENV: &str = "WREN_RECONNECT_MAX_RETRIES";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_url: String,
    pub user_id: Option<String>,
    /// Timeout for request/response calls; streams are exempt.
    pub timeout: Duration,
    /// Schedule for the long-lived session stream.
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_WREN_BASE_URL.to_string(),
            user_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            reconnect: ReconnectPolicy::session_stream(),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut reconnect = defaults.reconnect;
        if let Some(base) = env_parsed::<u64>(RECONNECT_BASE_ENV) {
            reconnect = reconnect.with_base(Duration::from_millis(base));
        }
        if let Some(cap) = env_parsed::<u64>(RECONNECT_CAP_ENV) {
            reconnect = reconnect.with_cap(Duration::from_millis(cap));
        }
        if let Some(max_retries) = env_parsed::<u32>(RECONNECT_MAX_RETRIES_ENV) {
            reconnect = reconnect.with_max_retries(Some(max_retries));
        }

        Self {
            api_url: env_string_opt(API_URL_ENV).unwrap_or(defaults.api_url),
            user_id: env_string_opt(USER_ID_ENV),
            timeout: env_parsed::<u64>(TIMEOUT_ENV)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            reconnect,
        }
    }

    /// Request configuration for `user_id`, falling back to the configured one.
    pub fn api_config(&self, user_id: Option<&str>) -> WrenApiConfig {
        let user_id = user_id
            .map(str::to_string)
            .or_else(|| self.user_id.clone())
            .unwrap_or_default();
        WrenApiConfig::new(user_id)
            .with_base_url(self.api_url.clone())
            .with_timeout(self.timeout)
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string_opt(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    const ALL_KEYS: [&str; 6] = [
        API_URL_ENV,
        USER_ID_ENV,
        TIMEOUT_ENV,
        RECONNECT_BASE_ENV,
        RECONNECT_CAP_ENV,
        RECONNECT_MAX_RETRIES_ENV,
    ];

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    fn clear_all() -> Vec<EnvGuard> {
        ALL_KEYS.iter().map(|key| set_env_guard(key, None)).collect()
    }

    #[test]
    fn defaults_without_environment() {
        let _lock = env_lock();
        let _guards = clear_all();

        let config = SyncConfig::from_env();
        assert_eq!(config.api_url, DEFAULT_WREN_BASE_URL);
        assert!(config.user_id.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.reconnect, ReconnectPolicy::session_stream());
    }

    #[test]
    fn environment_overrides_apply() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g1 = set_env_guard(API_URL_ENV, Some("http://wren.local:9000"));
        let _g2 = set_env_guard(USER_ID_ENV, Some(" user-7 "));
        let _g3 = set_env_guard(TIMEOUT_ENV, Some("5"));
        let _g4 = set_env_guard(RECONNECT_BASE_ENV, Some("250"));
        let _g5 = set_env_guard(RECONNECT_CAP_ENV, Some("4000"));
        let _g6 = set_env_guard(RECONNECT_MAX_RETRIES_ENV, Some("3"));

        let config = SyncConfig::from_env();
        assert_eq!(config.api_url, "http://wren.local:9000");
        assert_eq!(config.user_id.as_deref(), Some("user-7"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect.base, Duration::from_millis(250));
        assert_eq!(config.reconnect.cap, Duration::from_millis(4000));
        assert_eq!(config.reconnect.max_retries, Some(3));

        let api = config.api_config(None);
        assert_eq!(api.user_id, "user-7");
        assert_eq!(api.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.api_config(Some("gm-user")).user_id, "gm-user");
    }

    #[test]
    fn unparsable_and_blank_values_are_ignored() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g1 = set_env_guard(TIMEOUT_ENV, Some("soon"));
        let _g2 = set_env_guard(RECONNECT_MAX_RETRIES_ENV, Some("-1"));
        let _g3 = set_env_guard(USER_ID_ENV, Some("   "));

        let config = SyncConfig::from_env();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.reconnect.max_retries, None);
        assert!(config.user_id.is_none());
    }
}
