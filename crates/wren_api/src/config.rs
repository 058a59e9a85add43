use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_WREN_BASE_URL;

/// Transport configuration for Wren backend requests.
#[derive(Debug, Clone)]
pub struct WrenApiConfig {
    /// Identity presented to the backend as `user_id`.
    pub user_id: String,
    /// Base URL of the backend (scheme, host, optional path prefix).
    pub base_url: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Overall timeout for request/response calls. Streams are never subject to it.
    pub timeout: Option<Duration>,
    /// Handshake timeout applied to every connection, streams included.
    pub connect_timeout: Option<Duration>,
}

impl Default for WrenApiConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            base_url: DEFAULT_WREN_BASE_URL.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl WrenApiConfig {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}
