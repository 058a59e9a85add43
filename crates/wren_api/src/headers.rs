use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::WrenApiConfig;
use crate::error::WrenApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CACHE_CONTROL: &str = "cache-control";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Build a deterministic header map for backend requests.
///
/// Every request advertises `text/event-stream` so stream handshakes and
/// JSON calls share one header set; the backend ignores `accept` on JSON routes.
pub fn build_headers(config: &WrenApiConfig) -> Result<BTreeMap<String, String>, WrenApiError> {
    if config.user_id.trim().is_empty() {
        return Err(WrenApiError::MissingUserId);
    }

    let mut headers = BTreeMap::new();
    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(HEADER_CACHE_CONTROL.to_owned(), "no-cache".to_owned());

    let ua = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

/// Convert a header map into a reqwest [`HeaderMap`], rejecting invalid names/values.
pub fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, WrenApiError> {
    let mut out = HeaderMap::new();
    for (key, value) in headers {
        out.insert(
            HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| WrenApiError::InvalidHeader(format!("invalid header key: {key}")))?,
            HeaderValue::from_str(value)
                .map_err(|_| WrenApiError::InvalidHeader(format!("invalid header value for {key}")))?,
        );
    }
    Ok(out)
}

fn default_user_agent() -> String {
    format!(
        "wren/{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        normalize_arch(std::env::consts::ARCH)
    )
}

fn normalize_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "x86" => "ia32",
        "aarch64" => "arm64",
        other => other,
    }
}
