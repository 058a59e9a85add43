use url::Url;

use crate::error::WrenApiError;

/// Default base URL for a locally running backend.
pub const DEFAULT_WREN_BASE_URL: &str = "http://localhost:8000";

/// Parse and normalize a backend base URL.
///
/// Normalization rules:
/// 1) blank input falls back to [`DEFAULT_WREN_BASE_URL`]
/// 2) only `http` and `https` are accepted
/// 3) query, fragment and trailing slashes are dropped so path prefixes survive joins
pub fn normalize_base_url(input: &str) -> Result<Url, WrenApiError> {
    let base = if input.trim().is_empty() {
        DEFAULT_WREN_BASE_URL
    } else {
        input.trim()
    };

    let mut url = Url::parse(base.trim_end_matches('/'))
        .map_err(|error| WrenApiError::InvalidBaseUrl(format!("{base}: {error}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(WrenApiError::InvalidBaseUrl(base.to_string()));
    }
    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(if path.is_empty() { "/" } else { &path });
    Ok(url)
}

fn endpoint(base: &str, segments: &[&str]) -> Result<Url, WrenApiError> {
    let mut url = normalize_base_url(base)?;
    url.path_segments_mut()
        .map_err(|_| WrenApiError::InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// `GET /stream?prompt=..&user_id=..&request_id=..` (request-scoped answer stream).
pub fn answer_stream_url(
    base: &str,
    question: &str,
    user_id: &str,
    request_id: &str,
) -> Result<Url, WrenApiError> {
    let mut url = endpoint(base, &["stream"])?;
    url.query_pairs_mut()
        .append_pair("prompt", question)
        .append_pair("user_id", user_id)
        .append_pair("request_id", request_id);
    Ok(url)
}

/// `GET /api/rpg/stream/{session_id}?user_id=..` (long-lived session stream).
pub fn session_stream_url(base: &str, session_id: &str, user_id: &str) -> Result<Url, WrenApiError> {
    let mut url = endpoint(base, &["api", "rpg", "stream", session_id])?;
    url.query_pairs_mut().append_pair("user_id", user_id);
    Ok(url)
}

/// `POST /api/sessions`.
pub fn sessions_url(base: &str) -> Result<Url, WrenApiError> {
    endpoint(base, &["api", "sessions"])
}

/// `GET /api/sessions/{session_id}`.
pub fn session_url(base: &str, session_id: &str) -> Result<Url, WrenApiError> {
    endpoint(base, &["api", "sessions", session_id])
}

/// `POST /api/sessions/{session_id}/join`.
pub fn join_url(base: &str, session_id: &str) -> Result<Url, WrenApiError> {
    endpoint(base, &["api", "sessions", session_id, "join"])
}

/// `POST /api/rpg/command`.
pub fn command_url(base: &str) -> Result<Url, WrenApiError> {
    endpoint(base, &["api", "rpg", "command"])
}
