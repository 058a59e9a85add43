use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use session_model::SessionSnapshot;
use tracing::debug;

use crate::config::WrenApiConfig;
use crate::error::{parse_error_message, WrenApiError};
use crate::headers::{build_headers, to_header_map};
use crate::payload::{
    CommandOutcome, CommandRequest, CreateSessionRequest, CreatedSession, JoinRejection,
    JoinSessionRequest, JoinedSession,
};
use crate::transport::{HttpTransport, StreamTarget};
use crate::url::{
    answer_stream_url, command_url, join_url, normalize_base_url, session_stream_url,
    session_url, sessions_url,
};

/// Request/response client for the Wren backend.
///
/// Streams are not opened here; the client only builds their targets and hands
/// out an [`HttpTransport`] that shares its connection pool.
#[derive(Debug, Clone)]
pub struct WrenApiClient {
    http: Client,
    config: WrenApiConfig,
}

impl WrenApiClient {
    pub fn new(config: WrenApiConfig) -> Result<Self, WrenApiError> {
        build_headers(&config)?;
        normalize_base_url(&config.base_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(WrenApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &WrenApiConfig {
        &self.config
    }

    pub fn user_id(&self) -> &str {
        self.config.user_id.trim()
    }

    pub fn build_headers(&self) -> Result<HeaderMap, WrenApiError> {
        to_header_map(&build_headers(&self.config)?)
    }

    /// Stream transport sharing this client's connection pool.
    pub fn transport(&self) -> HttpTransport {
        HttpTransport::from_client(self.http.clone())
    }

    pub fn answer_stream_target(
        &self,
        question: &str,
        request_id: &str,
    ) -> Result<StreamTarget, WrenApiError> {
        let url = answer_stream_url(&self.config.base_url, question, self.user_id(), request_id)?;
        Ok(StreamTarget::new(url).with_headers(build_headers(&self.config)?))
    }

    pub fn session_stream_target(&self, session_id: &str) -> Result<StreamTarget, WrenApiError> {
        let url = session_stream_url(&self.config.base_url, session_id, self.user_id())?;
        Ok(StreamTarget::new(url).with_headers(build_headers(&self.config)?))
    }

    pub async fn create_session(
        &self,
        name: &str,
        theme: Option<&str>,
    ) -> Result<CreatedSession, WrenApiError> {
        let mut body = CreateSessionRequest::new(name, self.user_id());
        if let Some(theme) = theme.map(str::trim).filter(|theme| !theme.is_empty()) {
            body = body.with_theme(theme);
        }

        let request = self.http.post(sessions_url(&self.config.base_url)?).json(&body);
        let created: CreatedSession = self.execute(request).await?;
        debug!(session_id = %created.session_id, "created session");
        Ok(created)
    }

    /// Join a session. Joining a session the user already belongs to succeeds
    /// with the role the backend has on record.
    pub async fn join_session(
        &self,
        session_id: &str,
        join: &JoinSessionRequest,
    ) -> Result<JoinedSession, WrenApiError> {
        let request = self
            .http
            .post(join_url(&self.config.base_url, session_id)?)
            .json(join);
        let (status, body) = self.send(request).await?;

        if status == StatusCode::BAD_REQUEST {
            if let Ok(rejection) = serde_json::from_str::<JoinRejection>(&body) {
                if rejection.error.to_ascii_lowercase().contains("already in session") {
                    debug!(session_id, "user already in session");
                    return Ok(JoinedSession {
                        session_id: session_id.to_string(),
                        role: rejection.role.unwrap_or(join.role),
                        already_member: true,
                    });
                }
            }
        }

        let joined: JoinedSession = decode_body(status, &body)?;
        debug!(session_id, role = joined.role.as_str(), "joined session");
        Ok(joined)
    }

    pub async fn fetch_session(&self, session_id: &str) -> Result<SessionSnapshot, WrenApiError> {
        let request = self.http.get(session_url(&self.config.base_url, session_id)?);
        self.execute(request).await
    }

    /// Submit a slash command or free text to the session.
    ///
    /// A 2xx response whose body reports `status: "error"` is surfaced as
    /// [`WrenApiError::Rejected`].
    pub async fn submit_command(
        &self,
        session_id: &str,
        command: &str,
        request_id: Option<&str>,
    ) -> Result<CommandOutcome, WrenApiError> {
        let mut body = CommandRequest::new(session_id, self.user_id(), command.trim());
        if let Some(request_id) = request_id {
            body = body.with_request_id(request_id);
        }

        let request = self.http.post(command_url(&self.config.base_url)?).json(&body);
        let outcome: CommandOutcome = self.execute(request).await?;
        if outcome.is_error() {
            return Err(WrenApiError::Rejected(
                outcome
                    .summary()
                    .unwrap_or("command rejected")
                    .to_string(),
            ));
        }
        Ok(outcome)
    }

    async fn execute<T>(&self, request: RequestBuilder) -> Result<T, WrenApiError>
    where
        T: DeserializeOwned,
    {
        let (status, body) = self.send(request).await?;
        decode_body(status, &body)
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), WrenApiError> {
        let mut request = request.headers(self.build_headers()?);
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

fn decode_body<T>(status: StatusCode, body: &str) -> Result<T, WrenApiError>
where
    T: DeserializeOwned,
{
    if !status.is_success() {
        return Err(WrenApiError::Status {
            status,
            message: parse_error_message(status, body),
        });
    }
    Ok(serde_json::from_str(body)?)
}
