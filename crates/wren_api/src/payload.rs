use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use session_model::{LogEntry, ParticipantRole};

/// Default theme the backend applies to new sessions.
pub const DEFAULT_THEME: &str = "shadowrunBarren";

/// `POST /api/sessions` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub user_id: String,
    pub theme: String,
    pub meta_info: Map<String, Value>,
}

impl CreateSessionRequest {
    pub fn new(name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_id: user_id.into(),
            theme: DEFAULT_THEME.to_string(),
            meta_info: Map::new(),
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /api/sessions/{id}/join` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinSessionRequest {
    pub user_id: String,
    pub role: ParticipantRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
}

impl JoinSessionRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: ParticipantRole::Player,
            character_name: None,
        }
    }

    pub fn with_role(mut self, role: ParticipantRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_character_name(mut self, character_name: impl Into<String>) -> Self {
        self.character_name = Some(character_name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinedSession {
    pub session_id: String,
    #[serde(default)]
    pub role: ParticipantRole,
    /// The user was already a member; the backend kept the original role.
    #[serde(skip)]
    pub already_member: bool,
}

/// Rejection body of the join call: `{"error": "...", "role": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JoinRejection {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub role: Option<ParticipantRole>,
}

/// `POST /api/rpg/command` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRequest {
    pub session_id: String,
    pub user_id: String,
    pub command: String,
    /// Always false: answers arrive through the answer stream and the session log.
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl CommandRequest {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            command: command.into(),
            streaming: false,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Outcome of an accepted command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CommandOutcome {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Log row written by the command, when the backend returns it.
    #[serde(default, deserialize_with = "lenient_log_entry")]
    pub log_entry: Option<LogEntry>,
}

impl CommandOutcome {
    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }

    /// Text worth showing the user, if any.
    pub fn summary(&self) -> Option<&str> {
        self.output
            .as_deref()
            .or(self.message.as_deref())
            .filter(|text| !text.trim().is_empty())
    }
}

// Command handlers return partial rows (no command type, naive timestamps);
// a row that still does not decode is dropped rather than failing the call.
fn lenient_log_entry<'de, D>(deserializer: D) -> Result<Option<LogEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}
