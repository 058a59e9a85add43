use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde_json::Value;
use session_model::{Entity, LogEntry, Scene};

use crate::error::DecodeError;

/// Decoding contract for one kind of server-push stream.
pub trait StreamProtocol: Send + Sync + 'static {
    type Event: Debug + Send + 'static;

    /// Stable label used in logs.
    const NAME: &'static str;

    /// Decode one `data:` payload into an event.
    fn decode(payload: &str) -> Result<Self::Event, DecodeError>;

    /// Whether the event ends a request-scoped stream.
    fn is_terminal(_event: &Self::Event) -> bool {
        false
    }
}

/// Event carried by the request-scoped answer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEvent {
    Started,
    Token { fragment: String },
    Completed,
    Failed { message: String },
}

/// Event carried by the long-lived session stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { session_id: Option<String> },
    Heartbeat { timestamp: Option<String> },
    Log(LogEntry),
    EntityUpdate(Entity),
    SceneUpdate(Scene),
    /// In-band application error; the stream stays open.
    Error { message: String },
}

impl SessionEvent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Log(_) => "log",
            Self::EntityUpdate(_) => "entity_update",
            Self::SceneUpdate(_) => "scene_update",
            Self::Error { .. } => "error",
        }
    }
}

/// Marker for the answer stream protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerStream;

impl StreamProtocol for AnswerStream {
    type Event = AnswerEvent;

    const NAME: &'static str = "answer";

    fn decode(payload: &str) -> Result<AnswerEvent, DecodeError> {
        let value = parse_object(payload)?;

        match status_of(&value, payload)? {
            "start" => Ok(AnswerEvent::Started),
            "streaming" => Ok(AnswerEvent::Token {
                fragment: string_field(&value, "content").unwrap_or_default(),
            }),
            "complete" => Ok(AnswerEvent::Completed),
            "error" => Ok(AnswerEvent::Failed {
                message: string_field(&value, "message")
                    .unwrap_or_else(|| "answer stream failed".to_string()),
            }),
            other => Err(DecodeError::UnknownStatus {
                status: other.to_string(),
            }),
        }
    }

    fn is_terminal(event: &AnswerEvent) -> bool {
        matches!(event, AnswerEvent::Completed | AnswerEvent::Failed { .. })
    }
}

/// Marker for the session stream protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStream;

impl StreamProtocol for SessionStream {
    type Event = SessionEvent;

    const NAME: &'static str = "session";

    fn decode(payload: &str) -> Result<SessionEvent, DecodeError> {
        let value = parse_object(payload)?;

        match status_of(&value, payload)? {
            "connected" => Ok(SessionEvent::Connected {
                session_id: string_field(&value, "session_id"),
            }),
            "heartbeat" => Ok(SessionEvent::Heartbeat {
                timestamp: string_field(&value, "timestamp"),
            }),
            "log" => record_field(&value, "entry", payload).map(SessionEvent::Log),
            "entity_update" => {
                record_field(&value, "entity", payload).map(SessionEvent::EntityUpdate)
            }
            "scene_update" => record_field(&value, "scene", payload).map(SessionEvent::SceneUpdate),
            "error" => Ok(SessionEvent::Error {
                message: string_field(&value, "message")
                    .unwrap_or_else(|| "session stream reported an error".to_string()),
            }),
            other => Err(DecodeError::UnknownStatus {
                status: other.to_string(),
            }),
        }
    }
}

fn parse_object(payload: &str) -> Result<Value, DecodeError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|error| DecodeError::malformed(&error, payload))?;
    if !value.is_object() {
        return Err(DecodeError::Malformed {
            message: "event payload must be a JSON object".to_string(),
            payload: payload.to_string(),
        });
    }
    Ok(value)
}

fn status_of<'a>(value: &'a Value, payload: &str) -> Result<&'a str, DecodeError> {
    value
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::Malformed {
            message: "missing string field 'status'".to_string(),
            payload: payload.to_string(),
        })
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(ToString::to_string)
}

fn record_field<T>(value: &Value, key: &str, payload: &str) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
{
    let Some(record) = value.get(key) else {
        return Err(DecodeError::Malformed {
            message: format!("missing field '{key}'"),
            payload: payload.to_string(),
        });
    };

    T::deserialize(record).map_err(|error| DecodeError::malformed(&error, payload))
}
