use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::wire::{flag, timestamp};

/// Server-assigned, per-session monotonic log identifier.
pub type LogId = u64;

/// Command family that produced a log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum LogKind {
    Scene,
    Roll,
    Summon,
    Echo,
    Ai,
    Mark,
    Meta,
    #[default]
    Other,
}

impl LogKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "scene" => Self::Scene,
            "roll" => Self::Roll,
            "summon" => Self::Summon,
            "echo" => Self::Echo,
            "ai" => Self::Ai,
            "mark" => Self::Mark,
            "meta" => Self::Meta,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Roll => "roll",
            Self::Summon => "summon",
            Self::Echo => "echo",
            Self::Ai => "ai",
            Self::Mark => "mark",
            Self::Meta => "meta",
            Self::Other => "other",
        }
    }
}

impl From<Option<String>> for LogKind {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Self::parse).unwrap_or_default()
    }
}

impl From<LogKind> for String {
    fn from(value: LogKind) -> Self {
        value.as_str().to_string()
    }
}

/// One immutable entry of the shared scene log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "log_id", alias = "id")]
    pub id: LogId,
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "command_type", alias = "kind", default)]
    pub kind: LogKind,
    #[serde(
        rename = "is_gm_override",
        alias = "overridden",
        default,
        deserialize_with = "flag::deserialize"
    )]
    pub overridden: bool,
    #[serde(with = "timestamp")]
    pub timestamp: OffsetDateTime,
    /// Backend user that issued the command.
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Client request id echoed back for AI answers, when the backend supports it.
    #[serde(rename = "request_id", default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn is_ai(&self) -> bool {
        self.kind == LogKind::Ai
    }
}
