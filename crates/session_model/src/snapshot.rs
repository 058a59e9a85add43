use serde::{Deserialize, Serialize};

use crate::wire::flag;
use crate::{Entity, LogEntry, Scene};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    #[default]
    Player,
    Gm,
    Observer,
}

impl ParticipantRole {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value.trim().to_ascii_lowercase().as_str() {
            "player" => Self::Player,
            "gm" => Self::Gm,
            "observer" => Self::Observer,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Gm => "gm",
            Self::Observer => "observer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    #[serde(default)]
    pub role: ParticipantRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default = "active_by_default", deserialize_with = "flag::deserialize")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

/// Full session state returned by the session-info call.
///
/// On join this seeds the local view wholesale, replacing anything held before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: SessionInfo,
    #[serde(default)]
    pub users: Vec<Participant>,
    #[serde(default)]
    pub scene: Option<Scene>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl SessionSnapshot {
    /// Empty snapshot for a session the client knows only by id.
    #[must_use]
    pub fn empty(session_id: impl Into<String>) -> Self {
        Self {
            session: SessionInfo {
                session_id: session_id.into(),
                name: String::new(),
                created_by: None,
                theme: None,
                is_active: true,
            },
            users: Vec::new(),
            scene: None,
            entities: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }
}
