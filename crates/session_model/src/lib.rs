//! Shared data model for a collaborative Wren session.
//!
//! This crate defines only the records the backend pushes and the client
//! reconciles: log entries, entities, the scene singleton and the join-time
//! snapshot. It excludes transport, stream framing and merge rules.
//!
//! Serde field names follow the backend's column names (`log_id`,
//! `command_type`, `entity_id`, ...). Decoding is lenient where the backend is
//! loose: SQLite booleans arrive as `0`/`1`, timestamps arrive with or without
//! an offset, and unknown enum spellings fold into an `Other` variant.

mod entity;
mod log;
mod scene;
mod snapshot;
pub mod wire;

pub use entity::{Entity, EntityCategory, EntityStatus};
pub use log::{LogEntry, LogId, LogKind};
pub use scene::Scene;
pub use snapshot::{Participant, ParticipantRole, SessionInfo, SessionSnapshot};
pub use wire::parse_timestamp;

/// Session identifier assigned by the backend (e.g. `sr-1a2b3c4d`).
pub type SessionId = String;
