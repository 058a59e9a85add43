//! JSON payloads shaped like the backend's stream events.

use serde::Serialize;
use serde_json::{json, Value};
use session_model::{Entity, LogEntry, Scene};

/// Wrap a payload as one `data:` frame.
pub fn sse(payload: &str) -> String {
    format!("data: {payload}\n\n")
}

pub fn answer_start() -> String {
    json!({ "status": "start", "content": "" }).to_string()
}

pub fn answer_token(fragment: &str) -> String {
    json!({ "status": "streaming", "content": fragment }).to_string()
}

pub fn answer_complete() -> String {
    json!({ "status": "complete", "content": "" }).to_string()
}

pub fn answer_error(message: &str) -> String {
    json!({ "status": "error", "message": message }).to_string()
}

pub fn connected(session_id: &str) -> String {
    json!({ "status": "connected", "session_id": session_id }).to_string()
}

pub fn heartbeat() -> String {
    json!({ "status": "heartbeat", "timestamp": "2025-03-01T10:00:00" }).to_string()
}

pub fn session_error(message: &str) -> String {
    json!({ "status": "error", "message": message }).to_string()
}

pub fn log(entry: &LogEntry) -> String {
    json!({ "status": "log", "entry": to_value(entry) }).to_string()
}

pub fn entity_update(entity: &Entity) -> String {
    json!({ "status": "entity_update", "entity": to_value(entity) }).to_string()
}

pub fn scene_update(scene: &Scene) -> String {
    json!({ "status": "scene_update", "scene": to_value(scene) }).to_string()
}

fn to_value<T: Serialize>(record: &T) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}
