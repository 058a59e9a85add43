use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::wire::timestamp;

/// The session's single current scene. Every update replaces it whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(
        rename = "current_scene_number",
        alias = "scene_number",
        default = "first_scene_number"
    )]
    pub scene_number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magical_conditions: Option<String>,
    #[serde(
        rename = "last_updated",
        alias = "updated_at",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

fn first_scene_number() -> i64 {
    1
}
