use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::wire::timestamp;

/// Kind of thing an entity represents in the scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum EntityCategory {
    Character,
    Npc,
    Spirit,
    Sprite,
    Drone,
    Vehicle,
    Critter,
    Device,
    #[default]
    Other,
}

impl EntityCategory {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "character" => Self::Character,
            "npc" => Self::Npc,
            "spirit" => Self::Spirit,
            "sprite" => Self::Sprite,
            "drone" => Self::Drone,
            "vehicle" => Self::Vehicle,
            "critter" => Self::Critter,
            "device" => Self::Device,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Npc => "npc",
            Self::Spirit => "spirit",
            Self::Sprite => "sprite",
            Self::Drone => "drone",
            Self::Vehicle => "vehicle",
            Self::Critter => "critter",
            Self::Device => "device",
            Self::Other => "other",
        }
    }
}

impl From<Option<String>> for EntityCategory {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Self::parse).unwrap_or_default()
    }
}

impl From<EntityCategory> for String {
    fn from(value: EntityCategory) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum EntityStatus {
    Active,
    Damaged,
    Critical,
    #[default]
    Other,
}

impl EntityStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "damaged" => Self::Damaged,
            "critical" => Self::Critical,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Damaged => "damaged",
            Self::Critical => "critical",
            Self::Other => "other",
        }
    }
}

impl From<Option<String>> for EntityStatus {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Self::parse).unwrap_or_default()
    }
}

impl From<EntityStatus> for String {
    fn from(value: EntityStatus) -> Self {
        value.as_str().to_string()
    }
}

/// A scene participant that is not a session member: NPCs, spirits, drones.
///
/// Entities are always replaced as a whole; there is no partial patch shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "entity_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", alias = "category", default)]
    pub category: EntityCategory,
    #[serde(default)]
    pub status: EntityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "created_by", alias = "owner", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(
        rename = "last_updated",
        alias = "updated_at",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
}
