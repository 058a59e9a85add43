//! Plain-line rendering of session state for the terminal.

use std::collections::{BTreeMap, HashSet};

use session_model::{Entity, LogEntry, LogId, Scene};
use session_store::{PreviewState, SessionView};
use wren_sync::Notice;

pub fn format_log(entry: &LogEntry) -> String {
    let mut line = format!("[{}] {} ({})", entry.id, entry.speaker, entry.kind.as_str());
    if entry.overridden {
        line.push_str(" [override]");
    }
    line.push_str(": ");
    line.push_str(&entry.content);
    line
}

pub fn format_entity(entity: &Entity) -> String {
    let mut line = format!(
        "entity {}: {} ({}, {})",
        entity.id,
        entity.name,
        entity.category.as_str(),
        entity.status.as_str()
    );
    if let Some(description) = entity.description.as_deref().filter(|text| !text.is_empty()) {
        line.push_str(" - ");
        line.push_str(description);
    }
    line
}

pub fn format_scene(scene: &Scene) -> String {
    let mut line = format!("scene {}", scene.scene_number);
    let parts = [
        ("location", &scene.location),
        ("goal", &scene.goal),
        ("opposition", &scene.opposition),
        ("conditions", &scene.magical_conditions),
    ];
    for (label, value) in parts {
        if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
            line.push_str(&format!("; {label}: {value}"));
        }
    }
    line
}

/// Tracks what has already been printed so each view change only prints the
/// difference.
#[derive(Debug, Default)]
pub struct ViewPrinter {
    announced_session: Option<String>,
    logs: HashSet<LogId>,
    previews: HashSet<String>,
    entities: BTreeMap<String, Entity>,
    scene: Option<Scene>,
    notices: HashSet<u64>,
}

impl ViewPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &SessionView) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(info) = view.info() {
            if self.announced_session.as_deref() != Some(info.session_id.as_str()) {
                lines.push(format!("session {}: {}", info.session_id, info.name));
                self.announced_session = Some(info.session_id.clone());
            }
        }

        if view.scene() != self.scene.as_ref() {
            if let Some(scene) = view.scene() {
                lines.push(format_scene(scene));
            }
            self.scene = view.scene().cloned();
        }

        for (id, entity) in view.entities() {
            if self.entities.get(id) != Some(entity) {
                lines.push(format_entity(entity));
            }
        }
        self.entities = view.entities().clone();

        // Late arrivals with a lower id still print once.
        for entry in view.logs() {
            if self.logs.insert(entry.id) {
                lines.push(format_log(entry));
            }
        }

        for preview in view.previews() {
            if preview.state == PreviewState::Completed
                && self.previews.insert(preview.request_id.clone())
            {
                lines.push(format!("WREN (preview): {}", preview.text));
            }
        }

        lines
    }

    pub fn render_notices(&mut self, notices: &[Notice]) -> Vec<String> {
        notices
            .iter()
            .filter(|notice| self.notices.insert(notice.id))
            .map(|notice| notice.to_string())
            .collect()
    }
}
