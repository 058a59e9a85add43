use std::collections::BTreeMap;

use session_model::{Entity, LogEntry, LogId, Participant, Scene, SessionInfo, SessionSnapshot};

/// Completed previews kept once their answer is done; older ones are dropped.
pub const COMPLETED_PREVIEW_LIMIT: usize = 8;

/// Lifecycle of a locally streamed answer preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Streaming,
    /// The answer stream finished; the authoritative log entry has not arrived yet.
    Completed,
}

/// Partial answer text shown until the authoritative `ai` log entry arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub request_id: String,
    pub question: String,
    pub text: String,
    pub state: PreviewState,
}

/// Reconciled state of one collaborative session.
///
/// Every mutation is idempotent and returns whether the view changed, so the
/// same event may be applied any number of times and in any interleaving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    info: Option<SessionInfo>,
    participants: Vec<Participant>,
    logs: Vec<LogEntry>,
    entities: BTreeMap<String, Entity>,
    scene: Option<Scene>,
    /// Oldest first.
    previews: Vec<Preview>,
    /// User whose uncorrelated `ai` entries may supersede a preview.
    local_user: Option<String>,
}

impl SessionView {
    pub fn info(&self) -> Option<&SessionInfo> {
        self.info.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.info.as_ref().map(|info| info.session_id.as_str())
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Log entries, ascending by id, without duplicates.
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn log(&self, id: LogId) -> Option<&LogEntry> {
        self.logs
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
            .map(|index| &self.logs[index])
    }

    pub fn last_log_id(&self) -> Option<LogId> {
        self.logs.last().map(|entry| entry.id)
    }

    pub fn entities(&self) -> &BTreeMap<String, Entity> {
        &self.entities
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn local_user(&self) -> Option<&str> {
        self.local_user.as_deref()
    }

    pub fn set_local_user(&mut self, user_id: impl Into<String>) -> bool {
        let user_id = Some(user_id.into());
        if self.local_user == user_id {
            return false;
        }
        self.local_user = user_id;
        true
    }

    pub fn previews(&self) -> &[Preview] {
        &self.previews
    }

    pub fn preview(&self, request_id: &str) -> Option<&Preview> {
        self.previews
            .iter()
            .find(|preview| preview.request_id == request_id)
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_none()
            && self.participants.is_empty()
            && self.logs.is_empty()
            && self.entities.is_empty()
            && self.scene.is_none()
            && self.previews.is_empty()
    }

    /// Insert-or-ignore keyed by id, keeping the log sorted.
    ///
    /// The first delivery of an id wins; later copies are retransmits.
    pub fn insert_log(&mut self, entry: LogEntry) -> bool {
        match self.logs.binary_search_by_key(&entry.id, |existing| existing.id) {
            Ok(_) => false,
            Err(position) => {
                self.logs.insert(position, entry);
                true
            }
        }
    }

    /// Insert a log entry and, for a newly inserted `ai` entry, drop the
    /// preview it supersedes. Returns `(inserted, superseded_request_id)`.
    pub fn apply_log(&mut self, entry: LogEntry) -> (bool, Option<String>) {
        let supersedes = entry.is_ai();
        let correlation_id = entry.correlation_id.clone();
        let author = entry.author.clone();

        if !self.insert_log(entry) {
            return (false, None);
        }
        if !supersedes {
            return (true, None);
        }
        (
            true,
            self.supersede_preview(correlation_id.as_deref(), author.as_deref()),
        )
    }

    /// Whole-record upsert; last write wins with no field merge.
    pub fn upsert_entity(&mut self, entity: Entity) -> bool {
        if self.entities.get(&entity.id) == Some(&entity) {
            return false;
        }
        self.entities.insert(entity.id.clone(), entity);
        true
    }

    /// Unconditional replace of the scene singleton.
    pub fn replace_scene(&mut self, scene: Scene) -> bool {
        if self.scene.as_ref() == Some(&scene) {
            return false;
        }
        self.scene = Some(scene);
        true
    }

    /// Start tracking a preview. A request id already present is left untouched.
    pub fn begin_preview(&mut self, request_id: &str, question: &str) -> bool {
        if self.preview(request_id).is_some() {
            return false;
        }
        self.previews.push(Preview {
            request_id: request_id.to_string(),
            question: question.to_string(),
            text: String::new(),
            state: PreviewState::Streaming,
        });
        true
    }

    /// Append a fragment; ignored when the preview is unknown, superseded or finished.
    pub fn append_preview(&mut self, request_id: &str, fragment: &str) -> bool {
        match self.preview_mut(request_id) {
            Some(preview) if preview.state == PreviewState::Streaming && !fragment.is_empty() => {
                preview.text.push_str(fragment);
                true
            }
            _ => false,
        }
    }

    /// Mark a preview finished with its final text.
    ///
    /// At most [`COMPLETED_PREVIEW_LIMIT`] completed previews are kept; the
    /// oldest go first.
    pub fn complete_preview(&mut self, request_id: &str, text: &str) -> bool {
        let changed = match self.preview_mut(request_id) {
            Some(preview) if preview.state == PreviewState::Streaming || preview.text != text => {
                preview.text = text.to_string();
                preview.state = PreviewState::Completed;
                true
            }
            _ => false,
        };
        if changed {
            self.trim_completed_previews();
        }
        changed
    }

    pub fn discard_preview(&mut self, request_id: &str) -> bool {
        let before = self.previews.len();
        self.previews
            .retain(|preview| preview.request_id != request_id);
        self.previews.len() != before
    }

    /// Drop the preview an authoritative `ai` entry replaces.
    ///
    /// With a correlation id only the matching preview goes. Without one the
    /// entry must come from the local user (any author while no local user is
    /// set); then the oldest completed preview goes, else the oldest one still
    /// streaming.
    pub fn supersede_preview(
        &mut self,
        correlation_id: Option<&str>,
        author: Option<&str>,
    ) -> Option<String> {
        let index = match correlation_id {
            Some(request_id) => self
                .previews
                .iter()
                .position(|preview| preview.request_id == request_id),
            None => {
                if let Some(local_user) = self.local_user.as_deref() {
                    if author != Some(local_user) {
                        return None;
                    }
                }
                self.previews
                    .iter()
                    .position(|preview| preview.state == PreviewState::Completed)
                    .or_else(|| (!self.previews.is_empty()).then_some(0))
            }
        }?;

        Some(self.previews.remove(index).request_id)
    }

    /// Replace the authoritative state with a join-time snapshot.
    ///
    /// Logs are deduplicated (first occurrence wins) and sorted. Previews belong
    /// to live answer streams the snapshot knows nothing about and are kept.
    pub fn seed(&mut self, snapshot: SessionSnapshot) -> bool {
        let SessionSnapshot {
            session,
            users,
            scene,
            entities,
            logs,
        } = snapshot;

        let mut seeded_logs: Vec<LogEntry> = Vec::with_capacity(logs.len());
        for entry in logs {
            if let Err(position) = seeded_logs.binary_search_by_key(&entry.id, |e| e.id) {
                seeded_logs.insert(position, entry);
            }
        }
        let seeded_entities: BTreeMap<String, Entity> = entities
            .into_iter()
            .map(|entity| (entity.id.clone(), entity))
            .collect();

        let changed = self.info.as_ref() != Some(&session)
            || self.participants != users
            || self.scene != scene
            || self.entities != seeded_entities
            || self.logs != seeded_logs;

        self.info = Some(session);
        self.participants = users;
        self.scene = scene;
        self.entities = seeded_entities;
        self.logs = seeded_logs;
        changed
    }

    /// Discard everything, previews included. The local user is kept.
    pub fn clear(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        let local_user = self.local_user.take();
        *self = Self {
            local_user,
            ..Self::default()
        };
        true
    }

    fn trim_completed_previews(&mut self) {
        let mut excess = self
            .previews
            .iter()
            .filter(|preview| preview.state == PreviewState::Completed)
            .count()
            .saturating_sub(COMPLETED_PREVIEW_LIMIT);
        self.previews.retain(|preview| {
            if excess > 0 && preview.state == PreviewState::Completed {
                excess -= 1;
                return false;
            }
            true
        });
    }

    fn preview_mut(&mut self, request_id: &str) -> Option<&mut Preview> {
        self.previews
            .iter_mut()
            .find(|preview| preview.request_id == request_id)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use session_model::{
        Entity, EntityCategory, EntityStatus, LogEntry, LogKind, Scene, SessionSnapshot,
    };
    use time::macros::datetime;

    use super::{PreviewState, SessionView, COMPLETED_PREVIEW_LIMIT};

    fn entry(id: u64, kind: LogKind) -> LogEntry {
        LogEntry {
            id,
            speaker: "GM".to_string(),
            content: format!("entry {id}"),
            kind,
            overridden: false,
            timestamp: datetime!(2025-03-01 10:00:00 UTC),
            author: None,
            correlation_id: None,
        }
    }

    fn ids(view: &SessionView) -> Vec<u64> {
        view.logs().iter().map(|entry| entry.id).collect()
    }

    fn entity(id: &str, status: EntityStatus, description: Option<&str>) -> Entity {
        Entity {
            id: id.to_string(),
            name: "Razor".to_string(),
            category: EntityCategory::Npc,
            status,
            description: description.map(ToString::to_string),
            owner: None,
            updated_at: None,
        }
    }

    #[test]
    fn logs_are_sorted_and_deduplicated() {
        let mut view = SessionView::default();
        let mut first_three = entry(3, LogKind::Echo);
        first_three.content = "first".to_string();
        let mut second_three = entry(3, LogKind::Echo);
        second_three.content = "retransmit".to_string();

        assert!(view.insert_log(entry(5, LogKind::Roll)));
        assert!(view.insert_log(first_three));
        assert!(view.insert_log(entry(4, LogKind::Scene)));
        assert!(!view.insert_log(second_three));

        assert_eq!(ids(&view), vec![3, 4, 5]);
        assert_eq!(view.log(3).map(|entry| entry.content.as_str()), Some("first"));
        assert_eq!(view.last_log_id(), Some(5));
    }

    #[test]
    fn entity_upsert_replaces_the_whole_record() {
        let mut view = SessionView::default();
        assert!(view.upsert_entity(entity("e1", EntityStatus::Active, Some("chrome arm"))));
        assert!(view.upsert_entity(entity("e1", EntityStatus::Critical, None)));
        assert!(!view.upsert_entity(entity("e1", EntityStatus::Critical, None)));

        assert_eq!(view.entities().len(), 1);
        assert_eq!(
            view.entity("e1"),
            Some(&entity("e1", EntityStatus::Critical, None))
        );
    }

    #[test]
    fn scene_replace_does_not_merge_missing_fields() {
        let mut view = SessionView::default();
        view.replace_scene(Scene {
            scene_number: 1,
            location: Some("Docks".to_string()),
            goal: Some("Find the courier".to_string()),
            opposition: Some("Lone Star".to_string()),
            magical_conditions: Some("Background count 2".to_string()),
            updated_at: None,
        });
        let next = Scene {
            scene_number: 2,
            location: Some("Warehouse".to_string()),
            goal: None,
            opposition: None,
            magical_conditions: None,
            updated_at: None,
        };

        assert!(view.replace_scene(next.clone()));
        assert_eq!(view.scene(), Some(&next));
    }

    #[test]
    fn previews_track_streamed_text() {
        let mut view = SessionView::default();
        assert!(view.begin_preview("req-1", "who is Razor?"));
        assert!(!view.begin_preview("req-1", "again"));
        assert!(view.append_preview("req-1", "Hel"));
        assert!(view.append_preview("req-1", "lo"));
        assert!(!view.append_preview("req-unknown", "x"));

        assert!(view.complete_preview("req-1", "Hello"));
        assert!(!view.complete_preview("req-1", "Hello"));
        assert!(!view.append_preview("req-1", " late"));

        let preview = view.preview("req-1").expect("preview should exist");
        assert_eq!(preview.text, "Hello");
        assert_eq!(preview.state, PreviewState::Completed);
    }

    #[test]
    fn correlated_ai_entry_supersedes_only_its_preview() {
        let mut view = SessionView::default();
        view.begin_preview("req-1", "first");
        view.begin_preview("req-2", "second");
        view.complete_preview("req-1", "one");

        let mut answer = entry(9, LogKind::Ai);
        answer.correlation_id = Some("req-2".to_string());

        assert_eq!(view.apply_log(answer), (true, Some("req-2".to_string())));
        assert!(view.preview("req-1").is_some());
        assert!(view.preview("req-2").is_none());
        assert!(!view.append_preview("req-2", "late token"));
    }

    #[test]
    fn uncorrelated_ai_entry_prefers_oldest_completed_preview() {
        let mut view = SessionView::default();
        view.begin_preview("req-1", "still streaming");
        view.begin_preview("req-2", "done");
        view.begin_preview("req-3", "also done");
        view.complete_preview("req-2", "two");
        view.complete_preview("req-3", "three");

        assert_eq!(
            view.apply_log(entry(1, LogKind::Ai)),
            (true, Some("req-2".to_string()))
        );
        assert_eq!(
            view.apply_log(entry(2, LogKind::Ai)),
            (true, Some("req-3".to_string()))
        );
        assert_eq!(
            view.apply_log(entry(3, LogKind::Ai)),
            (true, Some("req-1".to_string()))
        );
        assert_eq!(view.apply_log(entry(4, LogKind::Ai)), (true, None));
    }

    #[test]
    fn duplicate_or_non_ai_entries_leave_previews_alone() {
        let mut view = SessionView::default();
        view.insert_log(entry(1, LogKind::Ai));
        view.begin_preview("req-1", "q");

        assert_eq!(view.apply_log(entry(1, LogKind::Ai)), (false, None));
        assert_eq!(view.apply_log(entry(2, LogKind::Roll)), (true, None));
        assert_eq!(view.previews().len(), 1);
    }

    #[test]
    fn seed_replaces_authoritative_state_wholesale() {
        let mut view = SessionView::default();
        view.insert_log(entry(40, LogKind::Echo));
        view.upsert_entity(entity("stale", EntityStatus::Active, None));
        view.begin_preview("req-1", "q");

        let mut snapshot = SessionSnapshot::empty("sr-1");
        snapshot.logs = vec![
            entry(2, LogKind::Echo),
            entry(1, LogKind::Scene),
            entry(2, LogKind::Roll),
        ];
        snapshot.entities = vec![entity("e1", EntityStatus::Damaged, None)];

        assert!(view.seed(snapshot.clone()));
        assert!(!view.seed(snapshot));

        assert_eq!(view.session_id(), Some("sr-1"));
        assert_eq!(ids(&view), vec![1, 2]);
        assert_eq!(view.log(2).map(|entry| entry.kind), Some(LogKind::Echo));
        assert!(view.entity("stale").is_none());
        assert!(view.entity("e1").is_some());
        assert!(view.scene().is_none());
        assert_eq!(view.previews().len(), 1);
    }

    #[test]
    fn clear_discards_everything() {
        let mut view = SessionView::default();
        view.seed(SessionSnapshot::empty("sr-1"));
        view.begin_preview("req-1", "q");

        assert!(view.clear());
        assert!(view.is_empty());
        assert!(!view.clear());
    }

    #[test]
    fn another_users_ai_entry_leaves_local_previews_alone() {
        let mut view = SessionView::default();
        view.set_local_user("user-7");
        view.begin_preview("req-mine", "who is watching?");
        view.complete_preview("req-mine", "A spirit.");

        let mut theirs = entry(1, LogKind::Ai);
        theirs.author = Some("someone-else".to_string());
        let mut unattributed = entry(2, LogKind::Ai);
        unattributed.author = None;
        assert_eq!(view.apply_log(theirs), (true, None));
        assert_eq!(view.apply_log(unattributed), (true, None));
        assert_eq!(view.previews().len(), 1);

        let mut mine = entry(3, LogKind::Ai);
        mine.author = Some("user-7".to_string());
        assert_eq!(view.apply_log(mine), (true, Some("req-mine".to_string())));
        assert!(view.previews().is_empty());
    }

    #[test]
    fn completed_previews_are_capped_oldest_first() {
        let mut view = SessionView::default();
        view.begin_preview("req-live", "still going");
        let total = COMPLETED_PREVIEW_LIMIT + 2;
        for n in 0..total {
            let request_id = format!("req-{n}");
            view.begin_preview(&request_id, "q");
            view.complete_preview(&request_id, "done");
        }

        let kept: Vec<&str> = view
            .previews()
            .iter()
            .map(|preview| preview.request_id.as_str())
            .collect();
        assert_eq!(kept.len(), COMPLETED_PREVIEW_LIMIT + 1);
        assert_eq!(kept[0], "req-live");
        assert_eq!(kept[1], "req-2");
        assert!(view.preview(&format!("req-{}", total - 1)).is_some());
    }

    #[test]
    fn clear_keeps_the_local_user() {
        let mut view = SessionView::default();
        view.set_local_user("user-7");
        view.seed(SessionSnapshot::empty("sr-1"));

        assert!(view.clear());
        assert_eq!(view.local_user(), Some("user-7"));
    }
}
