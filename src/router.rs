//! Routes session stream events into the local store.

use session_store::LocalSessionStore;
use tracing::{debug, info, trace, warn};
use wren_api::SessionEvent;

use crate::connection::{CloseReason, ConnectionEvent, ConnectionEvents};
use crate::notices::{NoticeBoard, NoticeKind};

#[derive(Debug, Clone)]
pub struct SessionEventRouter {
    session_id: String,
    store: LocalSessionStore,
    notices: NoticeBoard,
}

impl SessionEventRouter {
    pub fn new(session_id: impl Into<String>, store: LocalSessionStore, notices: NoticeBoard) -> Self {
        Self {
            session_id: session_id.into(),
            store,
            notices,
        }
    }

    /// Apply one decoded session event. Returns whether the view changed.
    pub fn apply(&self, event: SessionEvent) -> bool {
        let session_id = self.session_id.as_str();
        match event {
            SessionEvent::Connected { session_id: announced } => {
                if announced.as_deref().is_some_and(|announced| announced != session_id) {
                    warn!(session_id, announced = ?announced, "stream announced a different session");
                } else {
                    debug!(session_id, "session stream connected");
                }
                false
            }
            SessionEvent::Heartbeat { .. } => {
                trace!(session_id, "heartbeat");
                false
            }
            SessionEvent::Log(entry) => self.store.apply_log(entry),
            SessionEvent::EntityUpdate(entity) => {
                debug!(session_id, entity_id = %entity.id, "entity replaced");
                self.store.upsert_entity(entity)
            }
            SessionEvent::SceneUpdate(scene) => {
                debug!(session_id, scene_number = scene.scene_number, "scene replaced");
                self.store.replace_scene(scene)
            }
            SessionEvent::Error { message } => {
                warn!(session_id, message = %message, "session stream reported an error");
                self.notices.push(NoticeKind::Application, message);
                false
            }
        }
    }

    /// Handle one connection event, session events and lifecycle alike.
    pub fn route(&self, event: ConnectionEvent<SessionEvent>) {
        let session_id = self.session_id.as_str();
        match event {
            ConnectionEvent::Opened { attempt } => {
                if self.notices.dismiss_kind(NoticeKind::Reconnecting) {
                    info!(session_id, attempt, "session stream restored");
                }
            }
            ConnectionEvent::Event(event) => {
                let label = event.label();
                let changed = self.apply(event);
                trace!(session_id, event = label, changed, "session event routed");
            }
            ConnectionEvent::ParseError(error) => {
                debug!(session_id, error = %error, "session event dropped");
            }
            ConnectionEvent::Reconnecting {
                attempt,
                delay,
                error,
            } => {
                self.notices.replace(
                    NoticeKind::Reconnecting,
                    format!(
                        "connection lost ({error}); retrying in {:.1}s (attempt {attempt})",
                        delay.as_secs_f64()
                    ),
                );
            }
            ConnectionEvent::Closed(CloseReason::Fatal(error)) => {
                self.notices.dismiss_kind(NoticeKind::Reconnecting);
                self.notices
                    .replace(NoticeKind::Fatal, format!("session stream closed: {error}"));
            }
            ConnectionEvent::Closed(reason) => {
                debug!(session_id, ?reason, "session stream closed");
            }
        }
    }

    /// Route every event until the connection closes.
    pub async fn run(self, mut events: ConnectionEvents<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.route(event);
        }
        debug!(session_id = %self.session_id, "session router stopped");
    }
}
