use std::sync::Arc;

use session_model::{Entity, LogEntry, Scene, SessionSnapshot};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::view::SessionView;

/// Shared, observable owner of the reconciled [`SessionView`].
///
/// Clones share one view. Writers never take a lock of their own: each
/// operation is an idempotent edit applied through the watch channel, and
/// observers are only woken when the edit changed something.
#[derive(Debug, Clone)]
pub struct LocalSessionStore {
    tx: Arc<watch::Sender<SessionView>>,
}

impl Default for LocalSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSessionStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionView::default());
        Self { tx: Arc::new(tx) }
    }

    /// Store whose uncorrelated `ai` entries only supersede previews when
    /// written by `user_id`.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        let mut view = SessionView::default();
        view.set_local_user(user_id);
        let (tx, _rx) = watch::channel(view);
        Self { tx: Arc::new(tx) }
    }

    /// Observe the view; the receiver sees every change after this call.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.tx.subscribe()
    }

    /// Copy of the current view.
    pub fn snapshot(&self) -> SessionView {
        self.tx.borrow().clone()
    }

    /// Read the current view without copying it.
    pub fn read<R>(&self, f: impl FnOnce(&SessionView) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn insert_log(&self, entry: LogEntry) -> bool {
        let id = entry.id;
        let inserted = self.tx.send_if_modified(|view| view.insert_log(entry));
        if !inserted {
            trace!(log_id = id, "duplicate log entry ignored");
        }
        inserted
    }

    /// Insert a log entry, superseding a preview when it is a new `ai` entry.
    pub fn apply_log(&self, entry: LogEntry) -> bool {
        let id = entry.id;
        let mut superseded = None;
        let inserted = self.tx.send_if_modified(|view| {
            let (inserted, request_id) = view.apply_log(entry);
            superseded = request_id;
            inserted
        });

        if let Some(request_id) = superseded {
            debug!(log_id = id, request_id = %request_id, "answer preview superseded by log entry");
        } else if !inserted {
            trace!(log_id = id, "duplicate log entry ignored");
        }
        inserted
    }

    pub fn upsert_entity(&self, entity: Entity) -> bool {
        self.tx.send_if_modified(|view| view.upsert_entity(entity))
    }

    pub fn replace_scene(&self, scene: Scene) -> bool {
        self.tx.send_if_modified(|view| view.replace_scene(scene))
    }

    pub fn begin_preview(&self, request_id: &str, question: &str) -> bool {
        self.tx
            .send_if_modified(|view| view.begin_preview(request_id, question))
    }

    pub fn append_preview(&self, request_id: &str, fragment: &str) -> bool {
        self.tx
            .send_if_modified(|view| view.append_preview(request_id, fragment))
    }

    pub fn complete_preview(&self, request_id: &str, text: &str) -> bool {
        self.tx
            .send_if_modified(|view| view.complete_preview(request_id, text))
    }

    pub fn discard_preview(&self, request_id: &str) -> bool {
        self.tx
            .send_if_modified(|view| view.discard_preview(request_id))
    }

    /// Replace the authoritative state with a snapshot.
    pub fn seed(&self, snapshot: SessionSnapshot) -> bool {
        let session_id = snapshot.session_id().to_string();
        let logs = snapshot.logs.len();
        let changed = self.tx.send_if_modified(|view| view.seed(snapshot));
        debug!(session_id = %session_id, logs, changed, "session view seeded");
        changed
    }

    pub fn clear(&self) -> bool {
        self.tx.send_if_modified(SessionView::clear)
    }
}
