//! Session membership: join, stay in sync, leave.

use std::sync::{Arc, Mutex};

use session_model::SessionSnapshot;
use session_store::{LocalSessionStore, SessionView};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use wren_api::{
    CommandOutcome, EventTransport, JoinSessionRequest, JoinedSession, ReconnectPolicy,
    SessionStream, StreamTarget, WrenApiClient,
};

use crate::accumulator::{new_request_id, AnswerHandle, AnswerUpdate, TokenAccumulator};
use crate::connection::{ConnectionHandle, ConnectionState, StreamConnection, StreamScope};
use crate::error::SyncError;
use crate::lock_unpoisoned;
use crate::notices::{Notice, NoticeBoard, NoticeKind};
use crate::router::SessionEventRouter;

/// A joined session kept in sync with the backend.
///
/// Owns the session stream, its router task and the local store. Dropping it
/// closes the stream; [`SessionSync::leave`] also waits for the router and
/// discards all local state.
pub struct SessionSync {
    session_id: String,
    api: WrenApiClient,
    store: LocalSessionStore,
    notices: NoticeBoard,
    connection: ConnectionHandle,
    router: Option<JoinHandle<()>>,
    accumulator: TokenAccumulator,
    answers: Mutex<Vec<AnswerHandle>>,
}

impl SessionSync {
    /// Join `session_id`, seed the store from a fresh snapshot and start
    /// following the session stream.
    pub async fn join(
        api: WrenApiClient,
        transport: Arc<dyn EventTransport>,
        session_id: &str,
        join: &JoinSessionRequest,
        policy: ReconnectPolicy,
    ) -> Result<(Self, JoinedSession), SyncError> {
        let joined = api.join_session(session_id, join).await?;
        let snapshot = api.fetch_session(session_id).await?;
        let target = api.session_stream_target(session_id)?;
        info!(
            session_id,
            role = joined.role.as_str(),
            already_member = joined.already_member,
            logs = snapshot.logs.len(),
            "joined session"
        );

        let sync = Self::attach(api, transport, target, snapshot, policy);
        Ok((sync, joined))
    }

    /// Follow a session from an existing snapshot without any join or fetch
    /// call. `api` is still used for answers, commands and refreshes.
    pub fn attach(
        api: WrenApiClient,
        transport: Arc<dyn EventTransport>,
        target: StreamTarget,
        snapshot: SessionSnapshot,
        policy: ReconnectPolicy,
    ) -> Self {
        let session_id = snapshot.session_id().to_string();
        let store = LocalSessionStore::for_user(api.user_id());
        store.seed(snapshot);
        let notices = NoticeBoard::new();

        let (connection, events) = StreamConnection::open::<SessionStream, _>(
            Arc::clone(&transport),
            target,
            policy,
            StreamScope::Session,
        );
        let router = SessionEventRouter::new(session_id.clone(), store.clone(), notices.clone());
        let router = tokio::spawn(router.run(events));
        let accumulator = TokenAccumulator::new(api.clone(), transport);

        Self {
            session_id,
            api,
            store,
            notices,
            connection,
            router: Some(router),
            accumulator,
            answers: Mutex::new(Vec::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn store(&self) -> &LocalSessionStore {
        &self.store
    }

    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.store.subscribe()
    }

    pub fn notices(&self) -> watch::Receiver<Vec<Notice>> {
        self.notices.subscribe()
    }

    pub fn dismiss_notice(&self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Stream an answer into a preview held by the store.
    ///
    /// The preview is superseded once the matching `ai` log entry arrives on
    /// the session stream. A failed answer drops its preview and raises a
    /// notice.
    pub fn ask(&self, question: &str) -> Result<AnswerHandle, SyncError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SyncError::EmptyQuestion);
        }

        let request_id = new_request_id();
        self.store.begin_preview(&request_id, question);

        let store = self.store.clone();
        let notices = self.notices.clone();
        let emit = move |update: AnswerUpdate| match update {
            AnswerUpdate::Token {
                request_id,
                fragment,
            } => {
                store.append_preview(&request_id, &fragment);
            }
            AnswerUpdate::Completed { request_id, text } => {
                store.complete_preview(&request_id, &text);
            }
            AnswerUpdate::Failed { request_id, error } => {
                store.discard_preview(&request_id);
                notices.push(NoticeKind::Application, format!("answer failed: {error}"));
            }
        };

        let handle = self
            .accumulator
            .start_with_request_id(question, request_id.clone(), emit)
            .inspect_err(|_| {
                self.store.discard_preview(&request_id);
            })?;

        let mut answers = lock_unpoisoned(&self.answers);
        answers.retain(|answer| !answer.is_finished());
        answers.push(handle.clone());
        Ok(handle)
    }

    /// Cancel every answer still streaming and drop its preview.
    pub fn cancel_answers(&self) -> usize {
        let answers: Vec<AnswerHandle> = lock_unpoisoned(&self.answers).drain(..).collect();
        let mut cancelled = 0;
        for answer in answers {
            if answer.is_finished() {
                continue;
            }
            answer.cancel();
            self.store.discard_preview(answer.request_id());
            cancelled += 1;
        }
        cancelled
    }

    /// Submit a command.
    ///
    /// The resulting log entry is taken from the session stream only. Command
    /// responses carry a partial row (no command type, no author) and the
    /// first copy of an id wins, so applying it would shadow the full row.
    pub async fn submit(&self, command: &str) -> Result<CommandOutcome, SyncError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(SyncError::EmptyCommand);
        }

        let outcome = self.api.submit_command(&self.session_id, command, None).await?;
        debug!(
            session_id = %self.session_id,
            log_id = outcome.log_entry.as_ref().map(|entry| entry.id),
            "command accepted"
        );
        Ok(outcome)
    }

    /// Refetch the snapshot and reseed the store wholesale.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let snapshot = self.api.fetch_session(&self.session_id).await?;
        let changed = self.store.seed(snapshot);
        debug!(session_id = %self.session_id, changed, "session refreshed");
        Ok(())
    }

    /// Close the session stream, cancel answers and discard all local state.
    pub async fn leave(mut self) {
        self.connection.close();
        self.cancel_answers();
        if let Some(router) = self.router.take() {
            let _ = router.await;
        }
        self.store.clear();
        self.notices.clear();
        info!(session_id = %self.session_id, "left session");
    }
}

impl Drop for SessionSync {
    fn drop(&mut self) {
        self.connection.close();
        for answer in lock_unpoisoned(&self.answers).drain(..) {
            answer.cancel();
        }
    }
}
