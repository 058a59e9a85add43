//! Assembly of one streamed answer.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;
use wren_api::{AnswerEvent, AnswerStream, EventTransport, ReconnectPolicy, WrenApiClient};

use crate::connection::{
    CloseReason, ConnectionEvent, ConnectionEvents, ConnectionHandle, StreamConnection,
    StreamScope,
};
use crate::error::{AnswerError, StreamError};
use crate::lock_unpoisoned;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerUpdate {
    Token { request_id: String, fragment: String },
    Completed { request_id: String, text: String },
    Failed { request_id: String, error: AnswerError },
}

impl AnswerUpdate {
    pub fn request_id(&self) -> &str {
        match self {
            Self::Token { request_id, .. }
            | Self::Completed { request_id, .. }
            | Self::Failed { request_id, .. } => request_id,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerState {
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl AnswerState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Streaming)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerProgress {
    pub fragments: usize,
    pub chars: usize,
    pub state: AnswerState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Completed(String),
    Failed(AnswerError),
    Cancelled,
}

type Emitter = Box<dyn FnMut(AnswerUpdate) + Send + 'static>;

struct Gate {
    emit: Option<Emitter>,
    outcome: Option<AnswerOutcome>,
}

struct Shared {
    request_id: String,
    gate: Mutex<Gate>,
    progress: watch::Sender<AnswerProgress>,
}

impl Shared {
    fn deliver(&self, update: AnswerUpdate) {
        let mut gate = lock_unpoisoned(&self.gate);
        if gate.outcome.is_some() {
            return;
        }
        if let Some(emit) = gate.emit.as_mut() {
            emit(update);
        }
    }

    /// Record the outcome once; the terminal update, if any, is the last
    /// thing the emitter ever sees.
    fn finish(&self, outcome: AnswerOutcome, update: Option<AnswerUpdate>) -> bool {
        let mut gate = lock_unpoisoned(&self.gate);
        if gate.outcome.is_some() {
            return false;
        }
        if let (Some(mut emit), Some(update)) = (gate.emit.take(), update) {
            debug_assert!(update.is_terminal());
            emit(update);
        }
        let state = match &outcome {
            AnswerOutcome::Completed(_) => AnswerState::Completed,
            AnswerOutcome::Failed(_) => AnswerState::Failed,
            AnswerOutcome::Cancelled => AnswerState::Cancelled,
        };
        gate.outcome = Some(outcome);
        self.progress.send_modify(|progress| progress.state = state);
        true
    }
}

/// Opens answer streams and folds their fragments into final answers.
#[derive(Clone)]
pub struct TokenAccumulator {
    api: WrenApiClient,
    transport: Arc<dyn EventTransport>,
    policy: ReconnectPolicy,
}

impl TokenAccumulator {
    pub fn new(api: WrenApiClient, transport: Arc<dyn EventTransport>) -> Self {
        Self {
            api,
            transport,
            policy: ReconnectPolicy::token_stream(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start streaming an answer to `question`.
    ///
    /// `emit` receives every fragment in arrival order, then exactly one
    /// `Completed` or `Failed` update. It runs under the handle's gate and must
    /// not call back into the handle.
    pub fn start<F>(&self, question: &str, emit: F) -> Result<AnswerHandle, AnswerError>
    where
        F: FnMut(AnswerUpdate) + Send + 'static,
    {
        self.start_with_request_id(question, new_request_id(), emit)
    }

    /// Like [`Self::start`] with a caller-chosen request id, so state keyed by
    /// it can exist before the first fragment arrives.
    pub fn start_with_request_id<F>(
        &self,
        question: &str,
        request_id: String,
        emit: F,
    ) -> Result<AnswerHandle, AnswerError>
    where
        F: FnMut(AnswerUpdate) + Send + 'static,
    {
        let target = self
            .api
            .answer_stream_target(question, &request_id)
            .map_err(|error| AnswerError::Target(error.to_string()))?;

        let (connection, events) = StreamConnection::open::<AnswerStream, _>(
            Arc::clone(&self.transport),
            target,
            self.policy.clone(),
            StreamScope::Request,
        );

        let (progress, _) = watch::channel(AnswerProgress {
            fragments: 0,
            chars: 0,
            state: AnswerState::Streaming,
        });
        let shared = Arc::new(Shared {
            request_id: request_id.clone(),
            gate: Mutex::new(Gate {
                emit: Some(Box::new(emit)),
                outcome: None,
            }),
            progress,
        });

        debug!(request_id = %request_id, "answer stream started");
        tokio::spawn(consume(Arc::clone(&shared), events));

        Ok(AnswerHandle { shared, connection })
    }
}

/// Client-generated request id sent with an answer stream.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

async fn consume(shared: Arc<Shared>, mut events: ConnectionEvents<AnswerEvent>) {
    let request_id = shared.request_id.clone();
    let mut buffer = String::new();

    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::Opened { .. } | ConnectionEvent::Event(AnswerEvent::Started) => {}
            ConnectionEvent::Event(AnswerEvent::Token { fragment }) => {
                if fragment.is_empty() {
                    continue;
                }
                buffer.push_str(&fragment);
                shared.progress.send_modify(|progress| {
                    progress.fragments += 1;
                    progress.chars += fragment.chars().count();
                });
                shared.deliver(AnswerUpdate::Token {
                    request_id: request_id.clone(),
                    fragment,
                });
            }
            ConnectionEvent::Event(AnswerEvent::Completed) => {
                let text = std::mem::take(&mut buffer);
                debug!(request_id = %request_id, chars = text.len(), "answer completed");
                shared.finish(
                    AnswerOutcome::Completed(text.clone()),
                    Some(AnswerUpdate::Completed {
                        request_id: request_id.clone(),
                        text,
                    }),
                );
            }
            ConnectionEvent::Event(AnswerEvent::Failed { message }) => {
                fail(&shared, AnswerError::Failed(message));
            }
            ConnectionEvent::ParseError(error) => {
                warn!(request_id = %request_id, error = %error, "skipping undecodable answer event");
            }
            ConnectionEvent::Reconnecting { attempt, .. } => {
                debug!(request_id = %request_id, attempt, "answer stream reconnecting");
            }
            ConnectionEvent::Closed(CloseReason::Fatal(error)) => {
                fail(&shared, AnswerError::Stream(error));
            }
            ConnectionEvent::Closed(CloseReason::Completed | CloseReason::Cancelled) => {}
        }
    }

    // Cancellation already recorded its outcome; anything else ending here
    // without a terminal event is an interrupted answer.
    fail(&shared, AnswerError::Stream(StreamError::Incomplete));
}

fn fail(shared: &Shared, error: AnswerError) {
    let request_id = shared.request_id.clone();
    if shared.finish(
        AnswerOutcome::Failed(error.clone()),
        Some(AnswerUpdate::Failed {
            request_id: request_id.clone(),
            error: error.clone(),
        }),
    ) {
        warn!(request_id = %request_id, error = %error, "answer failed");
    }
}

/// Caller side of one streamed answer.
#[derive(Clone)]
pub struct AnswerHandle {
    shared: Arc<Shared>,
    connection: ConnectionHandle,
}

impl AnswerHandle {
    pub fn request_id(&self) -> &str {
        &self.shared.request_id
    }

    pub fn progress(&self) -> AnswerProgress {
        *self.shared.progress.borrow()
    }

    pub fn watch_progress(&self) -> watch::Receiver<AnswerProgress> {
        self.shared.progress.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.progress().state.is_terminal()
    }

    /// Stop the answer. No update reaches the emitter once this returns.
    pub fn cancel(&self) {
        self.connection.close();
        if self.shared.finish(AnswerOutcome::Cancelled, None) {
            debug!(request_id = %self.shared.request_id, "answer cancelled");
        }
    }

    /// Resolve to the final outcome.
    pub async fn wait(&self) -> AnswerOutcome {
        let mut progress = self.shared.progress.subscribe();
        let _ = progress.wait_for(|progress| progress.state.is_terminal()).await;
        lock_unpoisoned(&self.shared.gate)
            .outcome
            .clone()
            .unwrap_or(AnswerOutcome::Cancelled)
    }
}

impl std::fmt::Debug for AnswerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerHandle")
            .field("request_id", &self.shared.request_id)
            .field("progress", &self.progress())
            .finish()
    }
}
