//! Deterministic scripted implementation of the `wren_api` stream transport.
//!
//! Each call to `open` consumes the next scripted [`Attempt`]: a refused
//! handshake, a fixed list of body [`Step`]s, or a live body fed from the test
//! through a [`LiveFeed`]. The crate contains no network code and is intended
//! for connection-level tests and offline runs.

pub mod frames;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};
use tokio::sync::mpsc;
use wren_api::{ByteStream, EventTransport, StreamTarget, TransportError};

/// One body step of a served attempt.
#[derive(Debug, Clone)]
pub enum Step {
    /// A `data:` frame carrying the given JSON payload.
    Frame(String),
    /// Raw body bytes, delivered as one chunk.
    Bytes(Vec<u8>),
    /// Pause before the next step.
    Wait(Duration),
    /// Fail the body with a transport error; the stream ends afterwards.
    Fail(TransportError),
    /// Keep the stream open forever.
    Hold,
}

/// Scripted outcome of one `open` call.
#[derive(Debug)]
pub enum Attempt {
    Refuse(TransportError),
    Serve(Vec<Step>),
    Live(mpsc::UnboundedReceiver<Result<Bytes, TransportError>>),
}

impl Attempt {
    pub fn serve(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::Serve(steps.into_iter().collect())
    }

    /// Serve the given frames and then end the body cleanly.
    pub fn frames<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Serve(payloads.into_iter().map(|p| Step::Frame(p.into())).collect())
    }

    pub fn refuse_status(status: u16, message: impl Into<String>, retryable: bool) -> Self {
        Self::Refuse(TransportError::Status {
            status,
            message: message.into(),
            retryable,
        })
    }

    pub fn refuse_connect() -> Self {
        Self::Refuse(TransportError::Connect("connection refused".to_string()))
    }

    /// A body driven by the returned feed; dropping the feed ends the body cleanly.
    pub fn live() -> (Self, LiveFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::Live(rx), LiveFeed { tx })
    }
}

/// Test-side handle pushing chunks into a live attempt.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    tx: mpsc::UnboundedSender<Result<Bytes, TransportError>>,
}

impl LiveFeed {
    /// Push one `data:` frame. Returns false once the reader is gone.
    pub fn frame(&self, payload: impl AsRef<str>) -> bool {
        self.bytes(frames::sse(payload.as_ref()))
    }

    pub fn bytes(&self, bytes: impl Into<Vec<u8>>) -> bool {
        self.tx.send(Ok(Bytes::from(bytes.into()))).is_ok()
    }

    /// Fail the body; the reader observes the error and then the end of the body.
    pub fn fail(self, error: TransportError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
struct ScriptState {
    attempts: VecDeque<Attempt>,
    opened: Vec<StreamTarget>,
}

/// [`EventTransport`] that replays scripted attempts in order.
///
/// Once the script runs out every further `open` is refused with a
/// retryable connect error.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new(attempts: impl IntoIterator<Item = Attempt>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                attempts: attempts.into_iter().collect(),
                opened: Vec::new(),
            })),
        }
    }

    /// Append another attempt to the script.
    pub fn push(&self, attempt: Attempt) {
        lock_unpoisoned(&self.state).attempts.push_back(attempt);
    }

    /// Targets passed to `open`, in call order.
    pub fn opened(&self) -> Vec<StreamTarget> {
        lock_unpoisoned(&self.state).opened.clone()
    }

    pub fn open_count(&self) -> usize {
        lock_unpoisoned(&self.state).opened.len()
    }

    pub fn remaining(&self) -> usize {
        lock_unpoisoned(&self.state).attempts.len()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl EventTransport for ScriptedTransport {
    fn open(&self, target: &StreamTarget) -> BoxFuture<'static, Result<ByteStream, TransportError>> {
        let attempt = {
            let mut state = lock_unpoisoned(&self.state);
            state.opened.push(target.clone());
            state.attempts.pop_front()
        };

        let result = match attempt {
            None => Err(TransportError::Connect("script exhausted".to_string())),
            Some(Attempt::Refuse(error)) => Err(error),
            Some(Attempt::Serve(steps)) => Ok(scripted_body(steps)),
            Some(Attempt::Live(rx)) => Ok(live_body(rx)),
        };

        async move { result }.boxed()
    }
}

fn scripted_body(steps: Vec<Step>) -> ByteStream {
    stream::unfold(steps.into_iter(), |mut steps| async move {
        loop {
            match steps.next()? {
                Step::Frame(payload) => {
                    return Some((Ok(Bytes::from(frames::sse(&payload))), steps));
                }
                Step::Bytes(bytes) => return Some((Ok(Bytes::from(bytes)), steps)),
                Step::Wait(delay) => tokio::time::sleep(delay).await,
                Step::Fail(error) => return Some((Err(error), Vec::new().into_iter())),
                Step::Hold => std::future::pending::<()>().await,
            }
        }
    })
    .boxed()
}

fn live_body(rx: mpsc::UnboundedReceiver<Result<Bytes, TransportError>>) -> ByteStream {
    stream::unfold((rx, false), |(mut rx, failed)| async move {
        if failed {
            return None;
        }
        let item = rx.recv().await?;
        let failed = item.is_err();
        Some((item, (rx, failed)))
    })
    .boxed()
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
