//! One server-push stream and its open/retry/close lifecycle.
//!
//! [`StreamConnection::open`] spawns a single task per connection. The task
//! opens the transport, feeds body chunks through the SSE parser, decodes each
//! payload with the stream's [`StreamProtocol`] and pushes the result onto a
//! bounded channel, one event at a time in arrival order. Transport failures
//! are retried according to the [`ReconnectPolicy`]; the failure counter
//! resets on every successful open.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wren_api::{
    ByteStream, DecodeError, EventTransport, ReconnectPolicy, SseStreamParser, StreamProtocol,
    StreamTarget, TransportError,
};

use crate::error::StreamError;

/// Capacity of the per-connection event channel.
pub const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifetime of the stream on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamScope {
    /// Stays open for the whole session; a clean end of body is a drop.
    Session,
    /// Ends with a terminal event; a clean end of body before it is fatal.
    Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Cancelled,
    Completed,
    Fatal(StreamError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent<E> {
    /// The handshake succeeded. `attempt` counts every open since the start.
    Opened { attempt: u32 },
    Event(E),
    /// One payload could not be decoded and was skipped.
    ParseError(DecodeError),
    /// The transport dropped; the next open follows after `delay`.
    Reconnecting {
        attempt: u32,
        delay: Duration,
        error: TransportError,
    },
    Closed(CloseReason),
}

/// Caller side of an open connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver observing every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the connection. Once this returns the paired
    /// [`ConnectionEvents`] yields nothing more, buffered events included.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.state() == ConnectionState::Closed
    }

    /// Wait until the connection task has reached `Closed`.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|state| *state == ConnectionState::Closed).await;
    }
}

/// Consumer side of an open connection.
#[derive(Debug)]
pub struct ConnectionEvents<E> {
    rx: mpsc::Receiver<ConnectionEvent<E>>,
    closed: Arc<AtomicBool>,
}

impl<E> ConnectionEvents<E> {
    /// Next event, or `None` once the connection is closed.
    pub async fn recv(&mut self) -> Option<ConnectionEvent<E>> {
        if self.closed.load(Ordering::SeqCst) {
            self.rx.close();
            return None;
        }
        let event = self.rx.recv().await?;
        if self.closed.load(Ordering::SeqCst) {
            self.rx.close();
            return None;
        }
        Some(event)
    }
}

pub struct StreamConnection;

impl StreamConnection {
    /// Spawn the connection task. Must be called inside a tokio runtime.
    pub fn open<P, T>(
        transport: T,
        target: StreamTarget,
        policy: ReconnectPolicy,
        scope: StreamScope,
    ) -> (ConnectionHandle, ConnectionEvents<P::Event>)
    where
        P: StreamProtocol,
        T: EventTransport,
    {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let cancel = CancellationToken::new();
        let closed = Arc::new(AtomicBool::new(false));

        let task = ConnectionTask::<P, T> {
            transport,
            target,
            policy,
            scope,
            tx,
            state: state_tx,
            cancel: cancel.clone(),
            _protocol: std::marker::PhantomData,
        };
        tokio::spawn(task.run());

        (
            ConnectionHandle {
                state: state_rx,
                cancel,
                closed: Arc::clone(&closed),
            },
            ConnectionEvents { rx, closed },
        )
    }
}

enum Exit {
    Cancelled,
    Completed,
    ReceiverGone,
    Dropped(TransportError),
}

struct ConnectionTask<P: StreamProtocol, T> {
    transport: T,
    target: StreamTarget,
    policy: ReconnectPolicy,
    scope: StreamScope,
    tx: mpsc::Sender<ConnectionEvent<P::Event>>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    _protocol: std::marker::PhantomData<fn() -> P>,
}

impl<P, T> ConnectionTask<P, T>
where
    P: StreamProtocol,
    T: EventTransport,
{
    async fn run(self) {
        let reason = self.drive().await;
        self.state.send_replace(ConnectionState::Closed);

        let Some(reason) = reason else {
            debug!(stream = P::NAME, "stream consumer gone; connection closed");
            return;
        };
        match &reason {
            CloseReason::Fatal(error) => warn!(stream = P::NAME, error = %error, "stream closed"),
            reason => debug!(stream = P::NAME, ?reason, "stream closed"),
        }
        if reason != CloseReason::Cancelled {
            let _ = self.tx.send(ConnectionEvent::Closed(reason)).await;
        }
    }

    /// Returns `None` when the consumer dropped its receiver.
    async fn drive(&self) -> Option<CloseReason> {
        let mut opens: u32 = 0;
        let mut failures: u32 = 0;
        let mut parser = SseStreamParser::default();

        loop {
            opens += 1;
            self.state.send_replace(ConnectionState::Connecting);
            debug!(stream = P::NAME, attempt = opens, url = %self.target.url, "opening stream");

            let opened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Some(CloseReason::Cancelled),
                opened = self.transport.open(&self.target) => opened,
            };

            let error = match opened {
                Ok(body) => {
                    failures = 0;
                    self.state.send_replace(ConnectionState::Open);
                    if opens > 1 {
                        info!(stream = P::NAME, attempt = opens, "stream reconnected");
                    }
                    if let Err(exit) = self.emit(ConnectionEvent::Opened { attempt: opens }).await {
                        return exit_reason(exit);
                    }
                    match self.pump(body, &mut parser).await {
                        Exit::Dropped(error) => error,
                        exit => return exit_reason(exit),
                    }
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Some(CloseReason::Fatal(StreamError::Rejected(error)));
            }
            if self.scope == StreamScope::Request && error == TransportError::EndOfStream {
                return Some(CloseReason::Fatal(StreamError::Incomplete));
            }

            failures += 1;
            let Some(delay) = self.policy.delay(failures) else {
                return Some(CloseReason::Fatal(StreamError::Exhausted {
                    attempts: failures,
                    last: error,
                }));
            };

            self.state.send_replace(ConnectionState::Reconnecting);
            warn!(
                stream = P::NAME,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "stream dropped; reconnecting"
            );
            let reconnecting = ConnectionEvent::Reconnecting {
                attempt: failures,
                delay,
                error,
            };
            if let Err(exit) = self.emit(reconnecting).await {
                return exit_reason(exit);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Some(CloseReason::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Feed one body through `parser`. A body that ends or fails leaves the
    /// parser reset, so a partial frame never carries into the next attempt.
    async fn pump(&self, mut body: ByteStream, parser: &mut SseStreamParser) -> Exit {
        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Exit::Cancelled,
                chunk = body.next() => chunk,
            };

            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(error)) => {
                    discard_partial_frame::<P>(parser);
                    return Exit::Dropped(error);
                }
                None => {
                    discard_partial_frame::<P>(parser);
                    return Exit::Dropped(TransportError::EndOfStream);
                }
            };

            for payload in parser.feed(&bytes) {
                match P::decode(&payload) {
                    Ok(event) => {
                        let terminal = self.scope == StreamScope::Request && P::is_terminal(&event);
                        if let Err(exit) = self.emit(ConnectionEvent::Event(event)).await {
                            return exit;
                        }
                        if terminal {
                            return Exit::Completed;
                        }
                    }
                    Err(error) => {
                        warn!(stream = P::NAME, error = %error, "skipping undecodable stream event");
                        if let Err(exit) = self.emit(ConnectionEvent::ParseError(error)).await {
                            return exit;
                        }
                    }
                }
            }
        }
    }

    async fn emit(&self, event: ConnectionEvent<P::Event>) -> Result<(), Exit> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Exit::Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| Exit::ReceiverGone),
        }
    }
}

fn discard_partial_frame<P: StreamProtocol>(parser: &mut SseStreamParser) {
    if !parser.is_empty_buffer() {
        debug!(stream = P::NAME, "discarding unterminated frame at end of body");
    }
    parser.reset();
}

fn exit_reason(exit: Exit) -> Option<CloseReason> {
    match exit {
        Exit::Cancelled => Some(CloseReason::Cancelled),
        Exit::Completed => Some(CloseReason::Completed),
        Exit::ReceiverGone => None,
        Exit::Dropped(error) => Some(CloseReason::Fatal(StreamError::Rejected(error))),
    }
}
