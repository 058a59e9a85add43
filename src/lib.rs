//! Streaming and session synchronization core for the Wren terminal.
//!
//! Two kinds of server-push streams feed the client. A request-scoped answer
//! stream carries the fragments of one generated answer and ends itself; a
//! long-lived session stream multiplexes log entries, entity changes and scene
//! changes for a collaborative session and is retried indefinitely.
//!
//! - [`StreamConnection`] owns one stream's open/retry/close lifecycle and
//!   delivers decoded events in arrival order over a channel.
//! - [`TokenAccumulator`] folds an answer stream into a final answer.
//! - [`SessionEventRouter`] applies session events to a
//!   [`LocalSessionStore`](session_store::LocalSessionStore).
//! - [`SessionSync`] ties them together for one joined session.
//!
//! Every store mutation is idempotent and order tolerant, so the two streams
//! may write concurrently without a lock of their own.

pub mod accumulator;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod notices;
pub mod router;
pub mod sync;

use std::sync::{Mutex, MutexGuard};

pub use accumulator::{
    new_request_id, AnswerHandle, AnswerOutcome, AnswerProgress, AnswerState, AnswerUpdate,
    TokenAccumulator,
};
pub use config::SyncConfig;
pub use connection::{
    CloseReason, ConnectionEvent, ConnectionEvents, ConnectionHandle, ConnectionState,
    StreamConnection, StreamScope,
};
pub use error::{AnswerError, StreamError, SyncError};
pub use logging::init_logging;
pub use notices::{Notice, NoticeBoard, NoticeKind};
pub use router::SessionEventRouter;
pub use sync::SessionSync;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
