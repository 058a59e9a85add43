use thiserror::Error;
use wren_api::{TransportError, WrenApiError};

/// Why a stream connection closed for good.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The server refused the stream with a status that retrying cannot fix.
    #[error("stream rejected: {0}")]
    Rejected(TransportError),

    /// The reconnect policy gave up.
    #[error("gave up after {attempts} failed attempt(s): {last}")]
    Exhausted { attempts: u32, last: TransportError },

    /// A request-scoped body ended without a terminal event.
    #[error("stream ended before completion")]
    Incomplete,
}

/// Terminal failure of one answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    /// The backend reported an in-band error.
    #[error("{0}")]
    Failed(String),

    #[error("answer stream failed: {0}")]
    Stream(#[from] StreamError),

    #[error("invalid answer target: {0}")]
    Target(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] WrenApiError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error("not attached to a session")]
    NotAttached,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("command is empty")]
    EmptyCommand,
}
