//! Transport-only client primitives for the Wren backend.
//!
//! This crate owns URL building, headers, the `text/event-stream` frame parser,
//! wire event decoding for both push streams, the reconnect schedule and the
//! request/response calls used to create, join and inspect a session. It holds
//! no session state; reconciliation lives in `session_store` and the stream
//! lifecycle in `wren_sync`.
//!
//! [`EventTransport`] is the seam between stream connections and the network.
//! [`HttpTransport`] implements it over `reqwest`; tests substitute a scripted
//! implementation.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod transport;
pub mod url;

pub use client::WrenApiClient;
pub use config::WrenApiConfig;
pub use error::{DecodeError, TransportError, WrenApiError};
pub use events::{AnswerEvent, AnswerStream, SessionEvent, SessionStream, StreamProtocol};
pub use payload::{CommandOutcome, CreatedSession, JoinSessionRequest, JoinedSession};
pub use retry::ReconnectPolicy;
pub use sse::SseStreamParser;
pub use transport::{ByteStream, EventTransport, HttpTransport, StreamTarget};
pub use crate::url::{normalize_base_url, DEFAULT_WREN_BASE_URL};
