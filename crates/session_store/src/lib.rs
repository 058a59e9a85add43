//! Local, observable copy of a collaborative session.
//!
//! [`LocalSessionStore`] owns the reconciled [`SessionView`]: log entries in
//! ascending id order without duplicates, entities keyed by id, the current
//! scene, and in-flight answer previews. The [`transcript`] module exports the
//! reconciled log as JSONL and reads it back.

mod error;
mod paths;
mod store;
pub mod transcript;
mod view;

pub use error::TranscriptError;
pub use paths::{
    resolve_transcript_root, transcript_file_name, transcript_root, transcript_root_under,
    TRANSCRIPT_DIR_ENV,
};
pub use store::LocalSessionStore;
pub use transcript::{
    export_transcript, read_transcript, write_transcript, Transcript, TranscriptHeader,
};
pub use view::{Preview, PreviewState, SessionView, COMPLETED_PREVIEW_LIMIT};
