use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const TRANSCRIPT_DIR: [&str; 2] = [".wren", "transcripts"];
pub const TRANSCRIPT_DIR_ENV: &str = "WREN_TRANSCRIPT_DIR";

/// Directory transcripts are written to by default.
///
/// `$WREN_TRANSCRIPT_DIR` wins when set and non-empty; otherwise
/// `~/.wren/transcripts`.
#[must_use]
pub fn transcript_root() -> Option<PathBuf> {
    resolve_transcript_root(std::env::var_os(TRANSCRIPT_DIR_ENV), dirs::home_dir())
}

#[must_use]
pub fn resolve_transcript_root(
    override_dir: Option<OsString>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(dir) = override_dir.filter(|dir| !dir.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    home.map(|home| transcript_root_under(&home))
}

#[must_use]
pub fn transcript_root_under(home: &Path) -> PathBuf {
    home.join(TRANSCRIPT_DIR[0]).join(TRANSCRIPT_DIR[1])
}

#[must_use]
pub fn sanitize_timestamp_for_filename(timestamp: &str) -> String {
    timestamp
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | ' ' => '-',
            _ => c,
        })
        .collect()
}

#[must_use]
pub fn transcript_file_name(exported_at: &str, session_id: &str) -> String {
    format!(
        "{}_{}.jsonl",
        sanitize_timestamp_for_filename(exported_at),
        sanitize_timestamp_for_filename(session_id)
    )
}
