//! JSONL export of a session's reconciled log.
//!
//! Line 1 is a `transcript` header; every following line is one `entry`
//! record carrying a [`LogEntry`] in backend field names. Entries are written
//! in ascending log-id order and the reader rejects files that break it.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use session_model::wire::format_timestamp;
use session_model::{parse_timestamp, LogEntry, LogId, SessionSnapshot};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::TranscriptError;
use crate::paths::transcript_file_name;

pub const TRANSCRIPT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderRecordType {
    Transcript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRecordType {
    Entry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptHeader {
    #[serde(rename = "type")]
    pub record_type: HeaderRecordType,
    pub version: u32,
    pub session_id: String,
    pub exported_at: String,
}

impl TranscriptHeader {
    #[must_use]
    pub fn v1(session_id: impl Into<String>, exported_at: impl Into<String>) -> Self {
        Self {
            record_type: HeaderRecordType::Transcript,
            version: TRANSCRIPT_VERSION,
            session_id: session_id.into(),
            exported_at: exported_at.into(),
        }
    }
}

#[derive(Serialize)]
struct EntryLine<'a> {
    #[serde(rename = "type")]
    record_type: EntryRecordType,
    #[serde(flatten)]
    entry: &'a LogEntry,
}

/// A transcript read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub header: TranscriptHeader,
    pub entries: Vec<LogEntry>,
}

impl Transcript {
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.header.session_id
    }

    /// Snapshot holding only the exported log, for seeding an offline view.
    #[must_use]
    pub fn into_snapshot(self) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot::empty(self.header.session_id);
        snapshot.logs = self.entries;
        snapshot
    }
}

/// Write `logs` to a new file named after the export time under `root`.
pub fn export_transcript(
    root: &Path,
    session_id: &str,
    logs: &[LogEntry],
) -> Result<PathBuf, TranscriptError> {
    let exported_at = now_rfc3339()?;
    let path = root.join(transcript_file_name(&exported_at, session_id));
    write_with_header(&path, &TranscriptHeader::v1(session_id, exported_at), logs)?;
    Ok(path)
}

/// Write `logs` to `path`, replacing any existing file.
pub fn write_transcript(
    path: &Path,
    session_id: &str,
    logs: &[LogEntry],
) -> Result<TranscriptHeader, TranscriptError> {
    let header = TranscriptHeader::v1(session_id, now_rfc3339()?);
    write_with_header(path, &header, logs)?;
    Ok(header)
}

fn write_with_header(
    path: &Path,
    header: &TranscriptHeader,
    logs: &[LogEntry],
) -> Result<(), TranscriptError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|source| TranscriptError::io("creating transcript directory", parent, source))?;
    }

    let file = File::create(path)
        .map_err(|source| TranscriptError::io("creating transcript file", path, source))?;
    let mut writer = BufWriter::new(file);

    write_json_line(&mut writer, path, header)?;
    for entry in logs {
        let line = EntryLine {
            record_type: EntryRecordType::Entry,
            entry,
        };
        write_json_line(&mut writer, path, &line)?;
    }
    writer
        .flush()
        .map_err(|source| TranscriptError::io("flushing transcript file", path, source))?;

    debug!(
        session_id = %header.session_id,
        entries = logs.len(),
        path = %path.display(),
        "transcript written"
    );
    Ok(())
}

fn write_json_line<T: Serialize>(
    writer: &mut impl Write,
    path: &Path,
    record: &T,
) -> Result<(), TranscriptError> {
    let line =
        serde_json::to_string(record).map_err(|source| TranscriptError::json_serialize(path, source))?;
    writeln!(writer, "{line}")
        .map_err(|source| TranscriptError::io("writing transcript line", path, source))
}

pub fn read_transcript(path: &Path) -> Result<Transcript, TranscriptError> {
    let file = File::open(path)
        .map_err(|source| TranscriptError::io("opening transcript file", path, source))?;
    let reader = BufReader::new(file);

    let mut header: Option<TranscriptHeader> = None;
    let mut entries: Vec<LogEntry> = Vec::new();

    for (line_index, line_result) in reader.lines().enumerate() {
        let line_number = line_index + 1;
        let line = line_result.map_err(|source| TranscriptError::io_line(path, line_number, source))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: Value = serde_json::from_str(&line)
            .map_err(|source| TranscriptError::json_line(path, line_number, source))?;
        let record_type = record.get("type").and_then(Value::as_str);

        if header.is_none() {
            if record_type != Some("transcript") {
                return Err(TranscriptError::InvalidHeaderRecord {
                    path: path.to_path_buf(),
                    line: line_number,
                });
            }
            let parsed: TranscriptHeader = serde_json::from_value(record)
                .map_err(|source| TranscriptError::json_line(path, line_number, source))?;
            validate_header_line(path, line_number, &parsed)?;
            header = Some(parsed);
            continue;
        }

        if record_type != Some("entry") {
            return Err(TranscriptError::InvalidEntryRecord {
                path: path.to_path_buf(),
                line: line_number,
            });
        }
        validate_entry_timestamp(path, line_number, &record)?;
        let entry: LogEntry = serde_json::from_value(record)
            .map_err(|source| TranscriptError::json_line(path, line_number, source))?;
        validate_entry_order(path, line_number, entries.last().map(|last| last.id), entry.id)?;
        entries.push(entry);
    }

    let header = header.ok_or_else(|| TranscriptError::MissingHeader {
        path: path.to_path_buf(),
    })?;

    Ok(Transcript { header, entries })
}

fn now_rfc3339() -> Result<String, TranscriptError> {
    format_timestamp(&OffsetDateTime::now_utc()).map_err(TranscriptError::ClockFormat)
}

fn validate_header_line(
    path: &Path,
    line_number: usize,
    header: &TranscriptHeader,
) -> Result<(), TranscriptError> {
    if header.version != TRANSCRIPT_VERSION {
        return Err(TranscriptError::UnsupportedVersion {
            path: path.to_path_buf(),
            line: line_number,
            found: header.version,
        });
    }

    if OffsetDateTime::parse(&header.exported_at, &Rfc3339).is_err() {
        return Err(TranscriptError::InvalidTimestamp {
            path: path.to_path_buf(),
            line: line_number,
            field: "exported_at",
            value: header.exported_at.clone(),
        });
    }

    Ok(())
}

fn validate_entry_timestamp(
    path: &Path,
    line_number: usize,
    record: &Value,
) -> Result<(), TranscriptError> {
    let Some(value) = record.get("timestamp").and_then(Value::as_str) else {
        // Missing or non-string timestamps surface as a decode error.
        return Ok(());
    };

    if parse_timestamp(value).is_none() {
        return Err(TranscriptError::InvalidTimestamp {
            path: path.to_path_buf(),
            line: line_number,
            field: "timestamp",
            value: value.to_string(),
        });
    }

    Ok(())
}

fn validate_entry_order(
    path: &Path,
    line_number: usize,
    previous: Option<LogId>,
    id: LogId,
) -> Result<(), TranscriptError> {
    match previous {
        Some(previous) if previous == id => Err(TranscriptError::DuplicateEntryId {
            path: path.to_path_buf(),
            line: line_number,
            id,
        }),
        Some(previous) if previous > id => Err(TranscriptError::OutOfOrderEntry {
            path: path.to_path_buf(),
            line: line_number,
            id,
            previous,
        }),
        _ => Ok(()),
    }
}
