use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::json;
use session_model::{LogEntry, LogKind};
use session_store::{
    export_transcript, read_transcript, write_transcript, LocalSessionStore, TranscriptError,
};
use tempfile::TempDir;
use time::macros::datetime;

fn write_transcript_file(lines: &[String]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("transcript.jsonl");
    let mut file = File::create(&path).expect("transcript file should be created");

    for line in lines {
        writeln!(file, "{line}").expect("line should be written");
    }

    (dir, path)
}

fn header_line(version: u32) -> String {
    json!({
        "type": "transcript",
        "version": version,
        "session_id": "sr-1a2b3c4d",
        "exported_at": "2025-03-01T10:00:00Z",
    })
    .to_string()
}

fn entry_line(id: u64, timestamp: &str) -> String {
    json!({
        "type": "entry",
        "log_id": id,
        "speaker": "WREN",
        "content": format!("entry {id}"),
        "command_type": "ai",
        "is_gm_override": false,
        "timestamp": timestamp,
    })
    .to_string()
}

fn entry(id: u64, kind: LogKind, content: &str) -> LogEntry {
    LogEntry {
        id,
        speaker: "Runner-0042".to_string(),
        content: content.to_string(),
        kind,
        overridden: false,
        timestamp: datetime!(2025-03-01 10:15:30 UTC),
        author: Some("user-7".to_string()),
        correlation_id: None,
    }
}

#[test]
fn written_transcript_reads_back_in_order() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("nested").join("out.jsonl");
    let logs = vec![
        entry(1, LogKind::Scene, "Docks, night"),
        entry(2, LogKind::Roll, "rolls 6d6: 4 hits"),
        entry(4, LogKind::Ai, "The guard turns."),
    ];

    let header = write_transcript(&path, "sr-1a2b3c4d", &logs).expect("transcript should write");
    let transcript = read_transcript(&path).expect("transcript should read");

    assert_eq!(transcript.header, header);
    assert_eq!(transcript.session_id(), "sr-1a2b3c4d");
    assert_eq!(transcript.entries, logs);
}

#[test]
fn export_names_file_after_session_and_seeds_an_offline_view() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let logs = vec![entry(7, LogKind::Echo, "hello")];

    let path = export_transcript(dir.path(), "sr-1a2b3c4d", &logs).expect("export should succeed");
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .expect("utf-8 file name")
        .to_string();
    assert!(file_name.ends_with("_sr-1a2b3c4d.jsonl"), "{file_name}");
    assert!(!file_name.contains(':'));

    let store = LocalSessionStore::new();
    store.seed(read_transcript(&path).expect("export should read").into_snapshot());
    assert_eq!(store.read(|view| view.logs().to_vec()), logs);
    assert_eq!(
        store.read(|view| view.session_id().map(str::to_string)),
        Some("sr-1a2b3c4d".to_string())
    );
}

#[test]
fn naive_backend_timestamps_are_accepted() {
    let (_dir, path) = write_transcript_file(&[
        header_line(1),
        entry_line(1, "2025-03-01 10:15:30"),
        String::new(),
        entry_line(2, "2025-03-01T10:16:00.250000"),
    ]);

    let transcript = read_transcript(&path).expect("transcript should read");
    assert_eq!(transcript.entries.len(), 2);
    assert_eq!(transcript.entries[0].timestamp, datetime!(2025-03-01 10:15:30 UTC));
}

#[test]
fn rejects_missing_header() {
    let (_dir, path) = write_transcript_file(&[]);

    let error = read_transcript(&path).expect_err("empty file must fail");
    assert!(matches!(error, TranscriptError::MissingHeader { .. }));
}

#[test]
fn rejects_entry_as_first_line() {
    let (_dir, path) = write_transcript_file(&[entry_line(1, "2025-03-01T10:00:00Z")]);

    let error = read_transcript(&path).expect_err("entry-first file must fail");
    assert!(matches!(error, TranscriptError::InvalidHeaderRecord { line: 1, .. }));
}

#[test]
fn rejects_second_header() {
    let (_dir, path) = write_transcript_file(&[header_line(1), header_line(1)]);

    let error = read_transcript(&path).expect_err("second header must fail");
    assert!(matches!(error, TranscriptError::InvalidEntryRecord { line: 2, .. }));
}

#[test]
fn rejects_unsupported_version() {
    let (_dir, path) = write_transcript_file(&[header_line(2)]);

    let error = read_transcript(&path).expect_err("version 2 must fail");
    assert!(matches!(error, TranscriptError::UnsupportedVersion { found: 2, .. }));
}

#[test]
fn rejects_duplicate_and_out_of_order_ids() {
    let (_dir, duplicate) = write_transcript_file(&[
        header_line(1),
        entry_line(3, "2025-03-01T10:00:00Z"),
        entry_line(3, "2025-03-01T10:00:00Z"),
    ]);
    let error = read_transcript(&duplicate).expect_err("duplicate id must fail");
    assert!(matches!(error, TranscriptError::DuplicateEntryId { line: 3, id: 3, .. }));

    let (_dir, out_of_order) = write_transcript_file(&[
        header_line(1),
        entry_line(5, "2025-03-01T10:00:00Z"),
        entry_line(4, "2025-03-01T10:00:00Z"),
    ]);
    let error = read_transcript(&out_of_order).expect_err("descending ids must fail");
    assert!(matches!(
        error,
        TranscriptError::OutOfOrderEntry { line: 3, id: 4, previous: 5, .. }
    ));
}

#[test]
fn rejects_invalid_timestamp_with_field_name() {
    let (_dir, path) = write_transcript_file(&[header_line(1), entry_line(1, "yesterday")]);

    let error = read_transcript(&path).expect_err("bad timestamp must fail");
    match error {
        TranscriptError::InvalidTimestamp { line, field, value, .. } => {
            assert_eq!(line, 2);
            assert_eq!(field, "timestamp");
            assert_eq!(value, "yesterday");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reports_json_errors_with_line() {
    let (_dir, path) = write_transcript_file(&[header_line(1), "{not json".to_string()]);

    let error = read_transcript(&path).expect_err("malformed line must fail");
    assert!(matches!(error, TranscriptError::JsonLineParse { line: 2, .. }));
    assert!(error.to_string().contains(":2:"));
}
