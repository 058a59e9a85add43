use std::sync::Arc;

use pretty_assertions::assert_eq;
use session_model::{LogEntry, LogKind, SessionSnapshot};
use session_store::read_transcript;
use time::macros::datetime;
use wren_api::{ReconnectPolicy, WrenApiClient, WrenApiConfig};
use wren_api_mock::{frames, Attempt, ScriptedTransport};
use wren_cli::repl::{handle_line, save_transcript, Flow};
use wren_sync::{ConnectionState, SessionSync};

fn entry(id: u64) -> LogEntry {
    LogEntry {
        id,
        speaker: "GM".to_string(),
        content: format!("entry {id}"),
        kind: LogKind::Scene,
        overridden: false,
        timestamp: datetime!(2025-03-01 10:00:00 UTC),
        author: None,
        correlation_id: None,
    }
}

async fn attach(transport: &ScriptedTransport) -> SessionSync {
    let api = WrenApiClient::new(WrenApiConfig::new("user-7").with_base_url("http://wren.test"))
        .expect("client should build");
    let target = api.session_stream_target("sr-1").expect("target");
    let mut snapshot = SessionSnapshot::empty("sr-1");
    snapshot.logs = vec![entry(1), entry(2)];
    let sync = SessionSync::attach(
        api,
        Arc::new(transport.clone()),
        target,
        snapshot,
        ReconnectPolicy::session_stream().with_jitter(0.0),
    );
    sync.watch_connection()
        .wait_for(|state| *state == ConnectionState::Open)
        .await
        .expect("connection task alive");
    sync
}

#[tokio::test(start_paused = true)]
async fn quit_ends_the_loop_and_other_lines_continue() {
    let (session, _feed) = Attempt::live();
    let transport = ScriptedTransport::new([session]);
    let sync = attach(&transport).await;

    assert_eq!(handle_line(&sync, "").await, Flow::Continue);
    assert_eq!(handle_line(&sync, "/help").await, Flow::Continue);
    assert_eq!(handle_line(&sync, "/warp").await, Flow::Continue);
    assert_eq!(handle_line(&sync, "/quit").await, Flow::Quit);

    sync.leave().await;
}

#[tokio::test(start_paused = true)]
async fn question_streams_into_a_preview_and_cancel_stops_it() {
    let (session, _feed) = Attempt::live();
    let (answer, answer_feed) = Attempt::live();
    let transport = ScriptedTransport::new([session, answer]);
    let sync = attach(&transport).await;

    assert_eq!(handle_line(&sync, "who is watching?").await, Flow::Continue);
    assert!(answer_feed.frame(frames::answer_token("A ")));
    let mut view = sync.view();
    view.wait_for(|view| view.previews().iter().any(|preview| preview.text == "A "))
        .await
        .expect("store alive");

    assert_eq!(handle_line(&sync, "/cancel").await, Flow::Continue);
    assert!(sync.store().read(|view| view.previews().is_empty()));
    assert_eq!(sync.cancel_answers(), 0);

    sync.leave().await;
}

#[tokio::test(start_paused = true)]
async fn save_writes_the_current_log_as_a_transcript() {
    let (session, _feed) = Attempt::live();
    let transport = ScriptedTransport::new([session]);
    let sync = attach(&transport).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("saved").join("night.jsonl");

    let written = save_transcript(&sync, Some(&path)).expect("transcript should save");
    assert_eq!(written, path);

    let transcript = read_transcript(&path).expect("transcript should read back");
    assert_eq!(transcript.session_id(), "sr-1");
    assert_eq!(transcript.entries, vec![entry(1), entry(2)]);

    sync.leave().await;
}
