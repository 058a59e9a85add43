use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use futures_util::StreamExt;
use session_model::ParticipantRole;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use wren_api::{
    EventTransport, JoinSessionRequest, SessionEvent, SessionStream, SseStreamParser,
    StreamProtocol, TransportError, WrenApiClient, WrenApiConfig, WrenApiError,
};

fn allow_local_integration() -> bool {
    std::env::var("WREN_API_ALLOW_LOCAL_INTEGRATION")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

#[derive(Clone)]
struct ResponseChunk {
    delay_ms: u64,
    bytes: Vec<u8>,
}

#[derive(Clone)]
enum ScriptedResponse {
    Respond {
        status: u16,
        content_type: &'static str,
        chunks: Vec<ResponseChunk>,
    },
    Reset,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    request_lines: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let request_lines = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);
            let request_lines = Arc::clone(&request_lines);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    let request_lines = Arc::clone(&request_lines);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count, request_lines).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            request_lines,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn request_lines(&self) -> Vec<String> {
        self.request_lines
            .lock()
            .expect("request log lock")
            .clone()
    }

    fn client(&self) -> WrenApiClient {
        WrenApiClient::new(WrenApiConfig::new("user-7").with_base_url(&self.base_url))
            .expect("client")
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn response_sse(status: u16, frames: &[&str]) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "text/event-stream",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: sse_frames(frames),
        }],
    }
}

fn response_json(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse::Respond {
        status,
        content_type: "application/json",
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: body.as_bytes().to_vec(),
        }],
    }
}

fn sse_frames(frames: &[&str]) -> Vec<u8> {
    let mut body = String::new();

    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }

    body.into_bytes()
}

#[tokio::test]
async fn session_stream_frames_arrive_in_order() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse::Respond {
        status: 200,
        content_type: "text/event-stream",
        chunks: vec![
            ResponseChunk {
                delay_ms: 0,
                bytes: sse_frames(&[r#"{"status": "connected", "session_id": "sr-1"}"#]),
            },
            ResponseChunk {
                delay_ms: 50,
                bytes: sse_frames(&[
                    r#"{"status": "log", "entry": {"log_id": 1, "speaker": "GM", "content": "Rain.", "command_type": "scene", "timestamp": "2025-03-01 10:00:00", "is_gm_override": 1}}"#,
                    r#"{"status": "heartbeat", "timestamp": "2025-03-01T10:00:02"}"#,
                ]),
            },
        ],
    }])
    .await;

    let client = server.client();
    let target = client
        .session_stream_target("sr-1")
        .expect("session target");
    let mut body = client
        .transport()
        .open(&target)
        .await
        .expect("handshake should succeed");

    let mut parser = SseStreamParser::default();
    let mut events = Vec::new();
    while let Some(chunk) = timeout(Duration::from_secs(5), body.next())
        .await
        .expect("body should make progress")
    {
        for payload in parser.feed(&chunk.expect("chunk")) {
            events.push(SessionStream::decode(&payload).expect("payload should decode"));
        }
    }

    let labels: Vec<&str> = events.iter().map(SessionEvent::label).collect();
    assert_eq!(labels, vec!["connected", "log", "heartbeat"]);
    assert!(matches!(&events[1], SessionEvent::Log(entry) if entry.overridden));
    assert!(server.request_lines()[0].starts_with("GET /api/rpg/stream/sr-1?user_id=user-7 "));

    server.shutdown();
}

#[tokio::test]
async fn session_stream_handshake_classifies_statuses() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![
        response_json(404, r#"{"status": "error", "message": "Session not found or inactive"}"#),
        response_json(503, r#"{"error": "overloaded"}"#),
    ])
    .await;

    let client = server.client();
    let transport = client.transport();
    let target = client
        .session_stream_target("sr-missing")
        .expect("session target");

    let not_found = transport.open(&target).await.err().expect("404 should fail");
    assert_eq!(
        not_found,
        TransportError::Status {
            status: 404,
            message: "Session not found or inactive".to_string(),
            retryable: false,
        }
    );

    let unavailable = transport.open(&target).await.err().expect("503 should fail");
    assert!(unavailable.is_retryable());
    assert_eq!(server.request_count(), 2);

    server.shutdown();
}

#[tokio::test]
async fn connection_reset_is_a_retryable_connect_error() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![ScriptedResponse::Reset]).await;
    let client = server.client();
    let target = client
        .answer_stream_target("hello?", "req-1")
        .expect("answer target");

    let error = client
        .transport()
        .open(&target)
        .await
        .err()
        .expect("reset should fail the handshake");
    assert!(matches!(error, TransportError::Connect(_)));
    assert!(error.is_retryable());

    server.shutdown();
}

#[tokio::test]
async fn join_treats_existing_membership_as_success() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        400,
        r#"{"error": "User already in session", "role": "gm"}"#,
    )])
    .await;

    let joined = server
        .client()
        .join_session("sr-1", &JoinSessionRequest::new("user-7"))
        .await
        .expect("rejoin should succeed");

    assert!(joined.already_member);
    assert_eq!(joined.role, ParticipantRole::Gm);
    assert!(server.request_lines()[0].starts_with("POST /api/sessions/sr-1/join "));

    server.shutdown();
}

#[tokio::test]
async fn fetch_session_decodes_snapshot() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r#"{"session": {"session_id": "sr-1", "name": "Docks", "is_active": 1}, "users": [], "scene": null, "entities": [], "logs": [{"log_id": 2, "speaker": "GM", "content": "Go.", "command_type": "echo", "timestamp": "2025-03-01 10:00:00", "is_gm_override": 0}]}"#,
    )])
    .await;

    let snapshot = server
        .client()
        .fetch_session("sr-1")
        .await
        .expect("snapshot should decode");

    assert_eq!(snapshot.session_id(), "sr-1");
    assert_eq!(snapshot.logs.len(), 1);
    assert!(snapshot.scene.is_none());

    server.shutdown();
}

#[tokio::test]
async fn command_error_status_in_body_is_rejected() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_json(
        200,
        r#"{"status": "error", "message": "Unknown command: /dance"}"#,
    )])
    .await;

    let error = server
        .client()
        .submit_command("sr-1", "/dance", None)
        .await
        .expect_err("command should be rejected");

    assert!(matches!(error, WrenApiError::Rejected(message) if message == "Unknown command: /dance"));

    server.shutdown();
}

#[tokio::test]
async fn answer_stream_carries_request_id() {
    if !allow_local_integration() {
        return;
    }

    let server = ScriptedServer::new(vec![response_sse(
        200,
        &[
            r#"{"status": "start", "content": ""}"#,
            r#"{"status": "streaming", "content": "Hel"}"#,
            r#"{"status": "streaming", "content": "lo"}"#,
            r#"{"status": "complete", "content": ""}"#,
        ],
    )])
    .await;

    let client = server.client();
    let target = client
        .answer_stream_target("greet me", "req-42")
        .expect("answer target");
    let mut body = client
        .transport()
        .open(&target)
        .await
        .expect("handshake should succeed");

    let mut parser = SseStreamParser::default();
    let mut payloads = Vec::new();
    while let Some(chunk) = body.next().await {
        payloads.extend(parser.feed(&chunk.expect("chunk")));
    }

    assert_eq!(payloads.len(), 4);
    assert!(server.request_lines()[0].contains("request_id=req-42"));

    server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
    request_lines: Arc<Mutex<Vec<String>>>,
) {
    let Ok(request_line) = read_request_head(&mut socket).await else {
        return;
    };
    if let Ok(mut lines) = request_lines.lock() {
        lines.push(request_line);
    }

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| response_json(500, r#"{"error":"unexpected request"}"#));

    match response {
        ScriptedResponse::Reset => {}
        ScriptedResponse::Respond {
            status,
            content_type,
            chunks,
        } => {
            let headers = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                status_reason(status),
                content_type,
            );

            if socket.write_all(headers.as_bytes()).await.is_err() {
                return;
            }

            for chunk in chunks {
                if chunk.delay_ms > 0 {
                    sleep(Duration::from_millis(chunk.delay_ms)).await;
                }
                let prefix = format!("{:X}\r\n", chunk.bytes.len());
                if socket.write_all(prefix.as_bytes()).await.is_err() {
                    return;
                }
                if socket.write_all(&chunk.bytes).await.is_err() {
                    return;
                }
                if socket.write_all(b"\r\n").await.is_err() {
                    return;
                }
            }

            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
    }
}

/// Read the request head and body; returns the request line.
async fn read_request_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break request.len();
        }
        request.extend_from_slice(&buffer[..n]);
        if let Some(position) = request.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&request[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while request.len() < head_end + content_length {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..n]);
    }

    Ok(head.lines().next().unwrap_or_default().to_string())
}
