//! Senders against real local sockets, files and an in-process HEC endpoint.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::{get, post};
use axum::{Json, Router};
use noise_core::{
    Destination, DestinationKind, Event, EventFormat, SendError, Sender, SenderFactory,
    SyslogFormat, SyslogProtocol,
};
use noise_senders::file::backup_path;
use noise_senders::{DestinationSenderFactory, FileSender, HecConfig, HecSender, SyslogSender};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, UdpSocket};

fn event(raw: &str) -> Event {
    let mut event = Event::new("linux_auth", "ssh_failed", EventFormat::Syslog, raw);
    event.host = "bastion-01".to_string();
    event.source = "sshd".to_string();
    event
}

// ============================================================================
// Syslog
// ============================================================================

#[tokio::test]
async fn test_udp_one_datagram_per_event() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = receiver.local_addr().unwrap().port();

    let sender = SyslogSender::connect("127.0.0.1", port, SyslogProtocol::Udp, SyslogFormat::Rfc5424)
        .await
        .unwrap();
    sender.send(&event("Failed password for root")).await.unwrap();

    let mut buf = vec![0u8; 2048];
    let n = tokio::time::timeout(Duration::from_secs(2), receiver.recv(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let message = std::str::from_utf8(&buf[..n]).unwrap();
    assert!(message.starts_with("<86>1 "), "{}", message);
    assert!(message.ends_with(" bastion-01 sshd - - - Failed password for root"));

    sender.close().await.unwrap();
    assert!(matches!(
        sender.send(&event("after close")).await,
        Err(SendError::Closed)
    ));
}

#[tokio::test]
async fn test_tcp_newline_framing() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let sender = SyslogSender::connect("127.0.0.1", port, SyslogProtocol::Tcp, SyslogFormat::Rfc3164)
        .await
        .unwrap();
    let (mut stream, _) = listener.accept().await.unwrap();

    sender.send(&event("first")).await.unwrap();
    sender.send(&event("second")).await.unwrap();
    sender.close().await.unwrap();

    let mut received = String::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_string(&mut received))
        .await
        .unwrap()
        .unwrap();

    let lines: Vec<&str> = received.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("<86>"));
    assert!(lines[0].ends_with(" bastion-01 sshd: first"));
    assert!(lines[1].ends_with(" bastion-01 sshd: second"));
}

#[tokio::test]
async fn test_tcp_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result =
        SyslogSender::connect("127.0.0.1", port, SyslogProtocol::Tcp, SyslogFormat::Rfc5424).await;
    assert!(matches!(result, Err(SendError::Io(_))));
}

// ============================================================================
// File
// ============================================================================

#[tokio::test]
async fn test_file_rotation_keeps_max_backups() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.log");
    let sender = FileSender::with_max_bytes(&path, 100, 2).await.unwrap();

    // 40 bytes + newline: two lines fit per file
    for i in 1..=7 {
        sender.send(&event(&format!("{:<40}", i))).await.unwrap();
    }
    sender.close().await.unwrap();

    let read = |p: &std::path::Path| {
        std::fs::read_to_string(p)
            .unwrap()
            .lines()
            .map(|l| l.trim().to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(read(&path), vec!["7"]);
    assert_eq!(read(&backup_path(&path, 1)), vec!["5", "6"]);
    assert_eq!(read(&backup_path(&path, 2)), vec!["3", "4"]);
    assert!(!backup_path(&path, 3).exists());

    assert!(matches!(sender.send(&event("late")).await, Err(SendError::Closed)));
}

#[tokio::test]
async fn test_file_appends_to_existing_and_flattens_newlines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.log");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "existing\n").unwrap();

    let sender = FileSender::open(&path, 1, 1).await.unwrap();
    sender.test().await.unwrap();
    sender.send(&event("multi\nline")).await.unwrap();
    sender.close().await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\nmulti line\n");
}

#[tokio::test]
async fn test_file_line_visible_before_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tail.log");
    let sender = FileSender::open(&path, 1, 1).await.unwrap();

    sender.send(&event("first")).await.unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\n");
    sender.send(&event("second")).await.unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
}

#[tokio::test]
async fn test_file_failed_rotation_keeps_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.log");
    let sender = FileSender::with_max_bytes(&path, 100, 1).await.unwrap();

    // A non-empty directory where the backup goes makes the rotation fail
    let blocker = backup_path(&path, 1);
    std::fs::create_dir_all(&blocker).unwrap();
    std::fs::write(blocker.join("keep"), "x").unwrap();

    for i in 1..=3 {
        sender.send(&event(&format!("{:<40}", i))).await.unwrap();
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);

    std::fs::remove_dir_all(&blocker).unwrap();
    sender.send(&event(&format!("{:<40}", 4))).await.unwrap();
    sender.close().await.unwrap();

    assert_eq!(std::fs::read_to_string(&blocker).unwrap().lines().count(), 3);
    assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "4");
}

// ============================================================================
// HEC
// ============================================================================

const TOKEN: &str = "good-token";

#[derive(Clone, Default)]
struct Collector {
    events: Arc<Mutex<Vec<Value>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some("Splunk good-token")
}

async fn collect(
    State(collector): State<Collector>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    if !authorized(&headers) {
        return (StatusCode::FORBIDDEN, r#"{"text":"Invalid token","code":4}"#);
    }
    collector.events.lock().unwrap().push(body);
    (StatusCode::OK, r#"{"text":"Success","code":0}"#)
}

async fn health(headers: HeaderMap) -> (StatusCode, &'static str) {
    if authorized(&headers) {
        (StatusCode::OK, r#"{"text":"HEC is healthy","code":17}"#)
    } else {
        (StatusCode::FORBIDDEN, r#"{"text":"Invalid token","code":4}"#)
    }
}

async fn spawn_hec() -> (String, Collector) {
    let collector = Collector::default();
    let app = Router::new()
        .route("/services/collector/event", post(collect))
        .route("/services/collector/health", get(health))
        .with_state(collector.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), collector)
}

fn hec_config(url: &str, token: &str) -> HecConfig {
    HecConfig {
        url: url.to_string(),
        token: token.to_string(),
        index: Some("noise".to_string()),
        sourcetype: None,
        insecure_skip_verify: false,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_hec_posts_event_envelope() {
    let (url, collector) = spawn_hec().await;
    let sender = HecSender::new(hec_config(&url, TOKEN)).unwrap();

    sender.test().await.unwrap();

    let mut json_event = Event::new("dns_query", "query_blocked", EventFormat::Json, r#"{"action":"blocked"}"#);
    json_event.sourcetype = "dns:query".to_string();
    sender.send(&json_event).await.unwrap();
    sender.send(&event("Failed password for root")).await.unwrap();

    let events = collector.events.lock().unwrap().clone();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"]["action"], "blocked");
    assert_eq!(events[0]["sourcetype"], "dns:query");
    assert_eq!(events[0]["index"], "noise");
    assert!(events[0]["time"].as_f64().unwrap() > 1_600_000_000.0);
    assert_eq!(events[1]["event"], "Failed password for root");
    assert_eq!(events[1]["host"], "bastion-01");
}

#[tokio::test]
async fn test_hec_bad_token_is_status_error() {
    let (url, collector) = spawn_hec().await;
    let sender = HecSender::new(hec_config(&url, "wrong")).unwrap();

    match sender.send(&event("x")).await {
        Err(SendError::Status { code, body }) => {
            assert_eq!(code, 403);
            assert!(body.contains("Invalid token"));
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(matches!(sender.test().await, Err(SendError::Status { code: 403, .. })));
    assert!(collector.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_hec_unreachable_is_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let sender = HecSender::new(hec_config(&url, TOKEN)).unwrap();
    assert!(matches!(sender.send(&event("x")).await, Err(SendError::Http(_))));
}

// ============================================================================
// Factory
// ============================================================================

#[tokio::test]
async fn test_factory_builds_by_kind() {
    let dir = tempfile::tempdir().unwrap();
    let factory = DestinationSenderFactory::new();

    let file = Destination {
        id: "file-1".to_string(),
        name: "Local file".to_string(),
        kind: DestinationKind::File {
            path: dir.path().join("noise.log"),
            max_size_mb: 1,
            max_backups: 1,
        },
    };
    let sender = factory.connect(&file).await.unwrap();
    sender.send(&event("via factory")).await.unwrap();
    sender.close().await.unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("noise.log")).unwrap(),
        "via factory\n"
    );

    let bad_syslog = Destination {
        id: "syslog-1".to_string(),
        name: String::new(),
        kind: DestinationKind::Syslog {
            host: "127.0.0.1".to_string(),
            port: 0,
            protocol: SyslogProtocol::Udp,
            format: SyslogFormat::Rfc5424,
        },
    };
    assert!(matches!(
        factory.connect(&bad_syslog).await,
        Err(SendError::InvalidConfig(_))
    ));

    let bad_hec = Destination {
        id: "hec-1".to_string(),
        name: String::new(),
        kind: DestinationKind::Hec {
            url: "splunk:8088".to_string(),
            token: TOKEN.to_string(),
            index: None,
            sourcetype: None,
            insecure_skip_verify: true,
        },
    };
    assert!(matches!(
        factory.connect(&bad_hec).await,
        Err(SendError::InvalidConfig(_))
    ));
}
