//! End-to-end tests: session store and relay client against a running relay
//! backed by a mocked Gemini API

mod common;

use common::{create_temp_storage, gemini_path, gemini_sse, spawn_app, test_config};
use serde_json::json;
use studysphere::client::{drive_turn, RelayClient};
use studysphere::providers::Role;
use studysphere::session::SessionStore;
use studysphere::storage::SqliteStorage;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn relay_client(gemini: &MockServer) -> RelayClient {
    let addr = spawn_app(&test_config(&gemini.uri(), "http://127.0.0.1:9", None)).await;
    RelayClient::new(format!("http://{}/api/chat", addr)).unwrap()
}

#[tokio::test]
async fn test_turn_streams_into_session_and_persists() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(gemini_path("gemini-2.5-flash")))
        .respond_with(ResponseTemplate::new(200).set_body_string(gemini_sse(&[
            "Which ",
            "option fits?\n[MCQ]\nA) 2\nB) 4\n[/MCQ]",
        ])))
        .mount(&gemini)
        .await;
    let client = relay_client(&gemini).await;

    let (storage, _tmp, db_path) = create_temp_storage();
    let mut store = SessionStore::load(storage).unwrap();

    let turn = store
        .begin_send("What is 2 + 2?\nShow your work", Vec::new(), false)
        .unwrap();
    let mut seen = Vec::new();
    let full = drive_turn(&mut store, &client, &turn, |d| seen.push(d.to_string()))
        .await
        .unwrap();

    assert_eq!(seen.len(), 2);
    assert_eq!(full, seen.concat());
    assert!(!store.is_busy(&turn.session_id));
    assert_eq!(store.active().title, "What is 2 + 2?");

    let block = studysphere::session::parse_mcq(&full).unwrap();
    let option = studysphere::session::resolve_option(&block.options, "b")
        .unwrap()
        .to_string();
    let reply = store.begin_mcq_reply(&option, false).unwrap();
    assert_eq!(reply.request.message, "B) 4");
    assert_eq!(reply.request.conversation_history.len(), 2);
    drive_turn(&mut store, &client, &reply, |_| {}).await.unwrap();

    drop(store);
    let reopened = SessionStore::load(Arc::new(SqliteStorage::new_with_path(db_path).unwrap()))
        .unwrap();
    let session = reopened.session(&turn.session_id).unwrap();
    assert_eq!(session.messages.len(), 4);
    assert_eq!(session.messages[1].role, Role::Assistant);
    assert_eq!(session.messages[1].content, full);
    assert_eq!(session.messages[2].content, "B) 4");
}

#[tokio::test]
async fn test_failed_send_keeps_question() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&gemini)
        .await;
    let client = relay_client(&gemini).await;

    let (storage, _tmp, _path) = create_temp_storage();
    let mut store = SessionStore::load(storage).unwrap();
    let turn = store.begin_send("Why?", Vec::new(), false).unwrap();

    let err = drive_turn(&mut store, &client, &turn, |_| {})
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
    assert!(!store.is_busy(&turn.session_id));
    assert_eq!(store.active().messages.len(), 1);
    assert_eq!(store.active().messages[0].content, "Why?");
}

#[tokio::test]
async fn test_failed_regenerate_restores_previous_answer() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(gemini_sse(&["First answer"])))
        .up_to_n_times(1)
        .mount(&gemini)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&gemini)
        .await;
    let client = relay_client(&gemini).await;

    let (storage, _tmp, _path) = create_temp_storage();
    let mut store = SessionStore::load(storage).unwrap();

    let turn = store.begin_send("Define entropy", Vec::new(), false).unwrap();
    drive_turn(&mut store, &client, &turn, |_| {}).await.unwrap();

    let regen = store.begin_regenerate_last(true).unwrap();
    assert!(regen.request.deep_thinking);
    assert!(regen.request.conversation_history.is_empty());
    assert!(drive_turn(&mut store, &client, &regen, |_| {}).await.is_err());

    let messages = &store.active().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "First answer");
}

#[tokio::test]
async fn test_edit_discards_tail_and_resends() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(gemini_sse(&["Answer"])))
        .mount(&gemini)
        .await;
    let client = relay_client(&gemini).await;

    let (storage, _tmp, _path) = create_temp_storage();
    let mut store = SessionStore::load(storage).unwrap();
    for question in ["Q1", "Q2"] {
        let turn = store.begin_send(question, Vec::new(), false).unwrap();
        drive_turn(&mut store, &client, &turn, |_| {}).await.unwrap();
    }
    assert_eq!(store.active().messages.len(), 4);

    let edit = store.begin_edit(0, "Q1 revised", false).unwrap();
    assert!(edit.request.conversation_history.is_empty());
    drive_turn(&mut store, &client, &edit, |_| {}).await.unwrap();

    let contents: Vec<&str> = store
        .active()
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["Q1 revised", "Answer"]);
}

#[tokio::test]
async fn test_relay_unreachable() {
    let client = RelayClient::new("http://127.0.0.1:9/api/chat").unwrap();
    let (storage, _tmp, _path) = create_temp_storage();
    let mut store = SessionStore::load(storage).unwrap();
    let turn = store.begin_send("hello", Vec::new(), false).unwrap();

    assert!(drive_turn(&mut store, &client, &turn, |_| {}).await.is_err());
    assert!(!store.is_busy(&turn.session_id));
}

/// Relay stand-in that sends one chunked SSE frame, then drops the connection
async fn spawn_truncating_relay() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        // Read the whole request so closing does not reset the connection
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_lowercase();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }

        let frame = "data: {\"text\":\"partial\"}\n\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
            frame.len(),
            frame
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        socket.shutdown().await.unwrap();
    });
    format!("http://{}/api/chat", addr)
}

#[tokio::test]
async fn test_stream_cut_mid_turn_keeps_partial_answer() {
    let client = RelayClient::new(spawn_truncating_relay().await).unwrap();
    let (storage, _tmp, _path) = create_temp_storage();
    let mut store = SessionStore::load(storage).unwrap();
    let turn = store.begin_send("Explain osmosis", Vec::new(), false).unwrap();

    let mut seen = Vec::new();
    let result = drive_turn(&mut store, &client, &turn, |d| seen.push(d.to_string())).await;

    assert!(result.is_err());
    assert_eq!(seen, vec!["partial"]);
    assert!(!store.is_busy(&turn.session_id));
    let messages = &store.active().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "partial");
}
