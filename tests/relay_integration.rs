//! Integration tests for `POST /api/chat` against a mocked Gemini API

mod common;

use common::{gemini_path, gemini_sse, spawn_app, test_config, GEMINI_KEY};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn text_frames(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|data| {
            let value: Value = serde_json::from_str(data).expect("relay frame is JSON");
            value["text"].as_str().expect("frame has text").to_string()
        })
        .collect()
}

#[tokio::test]
async fn test_relay_concatenation_matches_upstream_text() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(gemini_path("gemini-2.5-flash")))
        .and(query_param("alt", "sse"))
        .and(query_param("key", GEMINI_KEY))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(gemini_sse(&["What do you ", "already know ", "about slopes?"])),
        )
        .expect(1)
        .mount(&gemini)
        .await;

    let addr = spawn_app(&test_config(&gemini.uri(), "http://127.0.0.1:9", None)).await;
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&json!({"message": "Explain derivatives"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    let body = response.text().await.unwrap();
    let frames = text_frames(&body);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames.concat(), "What do you already know about slopes?");
}

#[tokio::test]
async fn test_relay_sends_deep_thinking_generation_config() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(gemini_path("gemini-2.5-flash")))
        .and(body_partial_json(json!({
            "generationConfig": {"temperature": 0.9, "maxOutputTokens": 4000, "topP": 0.8, "topK": 10}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(gemini_sse(&["ok"])))
        .expect(1)
        .mount(&gemini)
        .await;

    let addr = spawn_app(&test_config(&gemini.uri(), "http://127.0.0.1:9", None)).await;
    let body = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&json!({
            "message": "And integrals?",
            "conversationHistory": [
                {"role": "user", "content": "Explain derivatives"},
                {"role": "assistant", "content": "What is a slope?"}
            ],
            "deepThinking": true
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(text_frames(&body), vec!["ok"]);
}

#[tokio::test]
async fn test_relay_uses_vision_model_for_images() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(gemini_path("gemini-2.0-flash-exp")))
        .respond_with(ResponseTemplate::new(200).set_body_string(gemini_sse(&["A triangle"])))
        .expect(1)
        .mount(&gemini)
        .await;

    let addr = spawn_app(&test_config(&gemini.uri(), "http://127.0.0.1:9", None)).await;
    let body = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&json!({"message": "", "images": ["data:image/png;base64,iVBORw=="]}))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(text_frames(&body).concat(), "A triangle");
}

#[tokio::test]
async fn test_relay_rejects_empty_turn_without_upstream_call() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gemini)
        .await;

    let addr = spawn_app(&test_config(&gemini.uri(), "http://127.0.0.1:9", None)).await;
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&json!({"message": "   ", "images": []}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_MESSAGE");
}

#[tokio::test]
async fn test_relay_forwards_upstream_error_status_and_details() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"code": 429, "message": "Quota exceeded"}})),
        )
        .mount(&gemini)
        .await;

    let addr = spawn_app(&test_config(&gemini.uri(), "http://127.0.0.1:9", None)).await;
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 429);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Failed to get response from AI");
    assert_eq!(body["details"]["error"]["message"], "Quota exceeded");
}

#[tokio::test]
async fn test_relay_missing_key_is_500() {
    let gemini = MockServer::start().await;
    let mut config = test_config(&gemini.uri(), "http://127.0.0.1:9", None);
    config.gemini.api_key = None;

    let addr = spawn_app(&config).await;
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_API_KEY");
}

#[tokio::test]
async fn test_relay_skips_unparseable_frames() {
    let gemini = MockServer::start().await;
    let body = format!(
        "data: not json\n\ndata: {{\"candidates\":[]}}\n\n{}",
        gemini_sse(&["kept"])
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&gemini)
        .await;

    let addr = spawn_app(&test_config(&gemini.uri(), "http://127.0.0.1:9", None)).await;
    let text = reqwest::Client::new()
        .post(format!("http://{}/api/chat", addr))
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(text_frames(&text), vec!["kept"]);
}
