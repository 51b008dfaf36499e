//! Integration tests for the page gate and session endpoint with a mocked Supabase

mod common;

use common::{spawn_app, test_config};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn no_redirects() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn supabase_with_user() -> MockServer {
    let supabase = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer good"))
        .and(header("apikey", "anon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-7",
            "email": "ada@uni.edu",
            "user_metadata": {"name": "Ada"}
        })))
        .mount(&supabase)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer bad"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "invalid JWT"})))
        .mount(&supabase)
        .await;
    supabase
}

#[tokio::test]
async fn test_protected_page_with_valid_cookie() {
    let supabase = supabase_with_user().await;
    let addr = spawn_app(&test_config(
        "http://127.0.0.1:9",
        "http://127.0.0.1:9",
        Some(&supabase.uri()),
    ))
    .await;

    let response = no_redirects()
        .get(format!("http://{}/chat", addr))
        .header("cookie", "sb-access-token=good")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["page"], "chat");
    assert_eq!(body["user"]["name"], "Ada");
}

#[tokio::test]
async fn test_rejected_token_redirects_to_login() {
    let supabase = supabase_with_user().await;
    let addr = spawn_app(&test_config(
        "http://127.0.0.1:9",
        "http://127.0.0.1:9",
        Some(&supabase.uri()),
    ))
    .await;

    let response = no_redirects()
        .get(format!("http://{}/settings", addr))
        .bearer_auth("bad")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 307);
    assert_eq!(response.headers()["location"], "/login");
}

#[tokio::test]
async fn test_auth_backend_error_fails_closed() {
    let supabase = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&supabase)
        .await;
    let addr = spawn_app(&test_config(
        "http://127.0.0.1:9",
        "http://127.0.0.1:9",
        Some(&supabase.uri()),
    ))
    .await;

    let response = no_redirects()
        .get(format!("http://{}/archive", addr))
        .bearer_auth("good")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 307);
}

#[tokio::test]
async fn test_session_endpoint_reports_user() {
    let supabase = supabase_with_user().await;
    let addr = spawn_app(&test_config(
        "http://127.0.0.1:9",
        "http://127.0.0.1:9",
        Some(&supabase.uri()),
    ))
    .await;
    let client = no_redirects();

    let body: Value = client
        .get(format!("http://{}/api/session", addr))
        .bearer_auth("good")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["user"]["id"], "user-7");

    let body: Value = client
        .get(format!("http://{}/api/session", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({}));
}
