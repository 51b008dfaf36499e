use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use studysphere::config::Config;
use studysphere::server::{router, AppState};
use studysphere::storage::SqliteStorage;
use tempfile::TempDir;

pub const GEMINI_KEY: &str = "test-gemini-key";
pub const AUTUMN_KEY: &str = "am_sk_test";

#[allow(dead_code)]
pub fn create_temp_storage() -> (Arc<SqliteStorage>, TempDir, PathBuf) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("sessions.db");
    let storage =
        SqliteStorage::new_with_path(db_path.clone()).expect("failed to create sqlite storage");
    (Arc::new(storage), tmp, db_path)
}

/// Config pointing every outbound call at mock servers
#[allow(dead_code)]
pub fn test_config(gemini_base: &str, autumn_base: &str, supabase_url: Option<&str>) -> Config {
    let mut config = Config::default();
    config.gemini.api_base = gemini_base.to_string();
    config.gemini.api_key = Some(GEMINI_KEY.to_string());
    config.billing.api_base = autumn_base.to_string();
    config.billing.api_key = Some(AUTUMN_KEY.to_string());
    config.auth.supabase_url = supabase_url.map(str::to_string);
    config.auth.anon_key = supabase_url.map(|_| "anon".to_string());
    config
}

/// Gemini SSE body carrying one text part per frame, closed by `[DONE]`
#[allow(dead_code)]
pub fn gemini_sse(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let frame = serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": chunk}]}}]
        });
        body.push_str(&format!("data: {}\r\n\r\n", frame));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Gemini streaming path for a model
#[allow(dead_code)]
pub fn gemini_path(model: &str) -> String {
    format!("/v1beta/models/{}:streamGenerateContent", model)
}

/// Serve the full router on an ephemeral port
#[allow(dead_code)]
pub async fn spawn_app(config: &Config) -> SocketAddr {
    let state = AppState::from_config(config).expect("failed to build app state");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state))
            .await
            .expect("server failed");
    });
    addr
}
