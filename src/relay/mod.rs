//! Chat relay endpoint
//!
//! `POST /api/chat` validates the turn, forwards it to the provider, and
//! re-streams the provider's text deltas as `data: {"text": ...}` frames.
//! The outbound stream ends when the upstream stream ends; an upstream read
//! failure aborts it. There is no sentinel frame.

use crate::error::StudySphereError;
use crate::providers::ChatRequest;
use crate::server::{ApiError, AppState};
use crate::sse::encode_text_frame;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures::{Stream, StreamExt};
use serde_json::json;

/// Relay endpoint path
pub const CHAT_PATH: &str = "/api/chat";

/// Build the relay routes
pub fn routes() -> Router<AppState> {
    Router::new().route(CHAT_PATH, post(handle_chat))
}

/// Wrap a byte stream in an SSE response
pub fn sse_response<S, E>(stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    (headers, Body::from_stream(stream)).into_response()
}

fn relay_error(err: anyhow::Error) -> ApiError {
    match err.downcast_ref::<StudySphereError>() {
        Some(StudySphereError::Upstream { status, payload }) => ApiError::Upstream {
            status: *status,
            body: json!({ "error": "Failed to get response from AI", "details": payload }),
        },
        Some(StudySphereError::MissingApiKey(_)) => {
            ApiError::MissingApiKey("Google Gemini API key not configured".to_string())
        }
        _ => ApiError::from_anyhow(err),
    }
}

/// Handle `POST /api/chat`
///
/// # Errors
///
/// - `400 INVALID_BODY` when the body is not a JSON object of the expected shape
/// - `400 MISSING_MESSAGE` when there is neither text nor an image
/// - `400 INVALID_IMAGE` for malformed data URIs
/// - `500 MISSING_API_KEY` when the provider key is not configured
/// - the upstream status with `{"error", "details"}` when the provider rejects the call
/// - `500 INTERNAL_ERROR` on transport failures
pub async fn handle_chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request("INVALID_BODY", format!("Invalid request body: {}", e)))?;

    if let Err(StudySphereError::Validation(message)) = request.validate() {
        tracing::debug!("Rejecting empty chat turn");
        return Err(ApiError::bad_request("MISSING_MESSAGE", message));
    }

    tracing::info!(
        provider = state.provider.name(),
        history = request.conversation_history.len(),
        deep_thinking = request.deep_thinking,
        images = request.images.len(),
        "Relaying chat turn"
    );

    let deltas = state
        .provider
        .stream_generate(&request)
        .await
        .map_err(relay_error)?;

    let frames = deltas.map(|item| match item {
        Ok(text) => Ok(encode_text_frame(&text)),
        Err(e) => {
            tracing::error!("Relay stream aborted: {}", e);
            Err(e)
        }
    });

    Ok(sse_response(frames))
}
