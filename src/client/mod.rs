//! Relay client
//!
//! [`RelayClient::stream_chat`] posts a turn to the relay and yields the
//! text deltas as they arrive. [`drive_turn`] feeds those deltas into the
//! session store and closes the turn.

use crate::billing::client::json_or_message;
use crate::error::{Result, StudySphereError};
use crate::providers::{ChatRequest, DeltaStream};
use crate::session::{SessionStore, Turn};
use crate::sse;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::StreamExt;
use serde::Deserialize;
use std::path::Path;

/// HTTP client for `POST /api/chat`
pub struct RelayClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TextFrame {
    text: String,
}

fn parse_text_frame(data: &str) -> Option<String> {
    serde_json::from_str::<TextFrame>(data.trim())
        .ok()
        .map(|frame| frame.text)
}

impl RelayClient {
    /// Create a client for a relay endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a valid URL
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)
            .map_err(|e| StudySphereError::Config(format!("Invalid relay URL {}: {}", endpoint, e)))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StudySphereError::Provider(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }

    /// Relay endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post a turn and stream the response deltas
    ///
    /// Frames that do not decode to `{"text": ...}` are skipped. The stream
    /// ends when the relay closes the connection.
    ///
    /// # Errors
    ///
    /// - `StudySphereError::Upstream` with the relay's body on non-2xx
    /// - `StudySphereError::Provider` when the relay cannot be reached
    pub async fn stream_chat(&self, request: &ChatRequest) -> Result<DeltaStream> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| StudySphereError::Provider(format!("Relay unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StudySphereError::Upstream {
                status: status.as_u16(),
                payload: json_or_message(&text),
            }
            .into());
        }

        let deltas = sse::data_payloads(Box::pin(response.bytes_stream())).filter_map(
            |item| async move {
                match item {
                    Ok(data) => parse_text_frame(&data).map(Ok),
                    Err(e) => Some(Err(StudySphereError::Stream(format!(
                        "Relay stream interrupted: {}",
                        e
                    )))),
                }
            },
        );

        Ok(Box::pin(deltas))
    }
}

/// Run one turn to completion against the relay
///
/// Each delta is appended to the session and passed to `on_delta`. Returns
/// the full response text.
///
/// # Errors
///
/// Returns the relay or stream error after the turn has been failed in the
/// store (partial responses kept, regenerate snapshots restored).
pub async fn drive_turn<F>(
    store: &mut SessionStore,
    client: &RelayClient,
    turn: &Turn,
    mut on_delta: F,
) -> Result<String>
where
    F: FnMut(&str),
{
    let session_id = turn.session_id.as_str();

    let mut deltas = match client.stream_chat(&turn.request).await {
        Ok(stream) => stream,
        Err(e) => {
            store.fail_turn(session_id)?;
            return Err(e);
        }
    };

    store.open_response(session_id)?;

    let mut full = String::new();
    while let Some(item) = deltas.next().await {
        match item {
            Ok(delta) => {
                store.append_delta(session_id, &delta)?;
                on_delta(&delta);
                full.push_str(&delta);
            }
            Err(e) => {
                tracing::warn!(session_id, "Turn failed mid-stream: {}", e);
                store.fail_turn(session_id)?;
                return Err(e.into());
            }
        }
    }

    store.complete_turn(session_id)?;
    Ok(full)
}

/// Read an image file into a `data:<mime>;base64,<data>` URI
///
/// # Errors
///
/// - `StudySphereError::InvalidImage` for unsupported extensions
/// - `StudySphereError::Io` when the file cannot be read
pub fn image_data_uri(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        other => {
            return Err(StudySphereError::InvalidImage(format!(
                "unsupported image type '{}' for {}",
                other,
                path.display()
            ))
            .into())
        }
    };

    let bytes = std::fs::read(path).map_err(StudySphereError::from)?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}
