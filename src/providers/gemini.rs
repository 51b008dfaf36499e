//! Google Gemini provider implementation for StudySphere
//!
//! Builds `streamGenerateContent` requests from a relay [`ChatRequest`] and
//! turns the SSE response into a stream of text deltas.
//!
//! Request shape:
//!
//! - first turn: one `user` content whose text is the tutor instruction
//!   followed by the student's question
//! - later turns: the history mapped to `user`/`model` contents, then the
//!   new `user` content
//! - image attachments ride on the new `user` content as `inline_data` parts

use crate::config::GeminiConfig;
use crate::error::{Result, StudySphereError};
use crate::prompts::build_first_turn_text;
use crate::providers::{ChatRequest, DeltaStream, FrameEvent, Message, Provider, Role};
use crate::sse;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Gemini streaming provider
///
/// # Examples
///
/// ```no_run
/// use studysphere::config::GeminiConfig;
/// use studysphere::providers::{ChatRequest, GeminiProvider, Provider};
///
/// # async fn example() -> studysphere::error::Result<()> {
/// let provider = GeminiProvider::new(GeminiConfig {
///     api_key: Some("key".to_string()),
///     ..Default::default()
/// })?;
/// let request = ChatRequest {
///     message: "Why is the sky blue?".to_string(),
///     ..Default::default()
/// };
/// let _deltas = provider.stream_generate(&request).await?;
/// # Ok(())
/// # }
/// ```
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

/// Request body for `streamGenerateContent`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation contents in order
    pub contents: Vec<Content>,
    /// Sampling parameters
    pub generation_config: GenerationConfig,
}

/// One conversation entry
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Content {
    /// `user` or `model`
    pub role: String,
    /// Text and inline data parts
    pub parts: Vec<Part>,
}

/// Content part
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    /// Plain text
    Text {
        /// Text value
        text: String,
    },
    /// Base64 payload with its mime type
    InlineData {
        /// Inline attachment
        inline_data: InlineData,
    },
}

/// Image attachment decomposed from a data URI
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineData {
    /// Mime type, e.g. `image/png`
    pub mime_type: String,
    /// Base64 data, passed through unchanged
    pub data: String,
}

/// Sampling parameters
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature
    pub temperature: f64,
    /// Output token cap
    pub max_output_tokens: u32,
    /// Nucleus sampling mass
    pub top_p: f64,
    /// Top-k cutoff
    pub top_k: u32,
}

impl GenerationConfig {
    /// Parameters for normal or deep thinking turns
    pub fn for_mode(deep_thinking: bool) -> Self {
        Self {
            temperature: if deep_thinking { 0.9 } else { 0.7 },
            max_output_tokens: if deep_thinking { 4000 } else { 2000 },
            top_p: 0.8,
            top_k: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamFrame {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Split a `data:<mime>;base64,<data>` URI into its mime type and data
///
/// # Errors
///
/// Returns `StudySphereError::InvalidImage` when the URI has no `data:`
/// scheme, no comma, or an empty mime type or payload.
///
/// # Examples
///
/// ```
/// use studysphere::providers::gemini::parse_data_uri;
///
/// let inline = parse_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
/// assert_eq!(inline.mime_type, "image/png");
/// assert_eq!(inline.data, "iVBORw0KGgo=");
/// ```
pub fn parse_data_uri(uri: &str) -> std::result::Result<InlineData, StudySphereError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| StudySphereError::InvalidImage("missing data: scheme".to_string()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| StudySphereError::InvalidImage("missing ',' separator".to_string()))?;
    let mime_type = header.split(';').next().unwrap_or_default().trim();

    if mime_type.is_empty() {
        return Err(StudySphereError::InvalidImage("empty mime type".to_string()));
    }
    if data.is_empty() {
        return Err(StudySphereError::InvalidImage("empty payload".to_string()));
    }

    Ok(InlineData {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

fn history_content(message: &Message) -> Content {
    let role = match message.role {
        Role::Assistant => "model",
        Role::User => "user",
    };
    Content {
        role: role.to_string(),
        parts: vec![Part::Text {
            text: message.content.clone(),
        }],
    }
}

/// Build the provider request body for a relay request
///
/// # Errors
///
/// Returns `StudySphereError::InvalidImage` for malformed attachments.
pub fn build_generate_request(
    request: &ChatRequest,
) -> std::result::Result<GenerateContentRequest, StudySphereError> {
    let image_parts = request
        .images
        .iter()
        .map(|uri| parse_data_uri(uri).map(|inline_data| Part::InlineData { inline_data }))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut contents: Vec<Content> = Vec::with_capacity(request.conversation_history.len() + 1);

    let text = if request.is_first_turn() {
        build_first_turn_text(&request.message, request.deep_thinking)
    } else {
        contents.extend(request.conversation_history.iter().map(history_content));
        request.message.clone()
    };

    let mut parts = vec![Part::Text { text }];
    parts.extend(image_parts);
    contents.push(Content {
        role: "user".to_string(),
        parts,
    });

    Ok(GenerateContentRequest {
        contents,
        generation_config: GenerationConfig::for_mode(request.deep_thinking),
    })
}

/// Classify one `data:` payload of a Gemini stream
///
/// Only `candidates[0].content.parts[0].text` is considered; anything else
/// is `Unparseable`.
///
/// # Examples
///
/// ```
/// use studysphere::providers::gemini::classify_frame;
/// use studysphere::providers::FrameEvent;
///
/// let frame = r#"{"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#;
/// assert_eq!(classify_frame(frame), FrameEvent::TextDelta("Hi".to_string()));
/// assert_eq!(classify_frame("[DONE]"), FrameEvent::Unparseable);
/// ```
pub fn classify_frame(data: &str) -> FrameEvent {
    let data = data.trim();
    if data == "[DONE]" {
        return FrameEvent::Unparseable;
    }

    let Ok(frame) = serde_json::from_str::<StreamFrame>(data) else {
        return FrameEvent::Unparseable;
    };

    frame
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty())
        .map(FrameEvent::TextDelta)
        .unwrap_or(FrameEvent::Unparseable)
}

impl GeminiProvider {
    /// Create a new Gemini provider
    ///
    /// No request timeout is configured: a turn lasts as long as the
    /// upstream stream does.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("studysphere/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StudySphereError::Provider(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            api_base = %config.api_base,
            text_model = %config.text_model,
            vision_model = %config.vision_model,
            "Initialized Gemini provider"
        );

        Ok(Self { client, config })
    }

    /// Model used for this request: the vision model when images are attached
    pub fn select_model(&self, request: &ChatRequest) -> &str {
        if request.images.is_empty() {
            &self.config.text_model
        } else {
            &self.config.vision_model
        }
    }

    fn stream_url(&self, model: &str, api_key: &str) -> Result<url::Url> {
        let mut url = url::Url::parse(&format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        ))
        .map_err(|e| StudySphereError::Config(format!("Invalid Gemini endpoint: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("alt", "sse")
            .append_pair("key", api_key);
        Ok(url)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream_generate(&self, request: &ChatRequest) -> Result<DeltaStream> {
        let body = build_generate_request(request)?;
        let api_key = self.config.require_api_key()?;
        let model = self.select_model(request);
        let url = self.stream_url(model, api_key)?;

        tracing::debug!(
            model,
            contents = body.contents.len(),
            deep_thinking = request.deep_thinking,
            images = request.images.len(),
            "Sending streamGenerateContent request"
        );

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StudySphereError::Provider(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let payload = serde_json::from_str::<serde_json::Value>(&text)
                .unwrap_or_else(|_| serde_json::json!({ "message": text }));
            tracing::error!(status = status.as_u16(), "Gemini API error: {}", payload);
            return Err(StudySphereError::Upstream {
                status: status.as_u16(),
                payload,
            }
            .into());
        }

        let bytes = Box::pin(response.bytes_stream());
        let deltas = sse::data_payloads(bytes).filter_map(|item| async move {
            match item {
                Ok(data) => match classify_frame(&data) {
                    FrameEvent::TextDelta(text) => Some(Ok(text)),
                    FrameEvent::Unparseable => {
                        tracing::trace!("Skipping frame without text delta");
                        None
                    }
                },
                Err(e) => Some(Err(StudySphereError::Stream(format!(
                    "Gemini stream read failed: {}",
                    e
                )))),
            }
        });

        Ok(Box::pin(deltas))
    }
}
