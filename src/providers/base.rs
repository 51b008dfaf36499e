//! Base provider trait and common types for StudySphere
//!
//! This module defines the Provider trait that the relay streams through,
//! the chat message model shared by the relay, the session store, and the
//! terminal client, and the tagged union every streamed frame decodes into.

use crate::error::{Result, StudySphereError};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Deserializer, Serialize};
use std::pin::Pin;

/// Role of a chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The student
    User,
    /// The tutor model
    Assistant,
}

impl Role {
    /// Upper-case label used by plain-text export
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Message structure for conversation
///
/// Serialized exactly as the browser stores it: `role`, `content` and an
/// optional `images` list of data URIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Text content of the message
    #[serde(default)]
    pub content: String,
    /// Image attachments as `data:<mime>;base64,<data>` URIs
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub images: Vec<String>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use studysphere::providers::{Message, Role};
    ///
    /// let msg = Message::user("What is a derivative?");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// Creates a new user message carrying image attachments
    pub fn user_with_images(content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images,
        }
    }

    /// Creates a new assistant message
    ///
    /// # Examples
    ///
    /// ```
    /// use studysphere::providers::{Message, Role};
    ///
    /// let msg = Message::assistant("Let's build intuition.");
    /// assert_eq!(msg.role, Role::Assistant);
    /// ```
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }
}

/// Body of a relay request (`POST /api/chat`)
///
/// Every field tolerates being absent or `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// New student message (may be empty when images are attached)
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Messages preceding the new one, in conversation order
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversation_history: Vec<Message>,
    /// Deep thinking mode
    #[serde(default, deserialize_with = "null_as_default")]
    pub deep_thinking: bool,
    /// Image attachments for the new message
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub images: Vec<String>,
}

impl ChatRequest {
    /// Reject requests with neither text nor images
    ///
    /// # Errors
    ///
    /// Returns `StudySphereError::Validation` when both are empty.
    pub fn validate(&self) -> std::result::Result<(), StudySphereError> {
        if self.message.trim().is_empty() && self.images.is_empty() {
            return Err(StudySphereError::Validation(
                "Message or images are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether this turn starts a new conversation
    pub fn is_first_turn(&self) -> bool {
        self.conversation_history.is_empty()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Classification of a single streamed `data:` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A non-empty text fragment to forward
    TextDelta(String),
    /// Anything else: invalid JSON, `[DONE]`, or a frame without text
    Unparseable,
}

/// Stream of text deltas produced for one chat turn
pub type DeltaStream =
    Pin<Box<dyn Stream<Item = std::result::Result<String, StudySphereError>> + Send>>;

/// Generative-AI provider the relay forwards turns to
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Start a streamed generation for one chat turn
    ///
    /// # Errors
    ///
    /// - `StudySphereError::InvalidImage` when an attachment is malformed
    /// - `StudySphereError::MissingApiKey` when no key is configured
    /// - `StudySphereError::Upstream` when the provider answers non-2xx
    /// - `StudySphereError::Provider` on transport failures
    async fn stream_generate(&self, request: &ChatRequest) -> Result<DeltaStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip_matches_browser_shape() {
        let msg = Message::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn test_message_images_serialized_when_present() {
        let msg = Message::user_with_images("", vec!["data:image/png;base64,AA==".into()]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["images"][0], "data:image/png;base64,AA==");
    }

    #[test]
    fn test_chat_request_accepts_camel_case_and_nulls() {
        let body = r#"{
            "message": "hi",
            "conversationHistory": [{"role": "assistant", "content": "hello"}],
            "deepThinking": null,
            "images": null
        }"#;
        let req: ChatRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.message, "hi");
        assert_eq!(req.conversation_history.len(), 1);
        assert!(!req.deep_thinking);
        assert!(req.images.is_empty());
        assert!(!req.is_first_turn());
    }

    #[test]
    fn test_chat_request_empty_body_defaults() {
        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(req.is_first_turn());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_images_without_text() {
        let req = ChatRequest {
            images: vec!["data:image/png;base64,AA==".into()],
            ..Default::default()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_whitespace_message() {
        let req = ChatRequest {
            message: "   ".into(),
            ..Default::default()
        };
        assert!(matches!(
            req.validate(),
            Err(StudySphereError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result = serde_json::from_str::<Message>(r#"{"role": "system", "content": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_role_label() {
        assert_eq!(Role::User.label(), "USER");
        assert_eq!(Role::Assistant.label(), "ASSISTANT");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
