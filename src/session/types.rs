//! Session, listing and turn types shared by the store and the CLI

use crate::error::StudySphereError;
use crate::providers::{Message, Role};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Title of a session without user messages
pub const DEFAULT_TITLE: &str = "New Chat";

/// Maximum title length before the `...` suffix
pub const TITLE_MAX_CHARS: usize = 40;

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A named conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Opaque time-ordered id
    pub id: String,
    /// Display title
    pub title: String,
    /// Messages in conversation order
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Last modification, epoch milliseconds
    pub timestamp: i64,
}

impl ChatSession {
    /// Create an empty session
    pub fn new() -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            timestamp: now_millis(),
        }
    }

    /// Case-insensitive match against the title and every message
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self
                .messages
                .iter()
                .any(|m| m.content.to_lowercase().contains(&query))
    }

    /// Local time of the last modification, for display
    pub fn updated_at(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
            .map(|t| {
                t.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            })
            .unwrap_or_default()
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a title from the first user message
///
/// The first line is kept, truncated to 40 characters, with `...` appended
/// when it was longer.
///
/// # Examples
///
/// ```
/// use studysphere::providers::Message;
/// use studysphere::session::generate_title;
///
/// let title = generate_title(&[Message::user("Explain recursion in under 40 characters please")]);
/// assert_eq!(title, "Explain recursion in under 40 characters...");
/// assert_eq!(generate_title(&[]), "New Chat");
/// ```
pub fn generate_title(messages: &[Message]) -> String {
    let Some(first) = messages.iter().find(|m| m.role == Role::User) else {
        return DEFAULT_TITLE.to_string();
    };

    let first_line = first.content.split('\n').next().unwrap_or_default();
    let truncated: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
    if first_line.chars().count() > TITLE_MAX_CHARS {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Session list ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recently modified first
    #[default]
    Recent,
    /// Least recently modified first
    Oldest,
    /// By title
    Alphabetical,
}

impl FromStr for SortOrder {
    type Err = StudySphereError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recent" => Ok(Self::Recent),
            "oldest" => Ok(Self::Oldest),
            "alphabetical" | "alpha" | "title" => Ok(Self::Alphabetical),
            other => Err(StudySphereError::Validation(format!(
                "Unknown sort order '{}' (expected recent, oldest, alphabetical)",
                other
            ))),
        }
    }
}

/// Filtered, sorted sessions split into pinned and other
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionListing<'a> {
    /// Pinned sessions, in sort order
    pub pinned: Vec<&'a ChatSession>,
    /// Remaining sessions, in sort order
    pub others: Vec<&'a ChatSession>,
}

impl SessionListing<'_> {
    /// Total number of listed sessions
    pub fn len(&self) -> usize {
        self.pinned.len() + self.others.len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plain-text export of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExport {
    /// Suggested file name, `{title}.txt`
    pub file_name: String,
    /// `ROLE: content` blocks separated by blank lines
    pub content: String,
}

/// Which operation started a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// New user message
    Send,
    /// User message chosen from a multiple-choice block
    McqReply,
    /// Edited user message, tail discarded
    Edit,
    /// Response regenerated for an earlier question
    Regenerate,
}

/// A turn ready to be sent to the relay
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// Session the response streams into
    pub session_id: String,
    /// Operation that started the turn
    pub kind: TurnKind,
    /// Relay request body
    pub request: crate::providers::ChatRequest,
}
