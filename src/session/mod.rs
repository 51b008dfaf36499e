//! Chat session store
//!
//! [`SessionStore`] owns the session list, the active session, the pinned
//! list, and the set of sessions with a turn in flight. Every mutation is
//! written through the [`KeyValueStore`] port under two keys:
//!
//! - `chatSessions`: JSON array of [`ChatSession`], newest first
//! - `pinnedChats`: JSON array of session ids
//!
//! There is no transaction spanning memory and the port. A failed write is
//! logged and kept for the caller to report, and the in-memory change
//! stands.
//!
//! A turn has three phases. A `begin_*` operation mutates the messages,
//! marks the session busy, and returns the relay request. Deltas are then
//! appended to the trailing assistant message. Finally `complete_turn` or
//! `fail_turn` clears the busy flag.

pub mod mcq;
pub mod types;

pub use mcq::{parse_mcq, resolve_option, McqBlock};
pub use types::{
    generate_title, now_millis, ChatSession, SessionExport, SessionListing, SortOrder, Turn,
    TurnKind, DEFAULT_TITLE,
};

use crate::error::{Result, StudySphereError};
use crate::providers::{ChatRequest, Message, Role};
use crate::storage::KeyValueStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Storage key of the session list
pub const SESSIONS_KEY: &str = "chatSessions";
/// Storage key of the pinned id list
pub const PINNED_KEY: &str = "pinnedChats";

#[derive(Debug, Clone)]
struct InFlight {
    kind: TurnKind,
    snapshot: Option<Vec<Message>>,
    response_open: bool,
}

/// Client-side session state
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    sessions: Vec<ChatSession>,
    active_id: String,
    pinned: Vec<String>,
    in_flight: HashMap<String, InFlight>,
    persist_error: Option<String>,
}

fn not_found(id: &str) -> StudySphereError {
    StudySphereError::SessionNotFound(id.to_string())
}

impl SessionStore {
    /// Load sessions and pins from storage
    ///
    /// With nothing stored, one empty session is created. The first stored
    /// session becomes active.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read or holds malformed JSON
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use studysphere::session::SessionStore;
    /// use studysphere::storage::MemoryStorage;
    ///
    /// let store = SessionStore::load(Arc::new(MemoryStorage::new())).unwrap();
    /// assert_eq!(store.sessions().len(), 1);
    /// assert_eq!(store.active().title, "New Chat");
    /// ```
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let sessions: Vec<ChatSession> = match storage.get_item(SESSIONS_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StudySphereError::Storage(format!("Malformed {}: {}", SESSIONS_KEY, e))
            })?,
            None => Vec::new(),
        };
        let pinned: Vec<String> = match storage.get_item(PINNED_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StudySphereError::Storage(format!("Malformed {}: {}", PINNED_KEY, e))
            })?,
            None => Vec::new(),
        };

        let mut store = Self {
            storage,
            active_id: String::new(),
            sessions,
            pinned,
            in_flight: HashMap::new(),
            persist_error: None,
        };

        match store.sessions.first() {
            Some(first) => store.active_id = first.id.clone(),
            None => {
                let session = ChatSession::new();
                store.active_id = session.id.clone();
                store.sessions.push(session);
                store.persist();
            }
        }

        tracing::debug!(
            sessions = store.sessions.len(),
            pinned = store.pinned.len(),
            "Loaded session store"
        );
        Ok(store)
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.sessions)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.storage.set_item(SESSIONS_KEY, &json))
            .and_then(|_| {
                let pinned = serde_json::to_string(&self.pinned)?;
                self.storage.set_item(PINNED_KEY, &pinned)
            });

        match result {
            Ok(()) => self.persist_error = None,
            Err(e) => {
                tracing::error!("Failed to persist sessions: {:#}", e);
                self.persist_error = Some(format!("{:#}", e));
            }
        }
    }

    /// Take the last persistence failure, if any
    pub fn take_persist_error(&mut self) -> Option<String> {
        self.persist_error.take()
    }

    /// All sessions, newest first
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// Look up a session
    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn session_mut(&mut self, id: &str) -> std::result::Result<&mut ChatSession, StudySphereError> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// Id of the active session
    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    /// The active session
    ///
    /// The store always holds at least one session and the active id always
    /// names one of them.
    pub fn active(&self) -> &ChatSession {
        self.session(&self.active_id)
            .or_else(|| self.sessions.first())
            .unwrap_or_else(|| unreachable!("session store is never empty"))
    }

    /// Pinned ids in pin order; may name deleted sessions
    pub fn pinned_ids(&self) -> &[String] {
        &self.pinned
    }

    /// Whether a session is pinned
    pub fn is_pinned(&self, id: &str) -> bool {
        self.pinned.iter().any(|p| p == id)
    }

    /// Whether a session has a turn in flight
    pub fn is_busy(&self, id: &str) -> bool {
        self.in_flight.contains_key(id)
    }

    /// Create an empty session, put it first, and make it active
    pub fn new_session(&mut self) -> String {
        let session = ChatSession::new();
        let id = session.id.clone();
        self.sessions.insert(0, session);
        self.active_id = id.clone();
        self.persist();
        tracing::debug!(session_id = %id, "Created session");
        id
    }

    /// Make a session active
    ///
    /// # Errors
    ///
    /// Returns `StudySphereError::SessionNotFound` for unknown ids
    pub fn select_session(&mut self, id: &str) -> Result<()> {
        if self.session(id).is_none() {
            return Err(not_found(id).into());
        }
        self.active_id = id.to_string();
        Ok(())
    }

    /// Delete a session
    ///
    /// When the active session is deleted the first remaining one becomes
    /// active; deleting the last session leaves one new empty session.
    ///
    /// # Errors
    ///
    /// - `StudySphereError::SessionNotFound` for unknown ids
    /// - `StudySphereError::SessionBusy` while a turn streams into it
    pub fn delete_session(&mut self, id: &str) -> Result<()> {
        if self.session(id).is_none() {
            return Err(not_found(id).into());
        }
        if self.is_busy(id) {
            return Err(StudySphereError::SessionBusy(id.to_string()).into());
        }

        self.sessions.retain(|s| s.id != id);
        self.pinned.retain(|p| p != id);

        if self.active_id == id {
            match self.sessions.first() {
                Some(first) => self.active_id = first.id.clone(),
                None => {
                    let session = ChatSession::new();
                    self.active_id = session.id.clone();
                    self.sessions.push(session);
                }
            }
        }

        self.persist();
        tracing::debug!(session_id = %id, "Deleted session");
        Ok(())
    }

    /// Rename a session
    ///
    /// # Errors
    ///
    /// - `StudySphereError::Validation` when the trimmed title is empty
    /// - `StudySphereError::SessionNotFound` for unknown ids
    pub fn rename(&mut self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StudySphereError::Validation("Title cannot be empty".to_string()).into());
        }
        self.session_mut(id)?.title = title.to_string();
        self.persist();
        Ok(())
    }

    /// Toggle the pinned state; returns whether the session is now pinned
    ///
    /// # Errors
    ///
    /// Returns `StudySphereError::SessionNotFound` for unknown ids
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool> {
        if self.session(id).is_none() {
            return Err(not_found(id).into());
        }
        let pinned = if self.is_pinned(id) {
            self.pinned.retain(|p| p != id);
            false
        } else {
            self.pinned.push(id.to_string());
            true
        };
        self.persist();
        Ok(pinned)
    }

    /// Render a session as plain text
    ///
    /// # Errors
    ///
    /// Returns `StudySphereError::SessionNotFound` for unknown ids
    pub fn export(&self, id: &str) -> Result<SessionExport> {
        let session = self.session(id).ok_or_else(|| not_found(id))?;
        let content = session
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(SessionExport {
            file_name: format!("{}.txt", session.title),
            content,
        })
    }

    /// Filter, sort, and partition sessions into pinned and other
    pub fn list(&self, query: Option<&str>, sort: SortOrder) -> SessionListing<'_> {
        let mut matching: Vec<&ChatSession> = self
            .sessions
            .iter()
            .filter(|s| query.map_or(true, |q| s.matches(q)))
            .collect();

        match sort {
            SortOrder::Recent => matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
            SortOrder::Oldest => matching.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
            SortOrder::Alphabetical => matching.sort_by(|a, b| {
                a.title
                    .to_lowercase()
                    .cmp(&b.title.to_lowercase())
                    .then_with(|| a.title.cmp(&b.title))
            }),
        }

        let (pinned, others): (Vec<&ChatSession>, Vec<&ChatSession>) =
            matching.into_iter().partition(|s| self.is_pinned(&s.id));
        SessionListing { pinned, others }
    }

    /// Apply a message mutation and resync the title
    ///
    /// Title and timestamp change only when the derived title differs or
    /// the message count changed.
    fn mutate_messages<F>(&mut self, id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Message>),
    {
        let session = self.session_mut(id)?;
        let before = session.messages.len();
        f(&mut session.messages);

        let title = generate_title(&session.messages);
        if title != session.title || session.messages.len() != before {
            session.title = title;
            session.timestamp = now_millis();
        }
        Ok(())
    }

    fn ensure_idle(&self, id: &str) -> Result<()> {
        if self.is_busy(id) {
            return Err(StudySphereError::SessionBusy(id.to_string()).into());
        }
        Ok(())
    }

    fn start_turn(
        &mut self,
        kind: TurnKind,
        snapshot: Option<Vec<Message>>,
        request: ChatRequest,
    ) -> Turn {
        let session_id = self.active_id.clone();
        self.in_flight.insert(
            session_id.clone(),
            InFlight {
                kind,
                snapshot,
                response_open: false,
            },
        );
        self.persist();
        tracing::debug!(session_id = %session_id, ?kind, "Turn started");
        Turn {
            session_id,
            kind,
            request,
        }
    }

    fn send_with_kind(
        &mut self,
        kind: TurnKind,
        message: &str,
        images: Vec<String>,
        deep_thinking: bool,
    ) -> Result<Turn> {
        let id = self.active_id.clone();
        self.ensure_idle(&id)?;

        let message = message.trim().to_string();
        if message.is_empty() && images.is_empty() {
            return Err(
                StudySphereError::Validation("Message or images are required".to_string()).into(),
            );
        }

        let history = self.active().messages.clone();
        let user = Message::user_with_images(message.clone(), images.clone());
        self.mutate_messages(&id, |messages| messages.push(user))?;

        Ok(self.start_turn(
            kind,
            None,
            ChatRequest {
                message,
                conversation_history: history,
                deep_thinking,
                images,
            },
        ))
    }

    /// Append a user message to the active session and start a turn
    ///
    /// # Errors
    ///
    /// - `StudySphereError::SessionBusy` while another turn is in flight
    /// - `StudySphereError::Validation` for an empty message without images
    pub fn begin_send(
        &mut self,
        message: &str,
        images: Vec<String>,
        deep_thinking: bool,
    ) -> Result<Turn> {
        self.send_with_kind(TurnKind::Send, message, images, deep_thinking)
    }

    /// Answer a multiple-choice block with the chosen option text
    ///
    /// # Errors
    ///
    /// Same as [`SessionStore::begin_send`]
    pub fn begin_mcq_reply(&mut self, option: &str, deep_thinking: bool) -> Result<Turn> {
        self.send_with_kind(TurnKind::McqReply, option, Vec::new(), deep_thinking)
    }

    /// Replace the user message at `index` and drop everything after it
    ///
    /// The edited message keeps its images. The relay history is
    /// `messages[..index]`.
    ///
    /// # Errors
    ///
    /// - `StudySphereError::SessionBusy` while another turn is in flight
    /// - `StudySphereError::Validation` when `index` is not a user message
    ///   or the trimmed content is empty
    pub fn begin_edit(&mut self, index: usize, content: &str, deep_thinking: bool) -> Result<Turn> {
        let id = self.active_id.clone();
        self.ensure_idle(&id)?;

        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(StudySphereError::Validation("Edited message is empty".to_string()).into());
        }

        let original = match self.active().messages.get(index) {
            Some(m) if m.role == Role::User => m.clone(),
            Some(_) => {
                return Err(StudySphereError::Validation(format!(
                    "Message {} is not a user message",
                    index
                ))
                .into())
            }
            None => {
                return Err(
                    StudySphereError::Validation(format!("No message at index {}", index)).into(),
                )
            }
        };

        let edited = Message {
            content: content.clone(),
            ..original
        };
        let images = edited.images.clone();
        let history = self.active().messages[..index].to_vec();

        self.mutate_messages(&id, |messages| {
            messages.truncate(index);
            messages.push(edited);
        })?;

        Ok(self.start_turn(
            TurnKind::Edit,
            None,
            ChatRequest {
                message: content,
                conversation_history: history,
                deep_thinking,
                images,
            },
        ))
    }

    /// Regenerate the response at `index`
    ///
    /// The question is the nearest user message before `index`. Messages
    /// from `index` on are dropped; the previous list is snapshotted and
    /// restored if the turn fails.
    ///
    /// # Errors
    ///
    /// - `StudySphereError::SessionBusy` while another turn is in flight
    /// - `StudySphereError::Validation` when `index` is out of range or no
    ///   user message precedes it
    pub fn begin_regenerate(&mut self, index: usize, deep_thinking: bool) -> Result<Turn> {
        let id = self.active_id.clone();
        self.ensure_idle(&id)?;

        let messages = &self.active().messages;
        if index > messages.len() {
            return Err(
                StudySphereError::Validation(format!("No message at index {}", index)).into(),
            );
        }

        let Some(anchor) = messages[..index].iter().rposition(|m| m.role == Role::User) else {
            return Err(
                StudySphereError::Validation("Cannot find original question".to_string()).into(),
            );
        };

        let question = messages[anchor].clone();
        let history = messages[..anchor].to_vec();
        let snapshot = messages.clone();

        self.mutate_messages(&id, |messages| messages.truncate(index))?;

        Ok(self.start_turn(
            TurnKind::Regenerate,
            Some(snapshot),
            ChatRequest {
                message: question.content,
                conversation_history: history,
                deep_thinking,
                images: question.images,
            },
        ))
    }

    /// Regenerate the last assistant response
    ///
    /// When the conversation ends with an unanswered user message, that
    /// message is asked again.
    ///
    /// # Errors
    ///
    /// Same as [`SessionStore::begin_regenerate`]
    pub fn begin_regenerate_last(&mut self, deep_thinking: bool) -> Result<Turn> {
        let messages = &self.active().messages;
        let index = match messages.last() {
            Some(last) if last.role == Role::User => messages.len(),
            _ => messages
                .iter()
                .rposition(|m| m.role == Role::Assistant)
                .ok_or_else(|| StudySphereError::Validation("Nothing to regenerate".to_string()))?,
        };
        self.begin_regenerate(index, deep_thinking)
    }

    fn in_flight_mut(&mut self, session_id: &str) -> Result<&mut InFlight> {
        self.in_flight.get_mut(session_id).ok_or_else(|| {
            StudySphereError::Validation(format!("No turn in flight for session {}", session_id))
                .into()
        })
    }

    /// Push the empty assistant message the response streams into
    ///
    /// Idempotent for the duration of a turn.
    ///
    /// # Errors
    ///
    /// Returns error when no turn is in flight for the session
    pub fn open_response(&mut self, session_id: &str) -> Result<()> {
        let turn = self.in_flight_mut(session_id)?;
        if turn.response_open {
            return Ok(());
        }
        turn.response_open = true;
        self.mutate_messages(session_id, |messages| messages.push(Message::assistant("")))?;
        self.persist();
        Ok(())
    }

    /// Append a streamed delta to the trailing assistant message
    ///
    /// # Errors
    ///
    /// Returns error when no turn is in flight for the session
    pub fn append_delta(&mut self, session_id: &str, delta: &str) -> Result<()> {
        self.open_response(session_id)?;
        self.mutate_messages(session_id, |messages| {
            if let Some(last) = messages.last_mut() {
                last.content.push_str(delta);
            }
        })
    }

    /// Finish a turn successfully
    ///
    /// # Errors
    ///
    /// Returns error when no turn is in flight for the session
    pub fn complete_turn(&mut self, session_id: &str) -> Result<()> {
        let turn = self.in_flight.remove(session_id).ok_or_else(|| {
            StudySphereError::Validation(format!("No turn in flight for session {}", session_id))
        })?;
        self.persist();
        tracing::debug!(session_id, kind = ?turn.kind, "Turn completed");
        Ok(())
    }

    /// Finish a turn after a failure
    ///
    /// Partial responses are kept, except for regenerate turns, which
    /// restore the messages as they were before the turn.
    ///
    /// # Errors
    ///
    /// Returns error when no turn is in flight for the session
    pub fn fail_turn(&mut self, session_id: &str) -> Result<()> {
        let turn = self.in_flight.remove(session_id).ok_or_else(|| {
            StudySphereError::Validation(format!("No turn in flight for session {}", session_id))
        })?;

        if let (TurnKind::Regenerate, Some(snapshot)) = (turn.kind, turn.snapshot) {
            self.mutate_messages(session_id, |messages| *messages = snapshot)?;
        }

        self.persist();
        tracing::debug!(session_id, kind = ?turn.kind, "Turn failed");
        Ok(())
    }
}
