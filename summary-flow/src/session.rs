//! Conversation sessions and their store.
//!
//! A session is created once per successful initial generation and after
//! that only its history changes, append-only, one turn at a time. Sessions
//! are resolved by id through a [`SessionStore`]; follow-up turns are
//! appended by the store rather than by mutating a shared list in place.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::format::escape_html;

/// One question/answer pair in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaTurn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn capitalized(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        }
    }
}

/// One side of a turn, flattened for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: MessageRole,
    pub content: String,
}

/// Accumulated state of one summarization conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySession {
    pub id: String,
    /// Source text the summary was generated from. Set once at creation.
    pub original_text: String,
    /// Image the generation was grounded in, if any; follow-up calls reuse
    /// it for multimodal grounding.
    pub image_path: Option<String>,
    /// Display text produced at creation. Replaced only by re-creation,
    /// never mutated by follow-ups.
    pub summary: String,
    pub history: Vec<QaTurn>,
    pub created_at: DateTime<Utc>,
}

impl SummarySession {
    pub fn new(original_text: String, image_path: Option<String>, summary: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            original_text,
            image_path,
            summary,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// History flattened into alternating user/assistant entries, one entry
    /// per side of each turn.
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        let mut entries = Vec::with_capacity(self.history.len() * 2);
        for turn in &self.history {
            entries.push(TranscriptEntry {
                role: MessageRole::User,
                content: turn.question.clone(),
            });
            entries.push(TranscriptEntry {
                role: MessageRole::Assistant,
                content: turn.answer.clone(),
            });
        }
        entries
    }
}

/// Render a session for the rich-text notes editor: the summary first, then
/// the follow-up conversation when there is one. The summary is already
/// markup; message contents are escaped on the way in.
pub fn notes_html(session: &SummarySession) -> String {
    let summary = if session.summary.trim().is_empty() {
        "No summary available."
    } else {
        session.summary.as_str()
    };
    let mut html = format!("<h2>Summary</h2><p>{}</p>", summary);

    if session.history.is_empty() {
        return html;
    }

    html.push_str("<h2>Follow-up Conversation</h2>");
    for entry in session.transcript() {
        html.push_str(&format!(
            "<p><strong>{}:</strong> {}</p>",
            entry.role.capitalized(),
            escape_html(&entry.content)
        ));
    }
    html
}

/// Trait for storing and retrieving summary sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: SummarySession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<SummarySession>>;
    /// Append one immutable turn to a session's history and return the
    /// updated session. History is append-only; no turn is ever edited or
    /// removed.
    async fn append_turn(&self, id: &str, turn: QaTurn) -> Result<SummarySession>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStore
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, SummarySession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: SummarySession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SummarySession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn append_turn(&self, id: &str, turn: QaTurn) -> Result<SummarySession> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| FlowError::SessionNotFound(id.to_string()))?;
        entry.history.push(turn);
        Ok(entry.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
