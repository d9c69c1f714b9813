//! Session domain model.
//!
//! A session is one continuous chat conversation instance. The session and
//! the message log are lifecycle-coupled: they are created together when the
//! chat is opened (or restored from storage) and destroyed together when the
//! session ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat session in the client's domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Unique session identifier (UUID format).
    pub session_id: String,
    /// Backend conversation identifier, updated from responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Opaque user context forwarded to the backend with each message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<serde_json::Value>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful exchange.
    pub last_activity: DateTime<Utc>,
}

impl ChatSession {
    /// Creates a fresh session with random session and conversation ids.
    pub fn new(user_context: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            conversation_id: Some(Uuid::new_v4().to_string()),
            user_context,
            created_at: now,
            last_activity: now,
        }
    }

    /// Refreshes the last-activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// A partial update merged into the active session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub conversation_id: Option<String>,
    pub user_context: Option<serde_json::Value>,
}

impl SessionUpdate {
    /// Applies this update to a session and refreshes `last_activity`.
    pub fn apply(&self, session: &mut ChatSession) {
        if let Some(conversation_id) = &self.conversation_id {
            session.conversation_id = Some(conversation_id.clone());
        }
        if let Some(user_context) = &self.user_context {
            session.user_context = Some(user_context.clone());
        }
        session.touch();
    }
}
