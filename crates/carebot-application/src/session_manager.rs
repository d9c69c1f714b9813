//! Session lifecycle against the storage capability.
//!
//! `SessionManager` owns creation, restoration, persistence, and teardown of
//! the active session. Restoration is best-effort: corrupt or missing
//! storage silently falls back to "no session". Persistence failures are
//! logged and never fatal.

use std::sync::Arc;

use carebot_core::message::ChatMessage;
use carebot_core::session::ChatSession;
use carebot_core::state::Theme;
use carebot_core::storage::ChatStorage;

/// Manages the active session's lifecycle.
pub struct SessionManager {
    storage: Arc<dyn ChatStorage>,
    persistence_enabled: bool,
}

impl SessionManager {
    /// Creates a manager over the given storage backend.
    ///
    /// With `persistence_enabled` off, nothing is ever written; restoration
    /// always yields "no session".
    pub fn new(storage: Arc<dyn ChatStorage>, persistence_enabled: bool) -> Self {
        Self {
            storage,
            persistence_enabled,
        }
    }

    /// Creates a fresh session and persists it.
    ///
    /// Emits a `session_started` analytics event.
    pub async fn create_session(&self, user_context: Option<serde_json::Value>) -> ChatSession {
        let session = ChatSession::new(user_context);
        if self.persistence_enabled {
            if let Err(err) = self.storage.save_session(&session).await {
                tracing::warn!(%err, "failed to persist new session");
            }
        }
        tracing::info!(
            target: "analytics",
            session_id = %session.session_id,
            "session_started"
        );
        session
    }

    /// Restores the persisted session and message log, if any.
    pub async fn restore(&self) -> Option<(ChatSession, Vec<ChatMessage>)> {
        if !self.persistence_enabled {
            return None;
        }
        let session = self.storage.load_session().await?;
        let messages = self.storage.load_messages().await;
        Some((session, messages))
    }

    /// Persists the session and message log together, best-effort.
    pub async fn persist(&self, session: &ChatSession, messages: &[ChatMessage]) {
        if !self.persistence_enabled {
            return;
        }
        if let Err(err) = self.storage.save_session(session).await {
            tracing::warn!(%err, "failed to persist session");
        }
        if let Err(err) = self.storage.save_messages(messages).await {
            tracing::warn!(%err, "failed to persist messages");
        }
    }

    /// Removes the persisted session and message log together.
    pub async fn end(&self) {
        if !self.persistence_enabled {
            return;
        }
        if let Err(err) = self.storage.clear().await {
            tracing::warn!(%err, "failed to clear persisted session");
        }
    }

    /// Loads the persisted theme preference.
    pub async fn load_theme(&self) -> Option<Theme> {
        if !self.persistence_enabled {
            return None;
        }
        self.storage.load_theme().await
    }

    /// Persists the theme preference, best-effort.
    pub async fn save_theme(&self, theme: Theme) {
        if !self.persistence_enabled {
            return;
        }
        if let Err(err) = self.storage.save_theme(theme).await {
            tracing::warn!(%err, "failed to persist theme");
        }
    }
}
