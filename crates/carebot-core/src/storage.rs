//! Storage capability trait.
//!
//! Local persistence is best-effort: loads degrade to "nothing persisted"
//! instead of failing the caller, and `clear` removes the session and the
//! message log together so neither can outlive the other.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::ChatMessage;
use crate::session::ChatSession;
use crate::state::Theme;

/// Capability interface for client-side persistence.
///
/// Injected into the session manager so it can be swapped for any key-value
/// store, or disabled entirely in tests, without touching control flow.
#[async_trait]
pub trait ChatStorage: Send + Sync {
    /// Loads the persisted session. Corrupt or missing data is `None`.
    async fn load_session(&self) -> Option<ChatSession>;

    /// Persists the session.
    async fn save_session(&self, session: &ChatSession) -> Result<()>;

    /// Loads the persisted message log. Corrupt or missing data is empty.
    async fn load_messages(&self) -> Vec<ChatMessage>;

    /// Persists the message log.
    async fn save_messages(&self, messages: &[ChatMessage]) -> Result<()>;

    /// Loads the persisted theme preference, if any.
    async fn load_theme(&self) -> Option<Theme>;

    /// Persists the theme preference.
    async fn save_theme(&self, theme: Theme) -> Result<()>;

    /// Removes the persisted session and message log together.
    async fn clear(&self) -> Result<()>;
}
