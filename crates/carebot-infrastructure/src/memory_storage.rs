//! In-memory storage.
//!
//! Used when persistence is disabled by configuration and as a test double.
//! State lives only as long as the instance.

use async_trait::async_trait;
use tokio::sync::RwLock;

use carebot_core::error::Result;
use carebot_core::message::ChatMessage;
use carebot_core::session::ChatSession;
use carebot_core::state::Theme;
use carebot_core::storage::ChatStorage;

/// Non-durable [`ChatStorage`] implementation.
#[derive(Default)]
pub struct MemoryStorage {
    session: RwLock<Option<ChatSession>>,
    messages: RwLock<Vec<ChatMessage>>,
    theme: RwLock<Option<Theme>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStorage for MemoryStorage {
    async fn load_session(&self) -> Option<ChatSession> {
        self.session.read().await.clone()
    }

    async fn save_session(&self, session: &ChatSession) -> Result<()> {
        *self.session.write().await = Some(session.clone());
        Ok(())
    }

    async fn load_messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    async fn save_messages(&self, messages: &[ChatMessage]) -> Result<()> {
        *self.messages.write().await = messages.to_vec();
        Ok(())
    }

    async fn load_theme(&self) -> Option<Theme> {
        *self.theme.read().await
    }

    async fn save_theme(&self, theme: Theme) -> Result<()> {
        *self.theme.write().await = Some(theme);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.write().await = None;
        self.messages.write().await.clear();
        Ok(())
    }
}
