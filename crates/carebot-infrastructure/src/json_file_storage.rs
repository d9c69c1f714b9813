//! JSON-file-backed storage.
//!
//! One file per key under a base directory:
//!
//! ```text
//! base_dir/
//! ├── session.json
//! ├── messages.json
//! └── theme.json
//! ```
//!
//! Writes go to a temp file first and are renamed into place. Reads are
//! best-effort: a missing or corrupt file is logged and treated as "nothing
//! persisted", never surfaced to the caller.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use carebot_core::error::{CarebotError, Result};
use carebot_core::message::ChatMessage;
use carebot_core::session::ChatSession;
use carebot_core::state::Theme;
use carebot_core::storage::ChatStorage;

const SESSION_FILE: &str = "session.json";
const MESSAGES_FILE: &str = "messages.json";
const THEME_FILE: &str = "theme.json";

/// File-based [`ChatStorage`] implementation.
pub struct JsonFileStorage {
    base_dir: PathBuf,
}

impl JsonFileStorage {
    /// Creates storage at the default location (`<config dir>/carebot`).
    pub async fn default_location() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| CarebotError::storage("no config directory available"))?
            .join("carebot");
        Self::new(base_dir).await
    }

    /// Creates storage under the given base directory, creating it if needed.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.base_dir.join(file)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.path(file);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(file, %err, "failed to read persisted state, treating as unset");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(file, %err, "corrupt persisted state, treating as unset");
                None
            }
        }
    }

    async fn write_json<T: serde::Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string_pretty(value)?;
        let path = self.path(file);
        let tmp = self.path(&format!("{file}.tmp"));
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_if_present(&self, file: &str) -> Result<()> {
        match fs::remove_file(self.path(file)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ChatStorage for JsonFileStorage {
    async fn load_session(&self) -> Option<ChatSession> {
        self.read_json(SESSION_FILE).await
    }

    async fn save_session(&self, session: &ChatSession) -> Result<()> {
        self.write_json(SESSION_FILE, session).await
    }

    async fn load_messages(&self) -> Vec<ChatMessage> {
        self.read_json(MESSAGES_FILE).await.unwrap_or_default()
    }

    async fn save_messages(&self, messages: &[ChatMessage]) -> Result<()> {
        self.write_json(MESSAGES_FILE, &messages).await
    }

    async fn load_theme(&self) -> Option<Theme> {
        self.read_json(THEME_FILE).await
    }

    async fn save_theme(&self, theme: Theme) -> Result<()> {
        self.write_json(THEME_FILE, &theme).await
    }

    async fn clear(&self) -> Result<()> {
        self.remove_if_present(SESSION_FILE).await?;
        self.remove_if_present(MESSAGES_FILE).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).await.unwrap();

        let session = ChatSession::new(None);
        storage.save_session(&session).await.unwrap();

        let restored = storage.load_session().await.unwrap();
        assert_eq!(restored, session);
    }

    #[tokio::test]
    async fn messages_round_trip_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).await.unwrap();

        let messages = vec![ChatMessage::user("Hello"), ChatMessage::bot("Hi there")];
        storage.save_messages(&messages).await.unwrap();

        let restored = storage.load_messages().await;
        assert_eq!(restored, messages);
    }

    #[tokio::test]
    async fn missing_files_load_as_unset() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).await.unwrap();

        assert!(storage.load_session().await.is_none());
        assert!(storage.load_messages().await.is_empty());
        assert!(storage.load_theme().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_session_loads_as_unset() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).await.unwrap();

        fs::write(dir.path().join(SESSION_FILE), "{not json")
            .await
            .unwrap();

        assert!(storage.load_session().await.is_none());
    }

    #[tokio::test]
    async fn clear_removes_session_and_messages_together() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).await.unwrap();

        storage.save_session(&ChatSession::new(None)).await.unwrap();
        storage
            .save_messages(&[ChatMessage::user("Hello")])
            .await
            .unwrap();
        storage.save_theme(Theme::Dark).await.unwrap();

        storage.clear().await.unwrap();

        assert!(storage.load_session().await.is_none());
        assert!(storage.load_messages().await.is_empty());
        // Theme is a preference, not session state; it survives.
        assert_eq!(storage.load_theme().await, Some(Theme::Dark));
    }
}
