//! Chat message types.
//!
//! This module contains types for representing messages in a conversation,
//! including the sender, delivery status, and backend-provided metadata
//! (detected intent, quick replies, buttons, required form fields).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Represents the author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    /// Message typed (or triggered) by the user.
    User,
    /// Message produced from a backend response.
    Bot,
}

/// Delivery status of a chat message.
///
/// A user message starts as `Sending` and transitions only to `Delivered`
/// or `Failed`. Bot messages are created already `Delivered` — there is no
/// client-side round-trip once the response has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Failed,
}

/// A backend-suggested short reply rendered as a button under a bot message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickReply {
    /// Label shown to the user; echoed as a user message when clicked.
    pub text: String,
    /// Intent the reply is bound to.
    pub intent_type: String,
}

/// Declared behavior of a message button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    /// Client-side navigation to a mapped route.
    Redirect,
    /// Delegates to intent handling.
    Intent,
    /// Appends an informational bot message locally, no network call.
    Input,
    /// Unknown actions degrade to a local informational message.
    #[serde(other)]
    Info,
}

/// A backend-declared button attached to a bot message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageButton {
    /// Label shown to the user; echoed as a user message when clicked.
    pub text: String,
    /// What clicking the button does.
    pub action: ButtonAction,
    /// Action payload: an intent type for `Intent`, a route key for `Redirect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Informational text appended locally for `Info`/`Input` buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// Backend-provided metadata attached to a message.
///
/// All fields are optional on the wire; missing collections deserialize as
/// empty rather than erroring.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Intent the backend detected behind the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Backend confidence in the detected intent (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Entities the backend extracted from the message.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub entities: HashMap<String, serde_json::Value>,
    /// Response type of the originating backend response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    /// Suggested quick replies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<QuickReply>,
    /// Declared buttons.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<MessageButton>,
    /// Field names the backend requires for a dynamic form.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_fields: Vec<String>,
}

/// A single message in the conversation log.
///
/// Messages are immutable once delivered except for status-only updates;
/// edits are not supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique message identifier (UUID format).
    pub id: String,
    /// Message text.
    pub text: String,
    /// Who authored the message.
    pub sender: MessageSender,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    /// Session the message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Backend conversation the message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Delivery status.
    pub status: MessageStatus,
    /// How many times a failed send of this text has been retried.
    /// Carried on the record so the reducer stays the single source of truth.
    #[serde(default)]
    pub retry_count: u32,
    /// Backend-provided metadata.
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl ChatMessage {
    /// Creates a user message in the `Sending` state.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender: MessageSender::User,
            timestamp: Utc::now(),
            session_id: None,
            conversation_id: None,
            status: MessageStatus::Sending,
            retry_count: 0,
            metadata: MessageMetadata::default(),
        }
    }

    /// Creates a bot message, already `Delivered`.
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender: MessageSender::Bot,
            timestamp: Utc::now(),
            session_id: None,
            conversation_id: None,
            status: MessageStatus::Delivered,
            retry_count: 0,
            metadata: MessageMetadata::default(),
        }
    }

    /// Attaches metadata to the message.
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Associates the message with a session.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the retry counter on the record.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// A partial update applied to a message by id.
///
/// Only the fields that are `Some` are merged; everything else is untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUpdate {
    pub status: Option<MessageStatus>,
    pub session_id: Option<String>,
    pub conversation_id: Option<String>,
    pub retry_count: Option<u32>,
    pub metadata: Option<MessageMetadata>,
}

impl MessageUpdate {
    /// Shorthand for a status-only update.
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Applies this update to a message.
    pub fn apply(&self, message: &mut ChatMessage) {
        if let Some(status) = self.status {
            message.status = status;
        }
        if let Some(session_id) = &self.session_id {
            message.session_id = Some(session_id.clone());
        }
        if let Some(conversation_id) = &self.conversation_id {
            message.conversation_id = Some(conversation_id.clone());
        }
        if let Some(retry_count) = self.retry_count {
            message.retry_count = retry_count;
        }
        if let Some(metadata) = &self.metadata {
            message.metadata = metadata.clone();
        }
    }
}
