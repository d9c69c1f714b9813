//! Wire types for the backend REST boundary.
//!
//! The backend speaks snake_case JSON. Deserialization is lenient: optional
//! fields default to empty collections or `None` so a malformed or sparse
//! response degrades instead of erroring. Wire affordances (buttons, quick
//! replies, quick actions) convert into the core domain types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use carebot_core::message::{ButtonAction, MessageButton, MessageMetadata, QuickReply};
use carebot_core::quick_action::QuickAction;

/// Body for `POST /chatbot/message/`.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub message: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_context: Option<serde_json::Value>,
}

/// Body for `POST /chatbot/handle-intent/`.
#[derive(Debug, Clone, Serialize)]
pub struct HandleIntentRequest {
    pub intent_type: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Body for `POST /chatbot/intent/`.
#[derive(Debug, Clone, Serialize)]
pub struct DetectIntentRequest {
    pub message: String,
}

/// Classified shape of a backend response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Greeting,
    FormGuidance,
    Redirect,
    Error,
    /// Anything unrecognized is treated as plain text.
    #[serde(other)]
    Text,
}

impl Default for ResponseType {
    fn default() -> Self {
        ResponseType::Text
    }
}

/// A button as the backend declares it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireButton {
    pub text: String,
    #[serde(default = "default_button_action")]
    pub action: ButtonAction,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
}

fn default_button_action() -> ButtonAction {
    ButtonAction::Info
}

impl From<WireButton> for MessageButton {
    fn from(wire: WireButton) -> Self {
        MessageButton {
            text: wire.text,
            action: wire.action,
            value: wire.value,
            info: wire.info,
        }
    }
}

/// A quick reply as the backend declares it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireQuickReply {
    pub text: String,
    pub intent_type: String,
}

impl From<WireQuickReply> for QuickReply {
    fn from(wire: WireQuickReply) -> Self {
        QuickReply {
            text: wire.text,
            intent_type: wire.intent_type,
        }
    }
}

/// Structured extras attached to a message response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    /// Field names to collect when the response type is `form_guidance`.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Form title override.
    #[serde(default)]
    pub form_title: Option<String>,
    /// Form description override.
    #[serde(default)]
    pub form_description: Option<String>,
    /// Navigation target when the response type is `redirect`.
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// Entities the backend extracted.
    #[serde(default)]
    pub entities: HashMap<String, serde_json::Value>,
}

/// Response shape shared by `/chatbot/message/` and `/chatbot/handle-intent/`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(default)]
    pub response_type: ResponseType,
    #[serde(default)]
    pub buttons: Vec<WireButton>,
    #[serde(default)]
    pub quick_replies: Vec<WireQuickReply>,
    #[serde(default)]
    pub intent_detected: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<ResponseMetadata>,
}

impl MessageResponse {
    /// Maps the response into message metadata for the bot message built
    /// from it.
    pub fn to_message_metadata(&self) -> MessageMetadata {
        let response_type = serde_json::to_value(self.response_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string));
        MessageMetadata {
            intent: self.intent_detected.clone(),
            confidence: self.confidence_score,
            entities: self
                .metadata
                .as_ref()
                .map(|m| m.entities.clone())
                .unwrap_or_default(),
            response_type,
            quick_replies: self
                .quick_replies
                .iter()
                .cloned()
                .map(QuickReply::from)
                .collect(),
            buttons: self.buttons.iter().cloned().map(MessageButton::from).collect(),
            required_fields: self
                .metadata
                .as_ref()
                .map(|m| m.required_fields.clone())
                .unwrap_or_default(),
        }
    }
}

/// Response of `POST /chatbot/intent/`.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentResponse {
    pub intent_type: String,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub intent_name: Option<String>,
    #[serde(default)]
    pub intent_description: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
}

/// A quick action as the backend declares it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireQuickAction {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub button_text: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub intent_type: String,
    #[serde(default)]
    pub requires_auth: bool,
}

impl From<WireQuickAction> for QuickAction {
    fn from(wire: WireQuickAction) -> Self {
        QuickAction {
            id: wire.id,
            title: wire.title,
            description: wire.description,
            button_text: wire.button_text,
            icon: wire.icon,
            intent_type: wire.intent_type,
            requires_auth: wire.requires_auth,
        }
    }
}

/// Response of `GET /chatbot/quick-actions/`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuickActionsResponse {
    #[serde(default)]
    pub quick_actions: Vec<WireQuickAction>,
    #[serde(default)]
    pub count: usize,
}

/// Response of `GET /chatbot/health/`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub statistics: Option<serde_json::Value>,
}

impl HealthResponse {
    /// Whether the backend reports itself healthy.
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}
