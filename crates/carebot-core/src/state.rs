//! Aggregate dispatch state and its reducer.
//!
//! All client-side mutation flows through `reduce`; no other component
//! touches sub-state directly. The action catalog is a closed enum, so the
//! exhaustive match forces every new action kind through a compile-time
//! check of all handlers.

use serde::{Deserialize, Serialize};

use crate::form::FormSpec;
use crate::message::{ChatMessage, MessageUpdate};
use crate::quick_action::QuickAction;
use crate::session::ChatSession;

/// Backend reachability as last observed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Connecting,
    Disconnected,
}

/// UI theme preference, persisted across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// The other theme.
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// The aggregate root every render reads from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchState {
    /// Ordered conversation log, append-only.
    pub messages: Vec<ChatMessage>,
    /// The active session, if any.
    pub session: Option<ChatSession>,
    /// A remote call is in flight.
    pub is_loading: bool,
    /// The bot typing indicator is showing.
    pub is_typing: bool,
    /// Non-fatal global error string for the transient banner.
    pub error: Option<String>,
    /// Quick-action catalog, fetched once per session.
    pub quick_actions: Vec<QuickAction>,
    /// The active dynamic form, at most one per session.
    pub current_form: Option<FormSpec>,
    /// Backend reachability.
    pub connection_status: ConnectionStatus,
    /// UI theme preference.
    pub theme: Theme,
}

/// Every state transition the client can make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateAction {
    SetLoading { loading: bool },
    SetTyping { typing: bool },
    SetError { message: String },
    ClearError,
    AddMessage { message: ChatMessage },
    UpdateMessage { id: String, update: MessageUpdate },
    ReplaceMessages { messages: Vec<ChatMessage> },
    SetSession { session: Option<ChatSession> },
    SetQuickActions { actions: Vec<QuickAction> },
    SetCurrentForm { form: Option<FormSpec> },
    SetConnectionStatus { status: ConnectionStatus },
    ToggleTheme,
    ClearMessages,
}

/// Applies one action to the state and returns the next state.
///
/// Total over the action catalog and never panics. `AddMessage` is
/// append-only; `UpdateMessage` is a keyed merge that is a no-op when the id
/// is absent. `ClearMessages` clears the message log together with the
/// session and any active form: the session and its messages are
/// lifecycle-coupled, so one is never dropped without the other.
pub fn reduce(mut state: DispatchState, action: StateAction) -> DispatchState {
    match action {
        StateAction::SetLoading { loading } => {
            state.is_loading = loading;
        }
        StateAction::SetTyping { typing } => {
            state.is_typing = typing;
        }
        StateAction::SetError { message } => {
            state.error = Some(message);
        }
        StateAction::ClearError => {
            state.error = None;
        }
        StateAction::AddMessage { message } => {
            state.messages.push(message);
        }
        StateAction::UpdateMessage { id, update } => {
            if let Some(message) = state.messages.iter_mut().find(|m| m.id == id) {
                update.apply(message);
            }
        }
        StateAction::ReplaceMessages { messages } => {
            state.messages = messages;
        }
        StateAction::SetSession { session } => {
            state.session = session;
        }
        StateAction::SetQuickActions { actions } => {
            state.quick_actions = actions;
        }
        StateAction::SetCurrentForm { form } => {
            state.current_form = form;
        }
        StateAction::SetConnectionStatus { status } => {
            state.connection_status = status;
        }
        StateAction::ToggleTheme => {
            state.theme = state.theme.toggled();
        }
        StateAction::ClearMessages => {
            state.messages.clear();
            state.session = None;
            state.current_form = None;
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageStatus;

    #[test]
    fn add_message_is_append_only() {
        let mut state = DispatchState::default();
        let texts = ["one", "two", "three"];
        for text in texts {
            state = reduce(
                state,
                StateAction::AddMessage {
                    message: ChatMessage::user(text),
                },
            );
        }
        assert_eq!(state.messages.len(), texts.len());
        let order: Vec<&str> = state.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(order, texts);
    }

    #[test]
    fn update_message_with_unknown_id_is_a_no_op() {
        let state = reduce(
            DispatchState::default(),
            StateAction::AddMessage {
                message: ChatMessage::user("Hello"),
            },
        );
        let before = state.clone();
        let after = reduce(
            state,
            StateAction::UpdateMessage {
                id: "no-such-id".to_string(),
                update: MessageUpdate::status(MessageStatus::Delivered),
            },
        );
        assert_eq!(before, after);
    }

    #[test]
    fn update_message_merges_by_id() {
        let message = ChatMessage::user("Hello");
        let id = message.id.clone();
        let state = reduce(DispatchState::default(), StateAction::AddMessage { message });
        let state = reduce(
            state,
            StateAction::UpdateMessage {
                id,
                update: MessageUpdate::status(MessageStatus::Delivered),
            },
        );
        assert_eq!(state.messages[0].status, MessageStatus::Delivered);
        assert_eq!(state.messages[0].text, "Hello");
    }

    #[test]
    fn clear_messages_drops_session_and_form_together() {
        let mut state = DispatchState::default();
        state.session = Some(ChatSession::new(None));
        state.messages.push(ChatMessage::user("Hello"));
        state.current_form = Some(crate::form::FormSpec {
            title: "Complaint".to_string(),
            description: String::new(),
            fields: Vec::new(),
        });

        let state = reduce(state, StateAction::ClearMessages);

        assert!(state.messages.is_empty());
        assert!(state.session.is_none());
        assert!(state.current_form.is_none());
    }

    #[test]
    fn toggle_theme_round_trips() {
        let state = DispatchState::default();
        assert_eq!(state.theme, Theme::Light);
        let state = reduce(state, StateAction::ToggleTheme);
        assert_eq!(state.theme, Theme::Dark);
        let state = reduce(state, StateAction::ToggleTheme);
        assert_eq!(state.theme, Theme::Light);
    }

    #[test]
    fn error_can_be_set_and_cleared() {
        let state = reduce(
            DispatchState::default(),
            StateAction::SetError {
                message: "backend unreachable".to_string(),
            },
        );
        assert!(state.error.is_some());
        let state = reduce(state, StateAction::ClearError);
        assert!(state.error.is_none());
    }
}
