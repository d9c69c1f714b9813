//! Conversation controller.
//!
//! The only component allowed to call the remote boundary. It owns the
//! dispatch state, routes every mutation through the reducer, applies the
//! optimistic-update message lifecycle, and converts every remote failure
//! into local state (a `Failed` message plus a global error string) — no
//! error propagates to the rendering layer from an exchange.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use carebot_core::error::{CarebotError, Result};
use carebot_core::form::{fields_from_required, FormSpec};
use carebot_core::message::{
    ButtonAction, ChatMessage, MessageButton, MessageMetadata, MessageStatus, MessageUpdate,
    QuickReply,
};
use carebot_core::session::{ChatSession, SessionUpdate};
use carebot_core::state::{reduce, ConnectionStatus, DispatchState, StateAction, Theme};
use carebot_core::storage::ChatStorage;
use carebot_interaction::protocol::{
    HandleIntentRequest, HealthResponse, MessageRequest, MessageResponse, ResponseType,
};
use carebot_interaction::ChatApi;

use crate::session_manager::SessionManager;

/// A failed text is re-attempted at most this many times.
const MAX_RETRIES: u32 = 3;

/// Bot-visible reply appended when an exchange fails.
const FAILURE_REPLY: &str =
    "Sorry, I couldn't reach the assistant just now. Please try again in a moment.";

/// Fallback informational text for `info`/`input` buttons without one.
const DEFAULT_BUTTON_INFO: &str = "You can continue this in the application.";

/// The remote call an exchange performs.
enum ApiCall {
    Message { text: String },
    Intent {
        intent_type: String,
        parameters: Option<serde_json::Value>,
    },
}

/// Orchestrates the conversation against the backend API.
///
/// Owned by the composition root; lifecycle is explicit via [`init`] and
/// [`end_session`] rather than global state.
///
/// [`init`]: ConversationController::init
/// [`end_session`]: ConversationController::end_session
pub struct ConversationController {
    state: Arc<RwLock<DispatchState>>,
    api: Arc<dyn ChatApi>,
    sessions: SessionManager,
}

impl ConversationController {
    /// Creates a controller over the given API boundary and storage backend.
    pub fn new(
        api: Arc<dyn ChatApi>,
        storage: Arc<dyn ChatStorage>,
        persistence_enabled: bool,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(DispatchState::default())),
            api,
            sessions: SessionManager::new(storage, persistence_enabled),
        }
    }

    /// Restores persisted state (or creates a fresh session) and fetches the
    /// quick-action catalog.
    ///
    /// A failed catalog fetch degrades to an empty catalog and a
    /// disconnected status; it is not an error.
    pub async fn init(&self) -> Result<()> {
        if let Some(theme) = self.sessions.load_theme().await {
            let current = self.state.read().await.theme;
            if theme != current {
                self.dispatch(StateAction::ToggleTheme).await;
            }
        }

        match self.sessions.restore().await {
            Some((session, messages)) => {
                self.dispatch(StateAction::SetSession {
                    session: Some(session),
                })
                .await;
                self.dispatch(StateAction::ReplaceMessages { messages }).await;
            }
            None => {
                let session = self.sessions.create_session(None).await;
                self.dispatch(StateAction::SetSession {
                    session: Some(session),
                })
                .await;
            }
        }

        self.refresh_quick_actions().await;
        Ok(())
    }

    /// Returns a snapshot of the current state for rendering.
    pub async fn state(&self) -> DispatchState {
        self.state.read().await.clone()
    }

    /// Sends a user-authored message through the optimistic-update path.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.send_attempt(text, 0).await
    }

    /// Runs an intent exchange without a user-authored message (greetings,
    /// button-triggered intents).
    pub async fn handle_intent(
        &self,
        intent_type: &str,
        parameters: Option<serde_json::Value>,
    ) -> Result<()> {
        self.run_exchange(
            None,
            ApiCall::Intent {
                intent_type: intent_type.to_string(),
                parameters,
            },
        )
        .await
    }

    /// Appends the reply's label as a user message and delegates to its
    /// bound intent.
    pub async fn send_quick_reply(&self, reply: &QuickReply) -> Result<()> {
        self.run_exchange(
            Some(ChatMessage::user(&reply.text)),
            ApiCall::Intent {
                intent_type: reply.intent_type.clone(),
                parameters: None,
            },
        )
        .await
    }

    /// Dispatches a button click on its declared action.
    ///
    /// Returns the mapped route for `redirect` buttons; everything else
    /// yields `None`.
    pub async fn click_button(&self, button: &MessageButton) -> Result<Option<String>> {
        match button.action {
            ButtonAction::Redirect => {
                self.append_local_user_message(&button.text).await;
                let route = route_for(button.value.as_deref());
                tracing::info!(target: "navigation", %route, "redirect button clicked");
                self.persist_snapshot().await;
                Ok(Some(route))
            }
            ButtonAction::Intent => match &button.value {
                Some(intent_type) => {
                    self.run_exchange(
                        Some(ChatMessage::user(&button.text)),
                        ApiCall::Intent {
                            intent_type: intent_type.clone(),
                            parameters: None,
                        },
                    )
                    .await?;
                    Ok(None)
                }
                // An intent button without a bound intent degrades to info.
                None => {
                    self.append_info_exchange(button).await;
                    Ok(None)
                }
            },
            ButtonAction::Info | ButtonAction::Input => {
                self.append_info_exchange(button).await;
                Ok(None)
            }
        }
    }

    /// Validates and submits the active form.
    ///
    /// Validation failures set a user-visible error and perform no network
    /// call. On success the form is cleared and the data is sent as a tagged
    /// message through the normal send path.
    pub async fn submit_form(&self, data: &HashMap<String, String>) -> Result<()> {
        let form = self.state.read().await.current_form.clone();
        let Some(form) = form else {
            tracing::warn!("submit_form called without an active form");
            return Ok(());
        };

        if let Err(errors) = form.validate(data) {
            let summary = errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            self.dispatch(StateAction::SetError { message: summary }).await;
            return Err(CarebotError::Validation(errors));
        }

        self.dispatch(StateAction::SetCurrentForm { form: None }).await;

        let payload = serde_json::json!({
            "type": "form_submission",
            "form": form.title,
            "data": data,
        });
        let text = serde_json::to_string(&payload)?;
        self.send_attempt(&text, 0).await
    }

    /// Discards the active form without submitting. No-op when none is active.
    pub async fn cancel_form(&self) {
        self.dispatch(StateAction::SetCurrentForm { form: None }).await;
    }

    /// Re-attempts the most recent failed send.
    ///
    /// Bounded at [`MAX_RETRIES`]; attempts beyond the bound are silently
    /// ignored — the failed message state is the only remaining signal.
    pub async fn retry_message(&self) -> Result<()> {
        let last_failed = {
            let state = self.state.read().await;
            state
                .messages
                .iter()
                .rev()
                .find(|m| {
                    m.sender == carebot_core::message::MessageSender::User
                        && m.status == MessageStatus::Failed
                })
                .cloned()
        };

        let Some(failed) = last_failed else {
            return Ok(());
        };
        if failed.retry_count >= MAX_RETRIES {
            tracing::debug!(message_id = %failed.id, "retry limit reached, ignoring");
            return Ok(());
        }

        self.send_attempt(&failed.text, failed.retry_count + 1).await
    }

    /// Merges fields into the active session and re-persists.
    ///
    /// Logged no-op when there is no active session.
    pub async fn update_session(&self, update: SessionUpdate) {
        let merged = {
            let state = self.state.read().await;
            match &state.session {
                Some(session) => {
                    let mut session = session.clone();
                    update.apply(&mut session);
                    Some(session)
                }
                None => None,
            }
        };

        match merged {
            Some(session) => {
                self.dispatch(StateAction::SetSession {
                    session: Some(session),
                })
                .await;
                self.persist_snapshot().await;
            }
            None => tracing::warn!("update_session called without an active session"),
        }
    }

    /// Ends the session: the session, the message log, and any active form
    /// are cleared together, in memory and in storage.
    pub async fn end_session(&self) {
        self.dispatch(StateAction::ClearMessages).await;
        self.dispatch(StateAction::ClearError).await;
        self.sessions.end().await;
    }

    /// Toggles the UI theme and persists the preference.
    pub async fn toggle_theme(&self) {
        self.dispatch(StateAction::ToggleTheme).await;
        let theme: Theme = self.state.read().await.theme;
        self.sessions.save_theme(theme).await;
    }

    /// Probes the backend health endpoint and updates connection status.
    pub async fn check_health(&self) -> Result<HealthResponse> {
        match self.api.health().await {
            Ok(health) => {
                let status = if health.is_healthy() {
                    ConnectionStatus::Connected
                } else {
                    ConnectionStatus::Disconnected
                };
                self.dispatch(StateAction::SetConnectionStatus { status }).await;
                Ok(health)
            }
            Err(err) => {
                self.dispatch(StateAction::SetConnectionStatus {
                    status: ConnectionStatus::Disconnected,
                })
                .await;
                Err(err)
            }
        }
    }

    /// Fetches the quick-action catalog, degrading to empty on failure.
    pub async fn refresh_quick_actions(&self) {
        match self.api.quick_actions().await {
            Ok(actions) => {
                self.dispatch(StateAction::SetQuickActions { actions }).await;
                self.dispatch(StateAction::SetConnectionStatus {
                    status: ConnectionStatus::Connected,
                })
                .await;
            }
            Err(err) => {
                tracing::warn!(%err, "failed to fetch quick actions");
                self.dispatch(StateAction::SetConnectionStatus {
                    status: ConnectionStatus::Disconnected,
                })
                .await;
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn dispatch(&self, action: StateAction) {
        let mut guard = self.state.write().await;
        let next = reduce(std::mem::take(&mut *guard), action);
        *guard = next;
    }

    /// Returns the active session, lazily creating one if absent, so a send
    /// is deferred rather than dropped.
    async fn ensure_session(&self) -> ChatSession {
        let active = self.state.read().await.session.clone();
        if let Some(session) = active {
            return session;
        }
        let session = self.sessions.create_session(None).await;
        self.dispatch(StateAction::SetSession {
            session: Some(session.clone()),
        })
        .await;
        session
    }

    async fn send_attempt(&self, text: &str, retry_count: u32) -> Result<()> {
        let user_message = ChatMessage::user(text).with_retry_count(retry_count);
        self.run_exchange(Some(user_message), ApiCall::Message {
            text: text.to_string(),
        })
        .await
    }

    /// Performs one optimistic exchange: append the user message (if any),
    /// await the remote call, then apply the completion — unless the
    /// originating session is no longer current, in which case the stale
    /// completion is dropped.
    async fn run_exchange(&self, user_message: Option<ChatMessage>, call: ApiCall) -> Result<()> {
        let session = self.ensure_session().await;
        let origin_session_id = session.session_id.clone();

        let user_message_id = match user_message {
            Some(message) => {
                let message = message.with_session_id(&origin_session_id);
                let id = message.id.clone();
                self.dispatch(StateAction::AddMessage { message }).await;
                Some(id)
            }
            None => None,
        };

        self.dispatch(StateAction::ClearError).await;
        self.dispatch(StateAction::SetLoading { loading: true }).await;
        self.dispatch(StateAction::SetTyping { typing: true }).await;

        let result = match &call {
            ApiCall::Message { text } => {
                let request = MessageRequest {
                    message: text.clone(),
                    session_id: origin_session_id.clone(),
                    user_context: session.user_context.clone(),
                };
                self.api.send_message(&request).await
            }
            ApiCall::Intent {
                intent_type,
                parameters,
            } => {
                let request = HandleIntentRequest {
                    intent_type: intent_type.clone(),
                    session_id: origin_session_id.clone(),
                    parameters: parameters.clone(),
                };
                self.api.handle_intent(&request).await
            }
        };

        self.dispatch(StateAction::SetLoading { loading: false }).await;
        self.dispatch(StateAction::SetTyping { typing: false }).await;

        let current_session_id = self
            .state
            .read()
            .await
            .session
            .as_ref()
            .map(|s| s.session_id.clone());
        if current_session_id.as_deref() != Some(origin_session_id.as_str()) {
            tracing::warn!(
                origin_session = %origin_session_id,
                "dropping completion for a session that is no longer active"
            );
            return Ok(());
        }

        match result {
            Ok(response) => self.apply_success(user_message_id, response).await,
            Err(err) => self.apply_failure(user_message_id, &err).await,
        }

        self.persist_snapshot().await;
        Ok(())
    }

    async fn apply_success(&self, user_message_id: Option<String>, response: MessageResponse) {
        if let Some(id) = user_message_id {
            let mut update = MessageUpdate::status(MessageStatus::Delivered);
            update.conversation_id = response.conversation_id.clone();
            self.dispatch(StateAction::UpdateMessage { id, update }).await;
        }

        let metadata = response.to_message_metadata();
        let bot_message = ChatMessage::bot(&response.message).with_metadata(metadata.clone());
        let bot_message = match &response.session_id {
            Some(session_id) => bot_message.with_session_id(session_id),
            None => bot_message,
        };
        self.dispatch(StateAction::AddMessage {
            message: bot_message,
        })
        .await;

        match response.response_type {
            ResponseType::FormGuidance if !metadata.required_fields.is_empty() => {
                let form = build_form(&response, &metadata);
                self.dispatch(StateAction::SetCurrentForm { form: Some(form) }).await;
            }
            ResponseType::Redirect => {
                let target = response
                    .metadata
                    .as_ref()
                    .and_then(|m| m.redirect_url.clone())
                    .unwrap_or_else(|| "/".to_string());
                tracing::info!(target: "navigation", redirect = %target, "redirect response received");
            }
            _ => {}
        }

        // The read guard must drop before dispatch takes the write lock;
        // holding it across the await would deadlock the task.
        let session = self.state.read().await.session.clone();
        if let Some(mut session) = session {
            SessionUpdate {
                conversation_id: response.conversation_id.clone(),
                user_context: None,
            }
            .apply(&mut session);
            self.dispatch(StateAction::SetSession {
                session: Some(session),
            })
            .await;
        }

        self.dispatch(StateAction::SetConnectionStatus {
            status: ConnectionStatus::Connected,
        })
        .await;
    }

    async fn apply_failure(&self, user_message_id: Option<String>, err: &CarebotError) {
        tracing::warn!(%err, "exchange failed");

        if let Some(id) = user_message_id {
            self.dispatch(StateAction::UpdateMessage {
                id,
                update: MessageUpdate::status(MessageStatus::Failed),
            })
            .await;
        }

        let metadata = MessageMetadata {
            response_type: Some("error".to_string()),
            ..MessageMetadata::default()
        };
        self.dispatch(StateAction::AddMessage {
            message: ChatMessage::bot(FAILURE_REPLY).with_metadata(metadata),
        })
        .await;

        self.dispatch(StateAction::SetError {
            message: err.to_string(),
        })
        .await;

        if err.is_transport() {
            self.dispatch(StateAction::SetConnectionStatus {
                status: ConnectionStatus::Disconnected,
            })
            .await;
        }
    }

    /// Appends a locally delivered user echo (no network round-trip).
    async fn append_local_user_message(&self, text: &str) {
        let mut message = ChatMessage::user(text);
        message.status = MessageStatus::Delivered;
        self.dispatch(StateAction::AddMessage { message }).await;
    }

    /// Local info/input button: user echo plus an informational bot message.
    async fn append_info_exchange(&self, button: &MessageButton) {
        self.append_local_user_message(&button.text).await;
        let info = button
            .info
            .clone()
            .unwrap_or_else(|| DEFAULT_BUTTON_INFO.to_string());
        self.dispatch(StateAction::AddMessage {
            message: ChatMessage::bot(info),
        })
        .await;
        self.persist_snapshot().await;
    }

    async fn persist_snapshot(&self) {
        let (session, messages) = {
            let state = self.state.read().await;
            (state.session.clone(), state.messages.clone())
        };
        if let Some(session) = session {
            self.sessions.persist(&session, &messages).await;
        }
    }
}

/// Builds the transient form from a `form_guidance` response.
fn build_form(response: &MessageResponse, metadata: &MessageMetadata) -> FormSpec {
    let (title, description) = response
        .metadata
        .as_ref()
        .map(|m| (m.form_title.clone(), m.form_description.clone()))
        .unwrap_or_default();
    FormSpec {
        title: title.unwrap_or_else(|| "Additional details".to_string()),
        description: description.unwrap_or_else(|| response.message.clone()),
        fields: fields_from_required(&metadata.required_fields),
    }
}

/// Maps a redirect button value to a client route.
fn route_for(value: Option<&str>) -> String {
    match value {
        None => "/".to_string(),
        Some(v) if v.starts_with('/') => v.to_string(),
        Some("upload") | Some("documents") => "/documents/upload".to_string(),
        Some("standards") => "/standards".to_string(),
        Some("complaints") | Some("feedback") => "/complaints".to_string(),
        Some("audit") => "/audit-questions".to_string(),
        Some(other) => format!("/{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use carebot_core::message::MessageSender;
    use carebot_core::quick_action::QuickAction;
    use carebot_infrastructure::MemoryStorage;
    use carebot_interaction::protocol::{IntentResponse, ResponseMetadata};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn text_response(message: &str) -> MessageResponse {
        MessageResponse {
            message: message.to_string(),
            response_type: ResponseType::Text,
            buttons: Vec::new(),
            quick_replies: Vec::new(),
            intent_detected: Some("general_inquiry".to_string()),
            confidence_score: Some(0.9),
            session_id: None,
            conversation_id: Some("conv-1".to_string()),
            metadata: None,
        }
    }

    fn form_guidance_response() -> MessageResponse {
        MessageResponse {
            metadata: Some(ResponseMetadata {
                required_fields: vec!["patient_name".to_string()],
                form_title: Some("Complaint details".to_string()),
                ..ResponseMetadata::default()
            }),
            response_type: ResponseType::FormGuidance,
            ..text_response("Please provide the details below.")
        }
    }

    /// Scripted API double; counts calls and fails on demand.
    struct MockChatApi {
        fail: bool,
        canned: MessageResponse,
        message_calls: AtomicUsize,
        intent_calls: AtomicUsize,
    }

    impl MockChatApi {
        fn ok(canned: MessageResponse) -> Self {
            Self {
                fail: false,
                canned,
                message_calls: AtomicUsize::new(0),
                intent_calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                canned: text_response("unused"),
                message_calls: AtomicUsize::new(0),
                intent_calls: AtomicUsize::new(0),
            }
        }

        fn total_calls(&self) -> usize {
            self.message_calls.load(Ordering::SeqCst) + self.intent_calls.load(Ordering::SeqCst)
        }

        fn respond(&self) -> Result<MessageResponse> {
            if self.fail {
                Err(CarebotError::transport("connection refused"))
            } else {
                Ok(self.canned.clone())
            }
        }
    }

    #[async_trait]
    impl ChatApi for MockChatApi {
        async fn send_message(&self, _request: &MessageRequest) -> Result<MessageResponse> {
            self.message_calls.fetch_add(1, Ordering::SeqCst);
            self.respond()
        }

        async fn handle_intent(&self, _request: &HandleIntentRequest) -> Result<MessageResponse> {
            self.intent_calls.fetch_add(1, Ordering::SeqCst);
            self.respond()
        }

        async fn detect_intent(&self, _message: &str) -> Result<IntentResponse> {
            Ok(IntentResponse {
                intent_type: "general_inquiry".to_string(),
                confidence_score: Some(0.5),
                intent_name: None,
                intent_description: None,
                api_endpoint: None,
            })
        }

        async fn quick_actions(&self) -> Result<Vec<QuickAction>> {
            Ok(Vec::new())
        }

        async fn health(&self) -> Result<HealthResponse> {
            Ok(HealthResponse {
                status: "healthy".to_string(),
                service: Some("chatbot".to_string()),
                version: None,
                statistics: None,
            })
        }
    }

    /// API double that parks every exchange until released.
    struct ParkedChatApi {
        release: Notify,
        canned: MessageResponse,
    }

    impl ParkedChatApi {
        fn new(canned: MessageResponse) -> Self {
            Self {
                release: Notify::new(),
                canned,
            }
        }
    }

    #[async_trait]
    impl ChatApi for ParkedChatApi {
        async fn send_message(&self, _request: &MessageRequest) -> Result<MessageResponse> {
            self.release.notified().await;
            Ok(self.canned.clone())
        }

        async fn handle_intent(&self, _request: &HandleIntentRequest) -> Result<MessageResponse> {
            self.release.notified().await;
            Ok(self.canned.clone())
        }

        async fn detect_intent(&self, _message: &str) -> Result<IntentResponse> {
            Ok(IntentResponse {
                intent_type: "general_inquiry".to_string(),
                confidence_score: None,
                intent_name: None,
                intent_description: None,
                api_endpoint: None,
            })
        }

        async fn quick_actions(&self) -> Result<Vec<QuickAction>> {
            Ok(Vec::new())
        }

        async fn health(&self) -> Result<HealthResponse> {
            Ok(HealthResponse {
                status: "healthy".to_string(),
                service: None,
                version: None,
                statistics: None,
            })
        }
    }

    fn controller_with(api: MockChatApi) -> (ConversationController, Arc<MockChatApi>) {
        let api = Arc::new(api);
        let controller = ConversationController::new(
            api.clone(),
            Arc::new(MemoryStorage::new()),
            true,
        );
        (controller, api)
    }

    #[tokio::test]
    async fn successful_send_yields_delivered_user_then_bot_message() {
        let (controller, _api) = controller_with(MockChatApi::ok(text_response("Hi there!")));

        controller.send_message("Hello").await.unwrap();

        let state = controller.state().await;
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].sender, MessageSender::User);
        assert_eq!(state.messages[0].status, MessageStatus::Delivered);
        assert_eq!(state.messages[1].sender, MessageSender::Bot);
        assert_eq!(state.messages[1].text, "Hi there!");
        assert!(!state.is_loading);
        assert!(!state.is_typing);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn successful_send_completes_within_the_timeout() {
        let (controller, _api) = controller_with(MockChatApi::ok(text_response("Hi there!")));

        tokio::time::timeout(Duration::from_secs(3), controller.send_message("Hello"))
            .await
            .expect("send finished")
            .unwrap();

        let state = controller.state().await;
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].status, MessageStatus::Delivered);
    }

    #[tokio::test]
    async fn completion_arriving_after_end_session_is_dropped() {
        let api = Arc::new(ParkedChatApi::new(text_response("Too late")));
        let controller = Arc::new(ConversationController::new(
            api.clone(),
            Arc::new(MemoryStorage::new()),
            true,
        ));

        let send = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.send_message("Hello").await }
        });

        // Wait for the optimistic append so the call is in flight.
        while controller.state().await.messages.is_empty() {
            tokio::task::yield_now().await;
        }

        controller.end_session().await;
        api.release.notify_one();
        send.await.unwrap().unwrap();

        let state = controller.state().await;
        assert!(state.messages.is_empty());
        assert!(state.session.is_none());
        assert!(!state.is_loading);
        assert!(!state.is_typing);
    }

    #[tokio::test]
    async fn sending_without_a_session_creates_exactly_one() {
        let (controller, _api) = controller_with(MockChatApi::ok(text_response("Hi")));

        assert!(controller.state().await.session.is_none());
        controller.send_message("Hello").await.unwrap();

        let state = controller.state().await;
        let session = state.session.expect("session lazily created");
        assert_eq!(
            state.messages[0].session_id.as_deref(),
            Some(session.session_id.as_str())
        );
    }

    #[tokio::test]
    async fn failed_send_marks_user_failed_and_sets_error() {
        let (controller, _api) = controller_with(MockChatApi::failing());

        controller.send_message("Hello").await.unwrap();

        let state = controller.state().await;
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].status, MessageStatus::Failed);
        assert_eq!(state.messages[1].sender, MessageSender::Bot);
        assert_eq!(
            state.messages[1].metadata.response_type.as_deref(),
            Some("error")
        );
        assert!(state.error.is_some());
        assert_eq!(state.connection_status, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn retry_is_bounded_at_three_attempts() {
        let (controller, api) = controller_with(MockChatApi::failing());

        controller.send_message("Hello").await.unwrap();
        for _ in 0..5 {
            controller.retry_message().await.unwrap();
        }

        // Initial send plus three retries; further retries are ignored.
        assert_eq!(api.total_calls(), 4);
        let state = controller.state().await;
        let last_failed = state
            .messages
            .iter()
            .rev()
            .find(|m| m.sender == MessageSender::User)
            .unwrap();
        assert_eq!(last_failed.retry_count, MAX_RETRIES);
        assert_eq!(last_failed.text, "Hello");
    }

    #[tokio::test]
    async fn retry_without_a_failure_is_a_no_op() {
        let (controller, api) = controller_with(MockChatApi::ok(text_response("Hi")));

        controller.retry_message().await.unwrap();
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn form_guidance_response_populates_current_form() {
        let (controller, _api) = controller_with(MockChatApi::ok(form_guidance_response()));

        controller.send_message("I want to register a complaint").await.unwrap();

        let state = controller.state().await;
        let form = state.current_form.expect("form populated");
        assert_eq!(form.title, "Complaint details");
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.fields[0].name, "patient_name");
        assert_eq!(form.fields[0].label, "Patient Name");
    }

    #[tokio::test]
    async fn invalid_form_submission_makes_no_network_call() {
        let (controller, api) = controller_with(MockChatApi::ok(form_guidance_response()));

        controller.send_message("complaint").await.unwrap();
        let calls_after_setup = api.total_calls();

        let err = controller.submit_form(&HashMap::new()).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(api.total_calls(), calls_after_setup);

        let state = controller.state().await;
        assert!(state.error.is_some());
        assert!(state.current_form.is_some());
    }

    #[tokio::test]
    async fn valid_form_submission_clears_form_and_sends() {
        let (controller, api) = controller_with(MockChatApi::ok(form_guidance_response()));

        controller.send_message("complaint").await.unwrap();
        let calls_after_setup = api.total_calls();

        let mut data = HashMap::new();
        data.insert("patient_name".to_string(), "Jane".to_string());
        controller.submit_form(&data).await.unwrap();

        assert_eq!(api.total_calls(), calls_after_setup + 1);
        let state = controller.state().await;
        // The guidance response re-populates the form on the submit reply;
        // what matters is that the submission itself went through tagged.
        let submitted = state
            .messages
            .iter()
            .rev()
            .find(|m| m.sender == MessageSender::User)
            .unwrap();
        assert!(submitted.text.contains("form_submission"));
        assert!(submitted.text.contains("Jane"));
    }

    #[tokio::test]
    async fn cancel_form_discards_without_network() {
        let (controller, api) = controller_with(MockChatApi::ok(form_guidance_response()));

        controller.send_message("complaint").await.unwrap();
        assert!(controller.state().await.current_form.is_some());
        let calls_after_setup = api.total_calls();

        controller.cancel_form().await;

        assert!(controller.state().await.current_form.is_none());
        assert_eq!(api.total_calls(), calls_after_setup);
    }

    #[tokio::test]
    async fn quick_reply_echoes_label_then_delegates_to_intent() {
        let (controller, api) = controller_with(MockChatApi::ok(text_response("On it.")));

        let reply = QuickReply {
            text: "Yes, register it".to_string(),
            intent_type: "complaint_registration".to_string(),
        };
        controller.send_quick_reply(&reply).await.unwrap();

        assert_eq!(api.intent_calls.load(Ordering::SeqCst), 1);
        let state = controller.state().await;
        assert_eq!(state.messages[0].text, "Yes, register it");
        assert_eq!(state.messages[0].status, MessageStatus::Delivered);
        assert_eq!(state.messages[1].text, "On it.");
    }

    #[tokio::test]
    async fn redirect_button_returns_mapped_route_without_network() {
        let (controller, api) = controller_with(MockChatApi::ok(text_response("unused")));

        let button = MessageButton {
            text: "Open the standards library".to_string(),
            action: ButtonAction::Redirect,
            value: Some("standards".to_string()),
            info: None,
        };
        let route = controller.click_button(&button).await.unwrap();

        assert_eq!(route.as_deref(), Some("/standards"));
        assert_eq!(api.total_calls(), 0);
        let state = controller.state().await;
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].status, MessageStatus::Delivered);
    }

    #[tokio::test]
    async fn info_button_appends_local_bot_message() {
        let (controller, api) = controller_with(MockChatApi::ok(text_response("unused")));

        let button = MessageButton {
            text: "Opening hours".to_string(),
            action: ButtonAction::Info,
            value: None,
            info: Some("We are available weekdays 8:00-18:00.".to_string()),
        };
        controller.click_button(&button).await.unwrap();

        assert_eq!(api.total_calls(), 0);
        let state = controller.state().await;
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].sender, MessageSender::Bot);
        assert_eq!(state.messages[1].text, "We are available weekdays 8:00-18:00.");
    }

    #[tokio::test]
    async fn end_session_clears_session_and_messages_together() {
        let storage = Arc::new(MemoryStorage::new());
        let api = Arc::new(MockChatApi::ok(text_response("Hi")));
        let controller = ConversationController::new(api, storage.clone(), true);

        controller.send_message("Hello").await.unwrap();
        controller.end_session().await;

        let state = controller.state().await;
        assert!(state.session.is_none());
        assert!(state.messages.is_empty());
        assert!(storage.load_session().await.is_none());
        assert!(storage.load_messages().await.is_empty());
    }

    #[tokio::test]
    async fn state_round_trips_through_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let api = Arc::new(MockChatApi::ok(text_response("Hi there!")));

        let controller = ConversationController::new(api.clone(), storage.clone(), true);
        controller.init().await.unwrap();
        controller.send_message("Hello").await.unwrap();
        let original = controller.state().await;

        let restored_controller = ConversationController::new(api, storage, true);
        restored_controller.init().await.unwrap();
        let restored = restored_controller.state().await;

        assert_eq!(restored.messages.len(), original.messages.len());
        assert_eq!(
            restored.session.as_ref().map(|s| &s.session_id),
            original.session.as_ref().map(|s| &s.session_id)
        );
        assert_eq!(
            restored.session.as_ref().map(|s| s.created_at),
            original.session.as_ref().map(|s| s.created_at)
        );
    }

    #[tokio::test]
    async fn handle_intent_appends_only_a_bot_message() {
        let (controller, api) = controller_with(MockChatApi::ok(text_response("Welcome!")));

        controller.handle_intent("greeting", None).await.unwrap();

        assert_eq!(api.intent_calls.load(Ordering::SeqCst), 1);
        let state = controller.state().await;
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].sender, MessageSender::Bot);
    }

    #[tokio::test]
    async fn health_probe_updates_connection_status() {
        let (controller, _api) = controller_with(MockChatApi::ok(text_response("unused")));

        controller.check_health().await.unwrap();
        assert_eq!(
            controller.state().await.connection_status,
            ConnectionStatus::Connected
        );
    }

    #[test]
    fn routes_are_mapped_for_known_targets() {
        assert_eq!(route_for(Some("standards")), "/standards");
        assert_eq!(route_for(Some("upload")), "/documents/upload");
        assert_eq!(route_for(Some("/custom/path")), "/custom/path");
        assert_eq!(route_for(None), "/");
    }
}
