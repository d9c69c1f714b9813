//! HTTP client for the backend REST boundary.
//!
//! `HttpChatApi` is the only component in the workspace that performs
//! network I/O. Transport failures and non-2xx responses are mapped to
//! `CarebotError::Transport`; nothing here panics.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use carebot_core::error::{CarebotError, Result};
use carebot_core::quick_action::QuickAction;

use crate::config::ApiConfig;
use crate::protocol::{
    DetectIntentRequest, HandleIntentRequest, HealthResponse, IntentResponse, MessageRequest,
    MessageResponse, QuickActionsResponse,
};

/// Async seam over the backend chat API.
///
/// Implemented by `HttpChatApi` in production and by in-memory mocks in
/// tests, so the conversation controller can be exercised without a network.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `POST /chatbot/message/`
    async fn send_message(&self, request: &MessageRequest) -> Result<MessageResponse>;

    /// `POST /chatbot/handle-intent/`
    async fn handle_intent(&self, request: &HandleIntentRequest) -> Result<MessageResponse>;

    /// `POST /chatbot/intent/`
    async fn detect_intent(&self, message: &str) -> Result<IntentResponse>;

    /// `GET /chatbot/quick-actions/`
    async fn quick_actions(&self) -> Result<Vec<QuickAction>>;

    /// `GET /chatbot/health/`
    async fn health(&self) -> Result<HealthResponse>;
}

/// Reqwest-backed implementation of [`ChatApi`].
#[derive(Clone)]
pub struct HttpChatApi {
    client: Client,
    config: ApiConfig,
}

impl HttpChatApi {
    /// Creates a client with the request timeout taken from the config.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.default_timeout)
            .build()
            .map_err(|err| CarebotError::transport(format!("failed to build client: {err}")))?;
        Ok(Self { client, config })
    }

    /// Creates a client against the environment-configured backend.
    pub fn from_env() -> Result<Self> {
        Self::new(ApiConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, timeout: Duration, body: &B) -> Result<T>
    where
        B: serde::Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(map_request_error)?;
        parse_response(path, response).await
    }

    async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(map_request_error)?;
        parse_response(path, response).await
    }
}

fn map_request_error(err: reqwest::Error) -> CarebotError {
    if err.is_timeout() {
        CarebotError::transport(format!("request timed out: {err}"))
    } else {
        CarebotError::transport(format!("request failed: {err}"))
    }
}

async fn parse_response<T>(path: &str, response: reqwest::Response) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error body".to_string());
        tracing::warn!(%status, path, "backend returned an error response");
        return Err(CarebotError::transport(format!(
            "{path} returned {status}: {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|err| CarebotError::transport(format!("failed to parse {path} response: {err}")))
}

#[async_trait]
impl ChatApi for HttpChatApi {
    // Message and intent exchanges run AI generation server-side, so they
    // carry the longer generate timeout as a per-request override.
    async fn send_message(&self, request: &MessageRequest) -> Result<MessageResponse> {
        self.post_json("/chatbot/message/", self.config.generate_timeout, request)
            .await
    }

    async fn handle_intent(&self, request: &HandleIntentRequest) -> Result<MessageResponse> {
        self.post_json(
            "/chatbot/handle-intent/",
            self.config.generate_timeout,
            request,
        )
        .await
    }

    async fn detect_intent(&self, message: &str) -> Result<IntentResponse> {
        let request = DetectIntentRequest {
            message: message.to_string(),
        };
        self.post_json("/chatbot/intent/", self.config.default_timeout, &request)
            .await
    }

    async fn quick_actions(&self) -> Result<Vec<QuickAction>> {
        let response: QuickActionsResponse = self.get_json("/chatbot/quick-actions/").await?;
        Ok(response
            .quick_actions
            .into_iter()
            .map(QuickAction::from)
            .collect())
    }

    async fn health(&self) -> Result<HealthResponse> {
        self.get_json("/chatbot/health/").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let api = HttpChatApi::new(
            ApiConfig::default().with_base_url("http://localhost:8000/api/"),
        )
        .unwrap();
        assert_eq!(
            api.url("/chatbot/message/"),
            "http://localhost:8000/api/chatbot/message/"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_maps_to_transport_error() {
        // Port 9 (discard) is a safe dead endpoint for a connection failure.
        let api = HttpChatApi::new(
            ApiConfig::default()
                .with_base_url("http://127.0.0.1:9")
                .with_default_timeout(std::time::Duration::from_millis(250)),
        )
        .unwrap();

        let err = api.health().await.unwrap_err();
        assert!(err.is_transport());
    }
}
