//! HTTP client for the conversation service.
//!
//! [`ChatApi`] is the seam the session layer talks to; [`HttpChatApi`] is the
//! `reqwest` implementation used by the terminal client.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use branch_chat_core::wire::{
    ApiResponse, ConversationDetailsRequest, ConversationListData, CreateConversationData,
    CreateConversationRequest, CreateMessageRequest,
};
use branch_chat_core::{Conversation, ConversationDetails, ConversationId};

use crate::config::ApiConfig;
use crate::error::{ApiError, Result};

/// Raw body of a streamed reply, one transport chunk per item.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Operations offered by the conversation service.
///
/// This trait abstracts the HTTP client, allowing for scripted
/// implementations in tests.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Create a conversation, optionally forked from a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    async fn create_conversation(&self, request: &CreateConversationRequest)
        -> Result<Conversation>;

    /// List every conversation, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Load the messages and ancestry path of a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the conversation is unknown.
    async fn conversation_details(&self, id: ConversationId) -> Result<ConversationDetails>;

    /// Start a turn and return the reply body as it arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service answers with a
    /// non-success status. Failures after the body has started are reported
    /// as items of the returned stream.
    async fn create_streamed_message(&self, request: &CreateMessageRequest) -> Result<ByteStream>;
}

/// Error body produced by the service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// `reqwest`-backed [`ChatApi`].
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: String,
    request_timeout: std::time::Duration,
}

impl HttpChatApi {
    /// Create a client from configuration.
    ///
    /// Only the connect timeout is set on the client itself; the request
    /// timeout is applied per call so streamed replies are never cut off.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client with a custom `reqwest` client.
    #[must_use]
    pub fn with_client(client: Client, config: &ApiConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Get the base URL of the service.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Handle API error responses.
    async fn handle_error(response: Response) -> ApiError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(ErrorBody {
                message: Some(message),
                ..
            }) => message,
            Ok(ErrorBody {
                detail: Some(serde_json::Value::String(detail)),
                ..
            }) => detail,
            Ok(ErrorBody {
                detail: Some(detail),
                ..
            }) => detail.to_string(),
            _ if !text.trim().is_empty() => text.trim().to_string(),
            _ => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        };
        ApiError::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Send a JSON request and unwrap the `{code, data}` envelope.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.timeout(self.request_timeout).send().await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        if body.code != 0 {
            tracing::warn!(code = body.code, "Service returned non-zero code");
        }
        Ok(body.data)
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<Conversation> {
        let url = self.endpoint("/conversations/v1/create");
        let data: CreateConversationData = self.call(self.client.post(&url).json(request)).await?;

        tracing::debug!(
            conversation_id = %data.conversation.id,
            forked_from = ?request.message_id,
            "Created conversation"
        );
        Ok(data.conversation)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let url = self.endpoint("/conversations/v1/getAll");
        let data: ConversationListData = self.call(self.client.post(&url)).await?;
        Ok(data.conversations)
    }

    async fn conversation_details(&self, id: ConversationId) -> Result<ConversationDetails> {
        let url = self.endpoint("/conversations/v1/getDetails");
        let request = ConversationDetailsRequest { id };
        self.call(self.client.post(&url).json(&request)).await
    }

    async fn create_streamed_message(&self, request: &CreateMessageRequest) -> Result<ByteStream> {
        let url = self.endpoint("/messages/v1/create");

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let err = Self::handle_error(response).await;
            tracing::error!(
                conversation_id = %request.conversation_id,
                error = %err,
                "Failed to start streamed message"
            );
            return Err(err);
        }

        tracing::debug!(
            conversation_id = %request.conversation_id,
            prompt_mode = ?request.prompt_mode,
            agentic_mode = ?request.agentic_mode,
            "Streaming message"
        );

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let api = HttpChatApi::new(&ApiConfig::with_base_url("http://localhost:8000/")).unwrap();
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(
            api.endpoint("/messages/v1/create"),
            "http://localhost:8000/messages/v1/create"
        );
    }
}
