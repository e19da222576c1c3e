//! Scripted in-memory `ChatApi` for session tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use branch_chat_api::{ApiError, ByteStream, ChatApi, Result};
use branch_chat_core::wire::{CreateConversationRequest, CreateMessageRequest};
use branch_chat_core::{Conversation, ConversationDetails, ConversationId};
use bytes::Bytes;
use futures::StreamExt;

/// Format one stream record line.
pub fn line(id: i64, kind: &str, content: &str) -> String {
    format!(r#"{{"message_id": {id}, "content": "{content}", "type": "{kind}"}}"#) + "\n"
}

/// How the next streamed message responds.
pub enum Script {
    /// Yield these chunks, then end.
    Chunks(Vec<String>),
    /// Never yield anything.
    Pending,
    /// Fail before the body starts with this status.
    Reject(u16),
}

impl Script {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(chunks.into_iter().map(Into::into).collect())
    }
}

#[derive(Default)]
pub struct ScriptedApi {
    streams: Mutex<VecDeque<Script>>,
    pub stream_requests: Mutex<Vec<CreateMessageRequest>>,
    pub created: Mutex<Vec<CreateConversationRequest>>,
    pub create_status: Mutex<Option<u16>>,
    pub details: Mutex<ConversationDetails>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self, script: Script) {
        self.streams.lock().unwrap().push_back(script);
    }

    pub fn fail_create(&self, status: u16) {
        *self.create_status.lock().unwrap() = Some(status);
    }

    pub fn last_stream_request(&self) -> CreateMessageRequest {
        self.stream_requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ChatApi for ScriptedApi {
    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<Conversation> {
        if let Some(status) = *self.create_status.lock().unwrap() {
            return Err(ApiError::Api {
                status,
                message: "create failed".to_string(),
            });
        }
        self.created.lock().unwrap().push(request.clone());
        Ok(Conversation {
            id: ConversationId::new(21),
            name: request.first_msg.clone(),
            message_id: request.message_id,
            created_at: None,
            updated_at: None,
        })
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        Ok(Vec::new())
    }

    async fn conversation_details(&self, _id: ConversationId) -> Result<ConversationDetails> {
        Ok(self.details.lock().unwrap().clone())
    }

    async fn create_streamed_message(&self, request: &CreateMessageRequest) -> Result<ByteStream> {
        self.stream_requests.lock().unwrap().push(request.clone());
        let script = self.streams.lock().unwrap().pop_front().unwrap_or(Script::Chunks(Vec::new()));
        match script {
            Script::Chunks(chunks) => Ok(futures::stream::iter(
                chunks.into_iter().map(|c| Ok(Bytes::from(c))),
            )
            .boxed()),
            Script::Pending => Ok(futures::stream::pending().boxed()),
            Script::Reject(status) => Err(ApiError::Api {
                status,
                message: "stream rejected".to_string(),
            }),
        }
    }
}
