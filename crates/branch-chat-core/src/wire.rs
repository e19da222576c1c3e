//! Request and response bodies for the conversation service.
//!
//! Every JSON response is wrapped in an `{code, data}` envelope; the streaming
//! endpoint answers with newline-delimited records instead (see
//! [`crate::stream`]).

use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId};
use crate::types::{AgenticMode, Conversation, Message, PromptMode, Role};

/// Response envelope used by every JSON endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Application status code, `0` on success.
    #[serde(default)]
    pub code: i64,
    /// Endpoint payload.
    pub data: T,
}

// =============================================================================
// Conversations
// =============================================================================

/// Body of `POST /conversations/v1/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateConversationRequest {
    /// First user message of the conversation.
    pub first_msg: String,
    /// Message the new conversation forks from; `None` for a root.
    pub message_id: Option<MessageId>,
}

impl CreateConversationRequest {
    /// Build a request; `message_id` is `None` for a root conversation.
    #[must_use]
    pub fn new(first_msg: impl Into<String>, message_id: Option<MessageId>) -> Self {
        Self {
            first_msg: first_msg.into(),
            message_id,
        }
    }
}

/// Data of `POST /conversations/v1/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationData {
    /// The created conversation.
    pub conversation: Conversation,
}

/// Data of `POST /conversations/v1/getAll`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationListData {
    /// All conversations, newest first.
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

/// Body of `POST /conversations/v1/getDetails`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversationDetailsRequest {
    /// Conversation to load.
    pub id: ConversationId,
}

// =============================================================================
// Messages
// =============================================================================

/// Body of `POST /messages/v1/create`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateMessageRequest {
    /// Conversation the turn belongs to.
    pub conversation_id: ConversationId,
    /// Trimmed user text.
    pub user_message: String,
    /// Set for the bootstrap turn, when the backend already stored the user message.
    pub is_new_conversation: bool,
    /// Workflow to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agentic_mode: Option<AgenticMode>,
    /// How the quoted context frames the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_mode: Option<PromptMode>,
    /// Quoted context payload matching `prompt_mode`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<ExtraData>,
}

/// Quoted context attached to a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraData {
    /// Reply to an excerpt of one message.
    Reply {
        /// The full message being replied to.
        referred_message: Message,
        /// Excerpt the user highlighted.
        sub_str: String,
    },
    /// Answer against a set of messages.
    Select {
        /// Selected messages in display order.
        selected_messages: Vec<SelectedMessage>,
    },
}

impl ExtraData {
    /// Prompt mode this payload belongs to.
    #[must_use]
    pub const fn prompt_mode(&self) -> PromptMode {
        match self {
            Self::Reply { .. } => PromptMode::Reply,
            Self::Select { .. } => PromptMode::Select,
        }
    }
}

/// Trimmed-down message sent for a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedMessage {
    /// Message text.
    pub content: String,
    /// Message author.
    pub role: Role,
}

impl From<&Message> for SelectedMessage {
    fn from(message: &Message) -> Self {
        Self {
            content: message.content.clone(),
            role: message.role(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_message_request_omits_absent_fields() {
        let req = CreateMessageRequest {
            conversation_id: ConversationId::new(4),
            user_message: "hi".to_string(),
            is_new_conversation: false,
            agentic_mode: None,
            prompt_mode: None,
            extra_data: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["conversation_id"], 4);
        assert_eq!(json["is_new_conversation"], false);
        assert!(json.get("agentic_mode").is_none());
        assert!(json.get("extra_data").is_none());
    }

    #[test]
    fn reply_payload_shape() {
        let referred = Message::assistant(ConversationId::new(1), Some(MessageId::new(9)), "The sky is blue", "");
        let extra = ExtraData::Reply {
            referred_message: referred,
            sub_str: "sky".to_string(),
        };
        assert_eq!(extra.prompt_mode(), PromptMode::Reply);

        let json = serde_json::to_value(&extra).unwrap();
        assert_eq!(json["sub_str"], "sky");
        assert_eq!(json["referred_message"]["id"], 9);
        assert_eq!(json["referred_message"]["role"], "assistant");
    }

    #[test]
    fn select_payload_shape() {
        let extra = ExtraData::Select {
            selected_messages: vec![SelectedMessage {
                content: "a".to_string(),
                role: Role::User,
            }],
        };
        let json = serde_json::to_value(&extra).unwrap();
        assert_eq!(json["selected_messages"][0]["role"], "user");
        assert_eq!(json["selected_messages"][0]["content"], "a");
    }

    #[test]
    fn create_conversation_request_keeps_null_fork_point() {
        let json = serde_json::to_value(CreateConversationRequest::new("hello", None)).unwrap();
        assert_eq!(json["first_msg"], "hello");
        assert!(json["message_id"].is_null());
        assert_eq!(json.as_object().map(serde_json::Map::len), Some(2));
    }

    #[test]
    fn envelope_unwraps_data() {
        let json = r#"{"code": 0, "data": {"conversations": [{"id": 1, "name": "a"}]}}"#;
        let resp: ApiResponse<ConversationListData> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.code, 0);
        assert_eq!(resp.data.conversations.len(), 1);
    }
}
