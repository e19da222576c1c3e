//! Conversation and message types shared by the client crates.
//!
//! These types mirror the records returned by the conversation service.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{ConversationId, MessageId};

// =============================================================================
// Enumerations
// =============================================================================

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Typed by the person using the client.
    User,
    /// Produced by the model.
    Assistant,
}

impl Role {
    /// Wire string for this role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Agent workflow the backend should run for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgenticMode {
    /// Step-by-step reasoning prompt.
    #[serde(rename = "cot")]
    ChainOfThought,
    /// Multiple reasoning paths with an evaluator.
    #[serde(rename = "tot")]
    TreeOfThoughts,
    /// Worked-examples prompt.
    #[serde(rename = "few_shot")]
    FewShot,
    /// Reasoning model with a visible summary.
    #[serde(rename = "think_longer")]
    ThinkLonger,
    /// Multi-agent research pipeline.
    #[serde(rename = "deep_research")]
    DeepResearch,
}

impl AgenticMode {
    /// Every mode, in selector order.
    pub const ALL: [Self; 5] = [
        Self::ChainOfThought,
        Self::TreeOfThoughts,
        Self::FewShot,
        Self::ThinkLonger,
        Self::DeepResearch,
    ];

    /// Wire tag, also used as the `agentic_mode` route parameter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ChainOfThought => "cot",
            Self::TreeOfThoughts => "tot",
            Self::FewShot => "few_shot",
            Self::ThinkLonger => "think_longer",
            Self::DeepResearch => "deep_research",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ChainOfThought => "Chain-of-Thought",
            Self::TreeOfThoughts => "Tree of thoughts",
            Self::FewShot => "Few shot",
            Self::ThinkLonger => "Think",
            Self::DeepResearch => "Deep research",
        }
    }

    /// Instruction prefixed to the user's text for prompt-technique modes.
    #[must_use]
    pub const fn prompt_template(&self) -> Option<&'static str> {
        match self {
            Self::ChainOfThought => Some(
                "For the below query, I want you to break down your reasoning into smaller steps before reaching the conclusion. Here is the query:\n",
            ),
            Self::TreeOfThoughts => Some(
                "For the below query, please generate multiple reasoning paths, explore their possibilities, then select the best final solution. Show your reasoning as a tree of thought. Here is the query:\n",
            ),
            Self::FewShot => Some("Few shot"),
            Self::ThinkLonger | Self::DeepResearch => None,
        }
    }

    /// Check if the backend runs a workflow for this mode.
    ///
    /// `few_shot` only shapes the prompt text and is never sent.
    #[must_use]
    pub const fn is_server_mode(&self) -> bool {
        !matches!(self, Self::FewShot)
    }

    /// Cycle through `None` and every mode, for a single-key selector.
    #[must_use]
    pub fn cycle(current: Option<Self>) -> Option<Self> {
        match current {
            None => Some(Self::ALL[0]),
            Some(mode) => {
                let idx = Self::ALL.iter().position(|m| *m == mode).unwrap_or(0);
                Self::ALL.get(idx + 1).copied()
            }
        }
    }
}

impl fmt::Display for AgenticMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgenticMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| CoreError::UnknownAgenticMode(s.to_string()))
    }
}

/// How the backend should frame the user's message against earlier context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Reply to an excerpt of one message.
    Reply,
    /// Answer using a hand-picked set of messages.
    Select,
    /// First message of a thread forked from another conversation.
    NewThread,
}

// =============================================================================
// Model Settings
// =============================================================================

/// Model choice attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSettings {
    /// One model for the whole turn.
    Single {
        /// Provider-qualified model name.
        model: String,
    },
    /// Named sub-agent roles mapped to models.
    Agents(BTreeMap<String, String>),
}

impl ModelSettings {
    const DEFAULT_MODEL: &'static str = "openai/gpt-4o-mini";

    /// Settings used when the user has not picked any for the given mode.
    #[must_use]
    pub fn defaults_for(mode: Option<AgenticMode>) -> Self {
        let agents = |roles: &[&str]| {
            Self::Agents(
                roles
                    .iter()
                    .map(|role| ((*role).to_string(), Self::DEFAULT_MODEL.to_string()))
                    .collect(),
            )
        };

        match mode {
            Some(AgenticMode::DeepResearch) => agents(&[
                "triage_agent_model",
                "clarifying_agent_model",
                "research_instruction_agent_model",
                "research_agent_model",
            ]),
            Some(AgenticMode::TreeOfThoughts) => agents(&[
                "reasoner_agent_model",
                "evaluator_agent_model",
                "executioner_agent_model",
            ]),
            Some(AgenticMode::ThinkLonger) => Self::Single {
                model: "deepseek/deepseek-reasoner".to_string(),
            },
            Some(AgenticMode::ChainOfThought | AgenticMode::FewShot) | None => Self::Single {
                model: Self::DEFAULT_MODEL.to_string(),
            },
        }
    }
}

impl fmt::Display for ModelSettings {
    /// `model`, or `N agents: model, ...` with each model listed once.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single { model } => f.write_str(model),
            Self::Agents(roles) => {
                let models: BTreeSet<&str> = roles.values().map(String::as_str).collect();
                let models: Vec<&str> = models.into_iter().collect();
                write!(f, "{} agents: {}", roles.len(), models.join(", "))
            }
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A conversation forked from a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildConversation {
    /// Conversation id of the fork.
    pub id: ConversationId,
    /// Conversation name.
    #[serde(default)]
    pub name: String,
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    role: Role,
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Reasoning summary streamed before the answer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_summary: Option<String>,
    /// Workflow used to produce the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agentic_mode: Option<AgenticMode>,
    /// Models used to produce the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_settings: Option<ModelSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    referred_message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    referred_message_content: Option<String>,
    /// Threads forked from this message.
    #[serde(default)]
    pub child_conversations: Vec<ChildConversation>,
    /// Number of threads forked from this message.
    #[serde(default)]
    pub num_of_children: u32,
    /// Creation timestamp.
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Message {
    fn local(
        id: MessageId,
        conversation_id: ConversationId,
        role: Role,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation_id,
            role,
            content: content.into(),
            reasoning_summary: None,
            agentic_mode: None,
            model_settings: None,
            referred_message_id: None,
            referred_message_content: None,
            child_conversations: Vec::new(),
            num_of_children: 0,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Create a user message with a provisional id.
    #[must_use]
    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self::local(MessageId::provisional(), conversation_id, Role::User, content)
    }

    /// Create a user message replying to an excerpt of another message.
    #[must_use]
    pub fn user_reply(
        conversation_id: ConversationId,
        content: impl Into<String>,
        referred_message_id: MessageId,
        excerpt: impl Into<String>,
    ) -> Self {
        let mut message = Self::user(conversation_id, content);
        message.referred_message_id = Some(referred_message_id);
        message.referred_message_content = Some(excerpt.into());
        message
    }

    /// Create a finalized assistant message.
    ///
    /// Falls back to a provisional id when the server never reported one.
    #[must_use]
    pub fn assistant(
        conversation_id: ConversationId,
        id: Option<MessageId>,
        content: impl Into<String>,
        reasoning_summary: impl Into<String>,
    ) -> Self {
        let mut message = Self::local(
            id.unwrap_or_else(MessageId::provisional),
            conversation_id,
            Role::Assistant,
            content,
        );
        let reasoning = reasoning_summary.into();
        message.reasoning_summary = (!reasoning.is_empty()).then_some(reasoning);
        message
    }

    /// Message id.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Message author.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Check if this is a user message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// The message and excerpt this message replies to, if any.
    #[must_use]
    pub fn referred(&self) -> Option<(MessageId, &str)> {
        let id = self.referred_message_id?;
        Some((id, self.referred_message_content.as_deref().unwrap_or("")))
    }
}

// =============================================================================
// Conversations
// =============================================================================

/// A conversation (root thread or fork).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id.
    pub id: ConversationId,
    /// Short summary name generated by the backend.
    #[serde(default)]
    pub name: String,
    /// Message this conversation was forked from; `None` for roots.
    #[serde(default)]
    pub message_id: Option<MessageId>,
    /// Creation timestamp.
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Check if this conversation is a fork of another one.
    #[must_use]
    pub fn is_thread(&self) -> bool {
        self.message_id.is_some()
    }
}

/// One hop in the ancestry of a conversation, root first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPathEntry {
    /// Conversation id.
    pub id: ConversationId,
    /// Conversation name.
    #[serde(default)]
    pub name: String,
    /// Message in the parent this conversation was forked from.
    #[serde(default)]
    pub message_id: Option<MessageId>,
}

/// Messages and ancestry of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetails {
    /// Messages in display order (oldest first).
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Ancestry path, root first, ending with this conversation.
    #[serde(default)]
    pub path: Vec<ConversationPathEntry>,
}

// =============================================================================
// Timestamps
// =============================================================================

mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    /// Accept RFC 3339 or naive ISO-8601 (read as UTC); anything else is `None`.
    pub fn lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }

    pub fn parse(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }
}

// =============================================================================
// Tests
// =============================================================================
