//! Quote context: what the next submission attaches to.
//!
//! A user can quote one message to branch a new thread from it, reply to an
//! excerpt of it, or pick several messages to answer against. The active
//! context decides the shape of the next request via [`QuoteContext::plan`].

use std::collections::BTreeSet;

use crate::ids::{ConversationId, MessageId};
use crate::types::{AgenticMode, Message};
use crate::wire::{CreateConversationRequest, CreateMessageRequest, ExtraData, SelectedMessage};

/// Which kind of quote the user started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteKind {
    /// Fork a new conversation from the message.
    NewThread,
    /// Reply to an excerpt of the message.
    Reply,
    /// Toggle the message in the selection set.
    Select,
}

/// The active quote context.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum QuoteContext {
    /// Plain continuation.
    #[default]
    None,
    /// Next submission opens a new conversation forked from `message`.
    NewThread {
        /// The message to fork from.
        message: Message,
    },
    /// Next submission replies to `excerpt` of `message`.
    Reply {
        /// The message being replied to.
        message: Message,
        /// Highlighted part of the message.
        excerpt: String,
    },
    /// Next submission answers against the selected messages.
    Select {
        /// Selected message ids; never empty.
        ids: BTreeSet<MessageId>,
    },
}

/// What a submission turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Stream a reply in the current conversation.
    Continue {
        /// Body for `POST /messages/v1/create`.
        request: CreateMessageRequest,
        /// User message to append locally before the request is sent.
        user_message: Message,
    },
    /// Create a forked conversation and navigate to it.
    NewThread {
        /// Body for `POST /conversations/v1/create`.
        request: CreateConversationRequest,
        /// Mode to carry into the new conversation's view.
        agentic_mode: Option<AgenticMode>,
    },
}

impl QuoteContext {
    /// Start or extend a quote on `message`.
    ///
    /// `NewThread` and `Reply` replace whatever was active. `Select` toggles
    /// the message in the selection set; emptying the set closes the quote.
    /// A reply without an explicit excerpt quotes the whole message.
    pub fn start_quote(&mut self, message: &Message, kind: QuoteKind, excerpt: Option<String>) {
        *self = match kind {
            QuoteKind::NewThread => Self::NewThread {
                message: message.clone(),
            },
            QuoteKind::Reply => Self::Reply {
                message: message.clone(),
                excerpt: excerpt.unwrap_or_else(|| message.content.clone()),
            },
            QuoteKind::Select => {
                let mut ids = match std::mem::take(self) {
                    Self::Select { ids } => ids,
                    _ => BTreeSet::new(),
                };
                if !ids.remove(&message.id()) {
                    ids.insert(message.id());
                }
                if ids.is_empty() {
                    Self::None
                } else {
                    Self::Select { ids }
                }
            }
        };
    }

    /// Drop any active quote.
    pub fn close(&mut self) {
        *self = Self::None;
    }

    /// Kind of the active quote.
    #[must_use]
    pub const fn kind(&self) -> Option<QuoteKind> {
        match self {
            Self::None => None,
            Self::NewThread { .. } => Some(QuoteKind::NewThread),
            Self::Reply { .. } => Some(QuoteKind::Reply),
            Self::Select { .. } => Some(QuoteKind::Select),
        }
    }

    /// Check if no quote is active.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Check if `id` is in the selection set.
    #[must_use]
    pub fn is_selected(&self, id: MessageId) -> bool {
        matches!(self, Self::Select { ids } if ids.contains(&id))
    }

    /// The single quoted message, for `NewThread` and `Reply`.
    #[must_use]
    pub const fn quoted_message(&self) -> Option<&Message> {
        match self {
            Self::NewThread { message } | Self::Reply { message, .. } => Some(message),
            Self::None | Self::Select { .. } => None,
        }
    }

    /// Turn `text` into a submission against the active context.
    ///
    /// `text` must already be trimmed and non-empty. `messages` is the
    /// displayed list and fixes the order of selected messages. Every context
    /// except `NewThread` is reset here; a pending new thread stays active
    /// until the caller has created the conversation.
    pub fn plan(
        &mut self,
        conversation_id: ConversationId,
        text: &str,
        agentic_mode: Option<AgenticMode>,
        messages: &[Message],
    ) -> Submission {
        if let Self::NewThread { message } = self {
            return Submission::NewThread {
                request: CreateConversationRequest::new(text, Some(message.id())),
                agentic_mode,
            };
        }

        let (user_message, extra_data) = match std::mem::take(self) {
            Self::None | Self::NewThread { .. } => (Message::user(conversation_id, text), None),
            Self::Reply { message, excerpt } => (
                Message::user_reply(conversation_id, text, message.id(), excerpt.clone()),
                Some(ExtraData::Reply {
                    referred_message: message,
                    sub_str: excerpt,
                }),
            ),
            Self::Select { ids } => (
                Message::user(conversation_id, text),
                Some(ExtraData::Select {
                    selected_messages: messages
                        .iter()
                        .filter(|m| ids.contains(&m.id()))
                        .map(SelectedMessage::from)
                        .collect(),
                }),
            ),
        };

        let request = CreateMessageRequest {
            conversation_id,
            user_message: text.to_string(),
            is_new_conversation: false,
            agentic_mode: agentic_mode.filter(AgenticMode::is_server_mode),
            prompt_mode: extra_data.as_ref().map(ExtraData::prompt_mode),
            extra_data,
        };
        Submission::Continue {
            request,
            user_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PromptMode, Role};

    const CONV: ConversationId = ConversationId::new(1);

    fn msg(id: i64, content: &str) -> Message {
        Message::assistant(CONV, Some(MessageId::new(id)), content, "")
    }

    #[test]
    fn select_toggles_down_to_none() {
        let (m3, m7) = (msg(3, "three"), msg(7, "seven"));
        let mut quote = QuoteContext::default();

        quote.start_quote(&m3, QuoteKind::Select, None);
        quote.start_quote(&m7, QuoteKind::Select, None);
        assert!(quote.is_selected(MessageId::new(3)));
        assert!(quote.is_selected(MessageId::new(7)));

        quote.start_quote(&m3, QuoteKind::Select, None);
        assert_eq!(
            quote,
            QuoteContext::Select {
                ids: BTreeSet::from([MessageId::new(7)])
            }
        );

        quote.start_quote(&m7, QuoteKind::Select, None);
        assert!(quote.is_none());
    }

    #[test]
    fn reply_replaces_selection() {
        let mut quote = QuoteContext::default();
        quote.start_quote(&msg(3, "three"), QuoteKind::Select, None);
        quote.start_quote(&msg(4, "four"), QuoteKind::Reply, Some("fo".to_string()));
        assert_eq!(quote.kind(), Some(QuoteKind::Reply));
        assert!(!quote.is_selected(MessageId::new(3)));

        // Selecting after a reply starts from an empty set.
        quote.start_quote(&msg(5, "five"), QuoteKind::Select, None);
        assert_eq!(
            quote,
            QuoteContext::Select {
                ids: BTreeSet::from([MessageId::new(5)])
            }
        );
    }

    #[test]
    fn reply_without_excerpt_quotes_whole_message() {
        let mut quote = QuoteContext::default();
        quote.start_quote(&msg(4, "four"), QuoteKind::Reply, None);
        assert!(matches!(quote, QuoteContext::Reply { ref excerpt, .. } if excerpt == "four"));
    }

    #[test]
    fn plain_plan_has_no_prompt_mode() {
        let mut quote = QuoteContext::default();
        let Submission::Continue { request, user_message } =
            quote.plan(CONV, "hello", Some(AgenticMode::ThinkLonger), &[])
        else {
            panic!("expected continuation");
        };
        assert_eq!(request.prompt_mode, None);
        assert_eq!(request.agentic_mode, Some(AgenticMode::ThinkLonger));
        assert_eq!(user_message.content, "hello");
        assert_eq!(user_message.role(), Role::User);
    }

    #[test]
    fn prompt_only_mode_is_not_sent() {
        let mut quote = QuoteContext::default();
        let Submission::Continue { request, .. } =
            quote.plan(CONV, "hello", Some(AgenticMode::FewShot), &[])
        else {
            panic!("expected continuation");
        };
        assert_eq!(request.agentic_mode, None);
    }

    #[test]
    fn reply_plan_carries_reference_and_resets() {
        let mut quote = QuoteContext::default();
        quote.start_quote(&msg(9, "The sky is blue"), QuoteKind::Reply, Some("sky".to_string()));

        let Submission::Continue { request, user_message } = quote.plan(CONV, "why?", None, &[]) else {
            panic!("expected continuation");
        };
        assert!(quote.is_none());
        assert_eq!(request.prompt_mode, Some(PromptMode::Reply));
        assert_eq!(user_message.referred(), Some((MessageId::new(9), "sky")));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt_mode"], "reply");
        assert_eq!(json["extra_data"]["sub_str"], "sky");
        assert_eq!(json["extra_data"]["referred_message"]["id"], 9);
    }

    #[test]
    fn select_plan_follows_display_order() {
        let messages = vec![msg(1, "first"), msg(2, "second"), msg(3, "third")];
        let mut quote = QuoteContext::default();
        quote.start_quote(&messages[2], QuoteKind::Select, None);
        quote.start_quote(&messages[0], QuoteKind::Select, None);

        let Submission::Continue { request, .. } = quote.plan(CONV, "compare", None, &messages) else {
            panic!("expected continuation");
        };
        assert!(quote.is_none());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt_mode"], "select");
        let selected = json["extra_data"]["selected_messages"].as_array().unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0]["content"], "first");
        assert_eq!(selected[1]["content"], "third");
    }

    #[test]
    fn new_thread_plan_keeps_quote() {
        let mut quote = QuoteContext::default();
        quote.start_quote(&msg(14, "fork me"), QuoteKind::NewThread, None);

        let submission = quote.plan(CONV, "branch", Some(AgenticMode::DeepResearch), &[]);
        assert_eq!(
            submission,
            Submission::NewThread {
                request: CreateConversationRequest::new("branch", Some(MessageId::new(14))),
                agentic_mode: Some(AgenticMode::DeepResearch),
            }
        );
        assert_eq!(quote.kind(), Some(QuoteKind::NewThread));
        assert_eq!(quote.quoted_message().map(Message::id), Some(MessageId::new(14)));
    }
}
