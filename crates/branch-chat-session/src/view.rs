//! Chat view state for one conversation.
//!
//! `ChatView` owns the displayed message list, the quote context, the live
//! snapshot of a streaming reply and the single active turn. It is driven by
//! the UI task: user actions call its methods, and every [`TurnEvent`] the
//! UI receives is fed back through [`ChatView::handle_turn_event`].

use std::sync::Arc;

use branch_chat_api::ChatApi;
use branch_chat_core::wire::CreateMessageRequest;
use branch_chat_core::{
    AgenticMode, ConversationDetails, ConversationPathEntry, Message, MessageId, QuoteContext,
    QuoteKind, StreamSnapshot, Submission, ViewContext,
};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::turn::{spawn_turn, TurnEvent, TurnHandle, TurnId};

/// What a call to [`ChatView::submit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input, or a turn is already running.
    Ignored,
    /// A turn was started.
    Streaming(TurnId),
    /// A thread was created; the caller should open it.
    Navigate(ViewContext),
}

/// State of one chat view.
pub struct ChatView {
    api: Arc<dyn ChatApi>,
    events: mpsc::Sender<TurnEvent>,
    context: ViewContext,
    messages: Vec<Message>,
    path: Vec<ConversationPathEntry>,
    quote: QuoteContext,
    live: StreamSnapshot,
    submitting: bool,
    active: Option<TurnHandle>,
    next_turn: TurnId,
    bootstrapped: bool,
    last_error: Option<String>,
}

impl ChatView {
    /// Create an empty view for `context`.
    ///
    /// Turn events are sent on `events`; the caller must pass every received
    /// event back to [`ChatView::handle_turn_event`].
    #[must_use]
    pub fn new(
        api: Arc<dyn ChatApi>,
        events: mpsc::Sender<TurnEvent>,
        context: ViewContext,
    ) -> Self {
        Self {
            api,
            events,
            context,
            messages: Vec::new(),
            path: Vec::new(),
            quote: QuoteContext::default(),
            live: StreamSnapshot::default(),
            submitting: false,
            active: None,
            next_turn: TurnId::new(1),
            bootstrapped: false,
            last_error: None,
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Show another conversation.
    ///
    /// Cancels any running turn and resets messages, quote and the bootstrap
    /// latch.
    pub fn navigate(&mut self, context: ViewContext, details: ConversationDetails) {
        if let Some(handle) = self.active.take() {
            handle.cancel();
        }
        tracing::debug!(
            conversation_id = %context.conversation_id,
            messages = details.messages.len(),
            "Opening conversation"
        );

        self.context = context;
        self.messages = details.messages;
        self.path = details.path;
        self.quote.close();
        self.live = StreamSnapshot::default();
        self.submitting = false;
        self.bootstrapped = false;
        self.last_error = None;
    }

    /// Stream the first reply of a freshly created conversation.
    ///
    /// Runs at most once per navigation, and only when the history is exactly
    /// one user message. Returns `true` if a turn was started.
    pub fn bootstrap(&mut self) -> bool {
        if self.bootstrapped || self.submitting {
            return false;
        }
        let [first] = self.messages.as_slice() else {
            return false;
        };
        if !first.is_user() {
            return false;
        }
        self.bootstrapped = true;

        let request = CreateMessageRequest {
            conversation_id: self.context.conversation_id,
            user_message: first.content.trim().to_string(),
            is_new_conversation: true,
            agentic_mode: self.context.agentic_mode.filter(AgenticMode::is_server_mode),
            prompt_mode: None,
            extra_data: None,
        };
        self.start_turn(request);
        true
    }

    // =========================================================================
    // Turns
    // =========================================================================

    /// Submit user input against the active quote context.
    ///
    /// Blank input and input while a turn runs are ignored. For a pending new
    /// thread this creates the conversation and returns where to navigate;
    /// otherwise the user message is appended and a turn is started.
    ///
    /// # Errors
    ///
    /// Returns an error if creating a new thread fails. The quote and the
    /// message list are left untouched in that case.
    pub async fn submit(
        &mut self,
        text: &str,
        agentic_mode: Option<AgenticMode>,
    ) -> Result<SubmitOutcome> {
        let text = text.trim();
        if text.is_empty() || self.submitting {
            return Ok(SubmitOutcome::Ignored);
        }

        let submission = self
            .quote
            .plan(self.context.conversation_id, text, agentic_mode, &self.messages);

        match submission {
            Submission::Continue {
                request,
                user_message,
            } => {
                self.messages.push(user_message);
                Ok(SubmitOutcome::Streaming(self.start_turn(request)))
            }
            Submission::NewThread {
                request,
                agentic_mode,
            } => {
                self.submitting = true;
                let created = self.api.create_conversation(&request).await;
                self.submitting = false;

                let conversation = created.inspect_err(|e| {
                    tracing::error!(error = %e, "Failed to create thread");
                })?;
                self.quote.close();
                self.messages.clear();
                Ok(SubmitOutcome::Navigate(
                    ViewContext::new(conversation.id).with_agentic_mode(agentic_mode),
                ))
            }
        }
    }

    fn start_turn(&mut self, request: CreateMessageRequest) -> TurnId {
        let id = self.next_turn;
        self.next_turn = id.next();
        self.submitting = true;
        self.live = StreamSnapshot::default();
        self.last_error = None;
        self.active = Some(spawn_turn(
            Arc::clone(&self.api),
            id,
            request,
            self.events.clone(),
        ));
        id
    }

    /// Stop the running turn.
    ///
    /// Clears the live text and the submitting flag immediately. The stopped
    /// turn appends no assistant message. Returns `true` if a turn was running.
    pub fn stop(&mut self) -> bool {
        let stopped = match self.active.take() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        };
        self.live = StreamSnapshot::default();
        self.submitting = false;
        stopped
    }

    /// Apply an event from a turn task.
    ///
    /// Events of turns that are no longer active are dropped. Returns `true`
    /// if the view changed and should be redrawn.
    pub fn handle_turn_event(&mut self, event: TurnEvent) -> bool {
        if self.active_turn() != Some(event.turn()) {
            tracing::trace!(turn = %event.turn(), "Dropping event of inactive turn");
            return false;
        }

        match event {
            TurnEvent::Snapshot { snapshot, .. } => {
                self.live = snapshot;
            }
            TurnEvent::Finished { outcome, .. } => {
                self.active = None;
                self.submitting = false;
                self.live = StreamSnapshot::default();
                self.last_error = outcome.error.map(|e| e.to_string());
                self.messages.push(Message::assistant(
                    self.context.conversation_id,
                    outcome.message_id,
                    outcome.content,
                    outcome.reasoning,
                ));
            }
        }
        true
    }

    // =========================================================================
    // Quotes
    // =========================================================================

    /// Start or extend a quote on a displayed message.
    ///
    /// Returns `false` if no displayed message has `message_id`.
    pub fn start_quote(
        &mut self,
        message_id: MessageId,
        kind: QuoteKind,
        excerpt: Option<String>,
    ) -> bool {
        let Some(message) = self.messages.iter().find(|m| m.id() == message_id) else {
            return false;
        };
        self.quote.start_quote(message, kind, excerpt);
        true
    }

    /// Drop any active quote.
    pub fn close_quote(&mut self) {
        self.quote.close();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Context the view was opened with.
    #[must_use]
    pub const fn context(&self) -> &ViewContext {
        &self.context
    }

    /// Displayed messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Ancestry path of the conversation, root first.
    #[must_use]
    pub fn path(&self) -> &[ConversationPathEntry] {
        &self.path
    }

    /// Active quote context.
    #[must_use]
    pub const fn quote(&self) -> &QuoteContext {
        &self.quote
    }

    /// Live answer text of the running turn.
    #[must_use]
    pub fn live_content(&self) -> &str {
        &self.live.content
    }

    /// Live reasoning text of the running turn.
    #[must_use]
    pub fn live_reasoning(&self) -> &str {
        &self.live.reasoning
    }

    /// Check if a turn or a thread creation is in progress.
    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Id of the running turn.
    #[must_use]
    pub fn active_turn(&self) -> Option<TurnId> {
        self.active.as_ref().map(TurnHandle::id)
    }

    /// Error that ended the last turn, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
