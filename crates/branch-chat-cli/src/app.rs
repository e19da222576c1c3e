//! Application state management.
//!
//! `App` wraps a [`ChatView`] with everything the terminal needs around it:
//! the conversation list, a message cursor for quoting, the input line and
//! dialog modes. Streaming text reaches the screen through
//! [`App::handle_turn_event`].

use std::sync::Arc;
use std::time::Duration;

use branch_chat_api::{ApiError, ChatApi};
use branch_chat_core::wire::CreateConversationRequest;
use branch_chat_core::{
    AgenticMode, Conversation, Message, ModelSettings, QuoteKind, ViewContext,
};
use branch_chat_session::{ChatView, SubmitOutcome, TurnEvent};
use tokio::sync::mpsc;

/// Refresh interval for the conversation list.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Which UI column has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    /// Left column: conversation list.
    Conversations,
    /// Right column: chat and input.
    #[default]
    Chat,
}

impl Focus {
    /// Toggle to the other column.
    #[must_use]
    pub const fn toggle(self) -> Self {
        match self {
            Self::Conversations => Self::Chat,
            Self::Chat => Self::Conversations,
        }
    }
}

/// Input mode for dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Chat input.
    #[default]
    Normal,
    /// Editing the excerpt of a reply quote.
    EditingExcerpt,
    /// Typing the first message of a new root conversation.
    NewConversation,
}

/// Application state.
pub struct App {
    api: Arc<dyn ChatApi>,
    base_url: String,
    /// State of the open conversation.
    pub view: ChatView,
    /// Whether a conversation has been opened.
    pub has_conversation: bool,
    /// All conversations, newest first.
    pub conversations: Vec<Conversation>,
    /// Highlighted conversation index.
    pub selected_conversation: Option<usize>,
    /// Highlighted message index in the open conversation.
    pub message_cursor: Option<usize>,
    /// Mode used for the next submission.
    pub agentic_mode: Option<AgenticMode>,
    /// Current input buffer.
    pub input: String,
    /// Cursor position in input, in characters.
    pub cursor_position: usize,
    /// Which panel has focus.
    pub focus: Focus,
    /// Current input mode.
    pub input_mode: InputMode,
    /// Single-key command mode (entered with Esc).
    pub command_mode: bool,
    /// Chat scroll offset from the bottom.
    pub chat_scroll: usize,
    /// Status message to display.
    pub status_message: Option<String>,
    /// Error message to display.
    pub error_message: Option<String>,
    /// Last refresh error to display.
    pub refresh_error: Option<String>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Animation frame counter for loading indicators.
    pub animation_frame: usize,
    /// Saved chat input when entering a dialog mode.
    saved_chat_input: Option<(String, usize)>,
}

impl App {
    /// Create a new application.
    ///
    /// Turn events of the chat view are delivered on `events`.
    #[must_use]
    pub fn new(
        api: Arc<dyn ChatApi>,
        base_url: impl Into<String>,
        events: mpsc::Sender<TurnEvent>,
        agentic_mode: Option<AgenticMode>,
    ) -> Self {
        // Placeholder context until the first conversation is opened.
        let context = ViewContext::new(branch_chat_core::ConversationId::new(0));
        Self {
            view: ChatView::new(Arc::clone(&api), events, context),
            api,
            base_url: base_url.into(),
            has_conversation: false,
            conversations: Vec::new(),
            selected_conversation: None,
            message_cursor: None,
            agentic_mode,
            input: String::new(),
            cursor_position: 0,
            focus: Focus::Chat,
            input_mode: InputMode::Normal,
            command_mode: false,
            chat_scroll: 0,
            status_message: None,
            error_message: None,
            refresh_error: None,
            should_quit: false,
            animation_frame: 0,
            saved_chat_input: None,
        }
    }

    /// Enter a dialog mode, saving the current chat input.
    ///
    /// The dialog starts with `prefill` as its input.
    pub fn enter_dialog_mode(&mut self, mode: InputMode, prefill: &str) {
        self.saved_chat_input = Some((std::mem::take(&mut self.input), self.cursor_position));
        self.input = prefill.to_string();
        self.cursor_position = self.input.chars().count();
        self.input_mode = mode;
    }

    /// Exit dialog mode, restoring the saved chat input.
    pub fn exit_dialog_mode(&mut self) {
        self.input_mode = InputMode::Normal;
        if let Some((input, cursor)) = self.saved_chat_input.take() {
            self.input = input;
            self.cursor_position = cursor;
        } else {
            self.clear_input();
        }
    }

    /// Tick the animation frame (call on each render).
    pub fn tick_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Get current spinner character for loading animation.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Get the API URL for display.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.base_url
    }

    /// Set the status message (also clears any error).
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.error_message = None;
    }

    /// Set the error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// Clear the error message.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// Check if UI needs high-frequency redraws (during streaming).
    #[must_use]
    pub fn needs_immediate_redraw(&self) -> bool {
        self.view.is_submitting()
    }

    /// Cycle the agentic mode for the next submission.
    ///
    /// The status line shows the models the service uses by default.
    pub fn cycle_agentic_mode(&mut self) {
        self.agentic_mode = AgenticMode::cycle(self.agentic_mode);
        let label = self.agentic_mode.map_or("Default", |m| m.label());
        let models = ModelSettings::defaults_for(self.agentic_mode);
        self.set_status(format!("Mode: {label} ({models})"));
    }

    // =========================================================================
    // Conversation List
    // =========================================================================

    /// Move selection up in the conversation list.
    pub fn select_prev_conversation(&mut self) {
        if self.conversations.is_empty() {
            return;
        }
        self.selected_conversation = Some(match self.selected_conversation {
            Some(0) | None => self.conversations.len() - 1,
            Some(i) => i - 1,
        });
    }

    /// Move selection down in the conversation list.
    pub fn select_next_conversation(&mut self) {
        if self.conversations.is_empty() {
            return;
        }
        self.selected_conversation = Some(match self.selected_conversation {
            Some(i) if i + 1 < self.conversations.len() => i + 1,
            _ => 0,
        });
    }

    /// Get the highlighted conversation.
    #[must_use]
    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.selected_conversation
            .and_then(|i| self.conversations.get(i))
    }

    // =========================================================================
    // Message Cursor
    // =========================================================================

    /// Move the message cursor to an older message.
    pub fn select_prev_message(&mut self) {
        let count = self.view.messages().len();
        if count == 0 {
            return;
        }
        self.message_cursor = Some(match self.message_cursor {
            Some(i) => i.saturating_sub(1),
            None => count - 1,
        });
    }

    /// Move the message cursor to a newer message.
    pub fn select_next_message(&mut self) {
        let count = self.view.messages().len();
        if count == 0 {
            return;
        }
        self.message_cursor = Some(match self.message_cursor {
            Some(i) => (i + 1).min(count - 1),
            None => count - 1,
        });
    }

    /// Get the message under the cursor.
    #[must_use]
    pub fn selected_message(&self) -> Option<&Message> {
        self.message_cursor
            .and_then(|i| self.view.messages().get(i))
    }

    // =========================================================================
    // Chat Scrolling
    // =========================================================================

    /// Scroll chat up (view older messages).
    pub fn scroll_chat_up(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_add(amount);
    }

    /// Scroll chat down (view newer messages).
    pub fn scroll_chat_down(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_sub(amount);
    }

    // =========================================================================
    // Input Handling
    // =========================================================================

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn input_chars(&self) -> usize {
        self.input.chars().count()
    }

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index();
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index();
            self.input.remove(at);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.input_chars() {
            let at = self.byte_index();
            self.input.remove(at);
        }
    }

    /// Delete the word before the cursor.
    pub fn delete_word(&mut self) {
        while self.cursor_position > 0 {
            self.delete_char();
            let prev = self
                .cursor_position
                .checked_sub(1)
                .and_then(|i| self.input.chars().nth(i));
            if prev == Some(' ') {
                break;
            }
        }
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input_chars() {
            self.cursor_position += 1;
        }
    }

    /// Move cursor to the start.
    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to the end.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input_chars();
    }

    /// Clear the input.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Take the current input (clears it).
    pub fn take_input(&mut self) -> String {
        let input = std::mem::take(&mut self.input);
        self.cursor_position = 0;
        input
    }

    // =========================================================================
    // API Operations
    // =========================================================================

    /// Refresh the conversation list from the API.
    pub async fn refresh_conversations(&mut self) -> Result<(), ApiError> {
        let open = self.has_conversation.then(|| self.view.context().conversation_id);
        self.conversations = self.api.list_conversations().await?;

        self.selected_conversation = open
            .and_then(|id| self.conversations.iter().position(|c| c.id == id))
            .or_else(|| {
                self.selected_conversation
                    .map(|i| i.min(self.conversations.len().saturating_sub(1)))
                    .filter(|_| !self.conversations.is_empty())
            });
        Ok(())
    }

    /// Load a conversation and show it.
    ///
    /// Starts the bootstrap turn when the conversation holds only its first
    /// user message.
    pub async fn open_conversation(&mut self, context: ViewContext) -> Result<(), ApiError> {
        let details = self.api.conversation_details(context.conversation_id).await?;

        self.view.navigate(context, details);
        self.has_conversation = true;
        self.agentic_mode = context.agentic_mode;
        self.chat_scroll = 0;
        self.message_cursor = context.focus_message_id.and_then(|focus| {
            self.view.messages().iter().position(|m| m.id() == focus)
        });
        if let Some(i) = self
            .conversations
            .iter()
            .position(|c| c.id == context.conversation_id)
        {
            self.selected_conversation = Some(i);
        }

        if self.view.bootstrap() {
            self.set_status("Answering first message...");
        } else {
            self.set_status(format!("Opened {}", context.to_route()));
        }
        Ok(())
    }

    /// Open the highlighted conversation.
    pub async fn open_selected_conversation(&mut self) -> Result<(), ApiError> {
        let Some(id) = self.selected_conversation().map(|c| c.id) else {
            return Ok(());
        };
        self.open_conversation(ViewContext::new(id)).await
    }

    /// Open the parent of the current thread, focused on the forking message.
    pub async fn open_parent(&mut self) -> Result<(), ApiError> {
        let path = self.view.path();
        let Some(parent) = path
            .len()
            .checked_sub(2)
            .and_then(|i| ViewContext::for_ancestor(path, i))
        else {
            self.set_status("Already at the root conversation");
            return Ok(());
        };
        self.open_conversation(parent).await
    }

    /// Create a root conversation and open it.
    pub async fn create_root_conversation(&mut self, first_msg: &str) -> Result<(), ApiError> {
        let first_msg = first_msg.trim();
        if first_msg.is_empty() {
            return Ok(());
        }
        let request = CreateConversationRequest::new(self.apply_template(first_msg), None);
        let conversation = self.api.create_conversation(&request).await?;
        tracing::info!(conversation_id = %conversation.id, "Created conversation");

        self.refresh_conversations().await?;
        self.open_conversation(ViewContext::new(conversation.id).with_agentic_mode(self.agentic_mode))
            .await
    }

    /// Prefix the prompt template of the current mode, if it has one.
    ///
    /// Blank text is returned as is.
    #[must_use]
    pub fn apply_template(&self, text: &str) -> String {
        match self.agentic_mode.and_then(|m| m.prompt_template()) {
            Some(template) if !text.trim().is_empty() => format!("{template}{text}"),
            _ => text.to_string(),
        }
    }

    /// Submit the chat input against the open conversation.
    ///
    /// The input is cleared once the view accepts it.
    pub async fn submit_input(&mut self) {
        if !self.has_conversation {
            self.set_error("Open or create a conversation first");
            return;
        }
        let text = self.apply_template(self.input.trim());

        match self.view.submit(&text, self.agentic_mode).await {
            Ok(SubmitOutcome::Streaming(turn)) => {
                tracing::debug!(turn = %turn, "Submitted message");
                self.clear_input();
                self.chat_scroll = 0;
                self.status_message = None;
            }
            Ok(SubmitOutcome::Navigate(context)) => {
                self.clear_input();
                if let Err(e) = self.refresh_conversations().await {
                    tracing::warn!(error = %e, "Failed to refresh conversations");
                }
                if let Err(e) = self.open_conversation(context).await {
                    self.set_error(format!("Failed to open thread: {e}"));
                }
            }
            Ok(SubmitOutcome::Ignored) => {}
            Err(e) => self.set_error(format!("Failed to create thread: {e}")),
        }
    }

    /// Stop the streaming reply.
    pub fn stop_streaming(&mut self) -> bool {
        let stopped = self.view.stop();
        if stopped {
            self.set_status("Stopped");
        }
        stopped
    }

    /// Apply a turn event to the chat view.
    ///
    /// Returns `true` if the UI should be redrawn.
    pub fn handle_turn_event(&mut self, event: TurnEvent) -> bool {
        let finished = matches!(event, TurnEvent::Finished { .. });
        let changed = self.view.handle_turn_event(event);
        if changed && finished {
            if let Some(error) = self.view.last_error() {
                let message = format!("Reply failed: {error}");
                self.set_error(message);
            }
        }
        changed
    }

    // =========================================================================
    // Quotes
    // =========================================================================

    /// Quote the message under the cursor.
    pub fn quote_selected(&mut self, kind: QuoteKind) {
        let Some(id) = self.selected_message().map(Message::id) else {
            self.set_error("Move the cursor to a message first (j/k)");
            return;
        };
        self.view.start_quote(id, kind, None);
    }

    /// Open the excerpt dialog for a reply to the message under the cursor.
    pub fn begin_reply(&mut self) {
        let Some(content) = self.selected_message().map(|m| m.content.clone()) else {
            self.set_error("Move the cursor to a message first (j/k)");
            return;
        };
        self.enter_dialog_mode(InputMode::EditingExcerpt, &content);
    }

    /// Finish the excerpt dialog and start the reply quote.
    pub fn confirm_reply(&mut self) {
        let excerpt = self.take_input();
        self.exit_dialog_mode();
        if let Some(id) = self.selected_message().map(Message::id) {
            let excerpt = Some(excerpt.trim().to_string()).filter(|e| !e.is_empty());
            self.view.start_quote(id, QuoteKind::Reply, excerpt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use branch_chat_api::{ByteStream, Result};
    use branch_chat_core::wire::CreateMessageRequest;
    use branch_chat_core::{ConversationDetails, ConversationId, MessageId};
    use futures::StreamExt;

    struct StaticApi {
        details: ConversationDetails,
    }

    #[async_trait]
    impl ChatApi for StaticApi {
        async fn create_conversation(
            &self,
            request: &CreateConversationRequest,
        ) -> Result<Conversation> {
            Ok(Conversation {
                id: ConversationId::new(2),
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
            Ok(self.details.clone())
        }

        async fn create_streamed_message(
            &self,
            _request: &CreateMessageRequest,
        ) -> Result<ByteStream> {
            Ok(futures::stream::pending().boxed())
        }
    }

    fn app_with(messages: Vec<Message>) -> App {
        let api = Arc::new(StaticApi {
            details: ConversationDetails {
                messages,
                path: Vec::new(),
            },
        });
        let (tx, _rx) = mpsc::channel(8);
        App::new(api, "http://localhost:8000", tx, None)
    }

    #[test]
    fn input_editing_handles_multibyte() {
        let mut app = app_with(Vec::new());
        for c in "héllo".chars() {
            app.insert_char(c);
        }
        app.move_cursor_left();
        app.move_cursor_left();
        app.delete_char();
        assert_eq!(app.input, "hélo");
        app.move_cursor_start();
        app.delete_char_forward();
        assert_eq!(app.input, "élo");
        app.move_cursor_end();
        assert_eq!(app.cursor_position, 3);
    }

    #[test]
    fn delete_word_stops_at_space() {
        let mut app = app_with(Vec::new());
        for c in "hello big world".chars() {
            app.insert_char(c);
        }
        app.delete_word();
        assert_eq!(app.input, "hello big ");
    }

    #[test]
    fn dialog_restores_chat_input() {
        let mut app = app_with(Vec::new());
        app.insert_char('x');
        app.enter_dialog_mode(InputMode::EditingExcerpt, "quoted");
        assert_eq!(app.input, "quoted");
        assert_eq!(app.cursor_position, 6);
        app.exit_dialog_mode();
        assert_eq!(app.input, "x");
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn template_prefixes_technique_modes() {
        let mut app = app_with(Vec::new());
        assert_eq!(app.apply_template("q"), "q");
        app.agentic_mode = Some(AgenticMode::ChainOfThought);
        assert!(app.apply_template("q").ends_with("Here is the query:\nq"));
        assert_eq!(app.apply_template(""), "");
        app.agentic_mode = Some(AgenticMode::DeepResearch);
        assert_eq!(app.apply_template("q"), "q");
    }

    #[test]
    fn cycle_mode_shows_default_models() {
        let mut app = app_with(Vec::new());
        app.agentic_mode = Some(AgenticMode::FewShot);
        app.cycle_agentic_mode();
        assert_eq!(app.agentic_mode, Some(AgenticMode::ThinkLonger));
        assert_eq!(
            app.status_message.as_deref(),
            Some("Mode: Think (deepseek/deepseek-reasoner)")
        );
    }

    #[tokio::test]
    async fn blank_input_with_template_mode_is_ignored() {
        let conv = ConversationId::new(1);
        let mut app = app_with(vec![Message::assistant(conv, Some(MessageId::new(4)), "a", "")]);
        app.open_conversation(ViewContext::new(conv)).await.unwrap();
        app.agentic_mode = Some(AgenticMode::ChainOfThought);

        app.insert_char(' ');
        app.submit_input().await;
        assert!(!app.view.is_submitting());
        assert_eq!(app.view.messages().len(), 1);
        assert_eq!(app.input, " ");
    }

    #[tokio::test]
    async fn input_kept_while_reply_streams() {
        let conv = ConversationId::new(1);
        let mut app = app_with(vec![Message::assistant(conv, Some(MessageId::new(4)), "a", "")]);
        app.open_conversation(ViewContext::new(conv)).await.unwrap();

        app.insert_char('x');
        app.submit_input().await;
        assert!(app.view.is_submitting());
        assert!(app.input.is_empty());

        app.insert_char('y');
        app.submit_input().await;
        assert_eq!(app.input, "y");
        assert_eq!(app.view.messages().len(), 2);
    }

    #[tokio::test]
    async fn navigating_resets_agentic_mode() {
        let conv = ConversationId::new(1);
        let mut app = app_with(vec![Message::assistant(conv, Some(MessageId::new(4)), "a", "")]);
        app.agentic_mode = Some(AgenticMode::DeepResearch);

        app.open_conversation(ViewContext::new(conv)).await.unwrap();
        assert_eq!(app.agentic_mode, None);

        let routed = ViewContext::new(conv).with_agentic_mode(Some(AgenticMode::TreeOfThoughts));
        app.open_conversation(routed).await.unwrap();
        assert_eq!(app.agentic_mode, Some(AgenticMode::TreeOfThoughts));
    }

    #[tokio::test]
    async fn open_conversation_focuses_message() {
        let conv = ConversationId::new(1);
        let mut app = app_with(vec![
            Message::assistant(conv, Some(MessageId::new(10)), "a", ""),
            Message::assistant(conv, Some(MessageId::new(11)), "b", ""),
        ]);
        let ctx = ViewContext::new(conv).with_focus(Some(MessageId::new(11)));
        app.open_conversation(ctx).await.unwrap();

        assert!(app.has_conversation);
        assert_eq!(app.message_cursor, Some(1));
        app.select_prev_message();
        assert_eq!(app.selected_message().map(Message::id), Some(MessageId::new(10)));
        app.select_prev_message();
        assert_eq!(app.message_cursor, Some(0));
    }

    #[tokio::test]
    async fn open_conversation_bootstraps_first_message() {
        let conv = ConversationId::new(1);
        let mut app = app_with(vec![Message::user(conv, "first")]);
        app.open_conversation(ViewContext::new(conv)).await.unwrap();
        assert!(app.view.is_submitting());
        assert!(app.stop_streaming());
        assert!(!app.view.is_submitting());
    }

    #[tokio::test]
    async fn submit_without_conversation_is_an_error() {
        let mut app = app_with(Vec::new());
        app.insert_char('h');
        app.submit_input().await;
        assert!(app.error_message.is_some());
        assert_eq!(app.input, "h");
    }

    #[tokio::test]
    async fn reply_dialog_sets_excerpt() {
        let conv = ConversationId::new(1);
        let mut app = app_with(vec![Message::assistant(conv, Some(MessageId::new(4)), "The sky is blue", "")]);
        app.open_conversation(ViewContext::new(conv)).await.unwrap();

        app.select_next_message();
        app.begin_reply();
        assert_eq!(app.input_mode, InputMode::EditingExcerpt);
        assert_eq!(app.input, "The sky is blue");

        app.clear_input();
        for c in "sky".chars() {
            app.insert_char(c);
        }
        app.confirm_reply();
        assert_eq!(app.view.quote().kind(), Some(QuoteKind::Reply));
        assert_eq!(app.input_mode, InputMode::Normal);
    }
}
