//! Branch Chat CLI - Terminal UI for branching conversations.
//!
//! This is the entry point for the `bchat` binary.

mod app;
mod ui;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use branch_chat_api::{ApiConfig, HttpChatApi};
use branch_chat_core::{AgenticMode, ConversationId, QuoteKind, ViewContext};
use branch_chat_session::TurnEvent;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use app::{App, Focus, InputMode, REFRESH_INTERVAL};

/// Branch Chat CLI - Terminal UI for branching conversations.
#[derive(Parser, Debug)]
#[command(name = "bchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Conversation service URL.
    #[arg(
        long,
        env = "BRANCH_CHAT_API_URL",
        default_value = "http://localhost:8000"
    )]
    api_url: String,

    /// Conversation to open: a numeric id or a route like
    /// `/chat/7?agentic_mode=cot&focus=12`.
    #[arg(long)]
    conversation: Option<String>,

    /// Agentic mode for new messages (cot, tot, few_shot, think_longer,
    /// deep_research).
    #[arg(long)]
    agentic_mode: Option<AgenticMode>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Write debug logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Resolve `--conversation` into a view context.
    fn initial_context(&self) -> anyhow::Result<Option<ViewContext>> {
        let Some(raw) = self.conversation.as_deref() else {
            return Ok(None);
        };
        let context = if raw.starts_with('/') {
            let context: ViewContext = raw.parse()?;
            if context.agentic_mode.is_none() {
                context.with_agentic_mode(self.agentic_mode)
            } else {
                context
            }
        } else {
            let id: ConversationId = raw
                .parse()
                .with_context(|| format!("invalid conversation '{raw}'"))?;
            ViewContext::new(id).with_agentic_mode(self.agentic_mode)
        };
        Ok(Some(context))
    }
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    if !args.debug {
        return Ok(());
    }
    let builder = tracing_subscriber::fmt().with_env_filter("branch_chat=debug,warn");
    match &args.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        // The TUI owns stdout.
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args = Args::parse();
    init_logging(&args)?;
    let initial = args.initial_context()?;

    // Create client
    let config = ApiConfig::with_base_url(args.api_url.clone());
    let api = Arc::new(HttpChatApi::new(&config)?);

    // Setup terminal with mouse capture enabled
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (turn_tx, turn_rx) = mpsc::channel::<TurnEvent>(128);
    let mut app = App::new(api, api_base_url(&config), turn_tx, args.agentic_mode);

    // Initial load
    if let Err(e) = app.refresh_conversations().await {
        app.refresh_error = Some(format!("Failed to load conversations: {e}"));
    }
    if let Some(context) = initial {
        if let Err(e) = app.open_conversation(context).await {
            app.set_error(format!("Failed to open {}: {e}", context.to_route()));
        }
    }

    // Run the event loop
    let result = run_event_loop(&mut terminal, &mut app, turn_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

fn api_base_url(config: &ApiConfig) -> String {
    config.base_url.trim_end_matches('/').to_string()
}

/// Main event loop.
///
/// Turn events redraw immediately so streamed text appears as it arrives.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut turn_rx: mpsc::Receiver<TurnEvent>,
) -> anyhow::Result<()> {
    let mut refresh_interval = tokio::time::interval(REFRESH_INTERVAL);

    loop {
        app.tick_animation();
        terminal.draw(|f| ui::render(f, app))?;

        let tick_rate = if app.needs_immediate_redraw() {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(100)
        };

        tokio::select! {
            () = tokio::time::sleep(tick_rate) => {
                while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        handle_input(app, evt).await;
                    }
                }
            }

            Some(event) = turn_rx.recv() => {
                if app.handle_turn_event(event) {
                    terminal.draw(|f| ui::render(f, app))?;
                }
            }

            // Skipped while a dialog is open or a reply is streaming.
            _ = refresh_interval.tick() => {
                if app.input_mode == InputMode::Normal && !app.view.is_submitting() {
                    if let Err(e) = app.refresh_conversations().await {
                        app.refresh_error = Some(format!("Refresh failed: {e}"));
                        tracing::warn!(error = %e, "Failed to refresh conversations");
                    } else {
                        app.refresh_error = None;
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.stop_streaming();
    Ok(())
}

/// Handle input events.
async fn handle_input(app: &mut App, event: Event) {
    match event {
        Event::Key(key) => {
            if key.kind != KeyEventKind::Press {
                return;
            }
            match app.input_mode {
                InputMode::Normal => handle_normal_mode(app, key.code, key.modifiers).await,
                InputMode::EditingExcerpt => handle_excerpt_mode(app, key.code, key.modifiers),
                InputMode::NewConversation => {
                    handle_new_conversation_mode(app, key.code, key.modifiers).await;
                }
            }
        }
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_chat_up(3),
            MouseEventKind::ScrollDown => app.scroll_chat_down(3),
            _ => {}
        },
        _ => {}
    }
}

/// Handle input in normal mode.
///
/// - Up/Down navigate conversations, Tab switches focus
/// - Typing goes to the input (when not in command mode)
/// - Esc stops a reply, closes the quote, clears an error, or enters
///   command mode, in that order
async fn handle_normal_mode(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if code == KeyCode::Esc {
        if app.command_mode {
            app.command_mode = false;
        } else if app.view.is_submitting() {
            app.stop_streaming();
        } else if !app.view.quote().is_none() {
            app.view.close_quote();
        } else if app.error_message.is_some() {
            app.clear_error();
        } else {
            app.command_mode = true;
        }
        return;
    }

    match code {
        KeyCode::PageUp => app.scroll_chat_up(10),
        KeyCode::PageDown => app.scroll_chat_down(10),
        KeyCode::Up => app.select_prev_conversation(),
        KeyCode::Down => app.select_next_conversation(),
        KeyCode::Tab => app.focus = app.focus.toggle(),
        _ if app.command_mode => handle_command_mode(app, code).await,
        _ => handle_input_mode(app, code, modifiers).await,
    }
}

/// Single-key commands (Esc was pressed).
async fn handle_command_mode(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('j') => app.select_next_message(),
        KeyCode::Char('k') => app.select_prev_message(),
        KeyCode::Char('t') => app.quote_selected(QuoteKind::NewThread),
        KeyCode::Char('s') => app.quote_selected(QuoteKind::Select),
        KeyCode::Char('r') => app.begin_reply(),
        KeyCode::Char('x') => app.view.close_quote(),
        KeyCode::Char('m') => app.cycle_agentic_mode(),
        KeyCode::Char('n') => app.enter_dialog_mode(InputMode::NewConversation, ""),
        KeyCode::Char('o') => {
            if let Err(e) = app.open_selected_conversation().await {
                app.set_error(format!("Failed to open conversation: {e}"));
            }
        }
        KeyCode::Char('b') => {
            if let Err(e) = app.open_parent().await {
                app.set_error(format!("Failed to open parent: {e}"));
            }
        }
        KeyCode::Enter | KeyCode::Char('i') => app.command_mode = false,
        _ => {}
    }
}

/// Shared line-editing keys. Returns `true` if the key was consumed.
fn edit_input(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> bool {
    match code {
        KeyCode::Char(c) if modifiers.contains(KeyModifiers::CONTROL) => match c {
            'a' => app.move_cursor_start(),
            'e' => app.move_cursor_end(),
            'u' => app.clear_input(),
            'w' => app.delete_word(),
            _ => return false,
        },
        KeyCode::Char(c) => app.insert_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        _ => return false,
    }
    true
}

/// Typing goes to the chat input.
async fn handle_input_mode(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if code != KeyCode::Enter {
        edit_input(app, code, modifiers);
        return;
    }
    if app.focus == Focus::Conversations && app.input.is_empty() {
        if let Err(e) = app.open_selected_conversation().await {
            app.set_error(format!("Failed to open conversation: {e}"));
        }
    } else {
        app.submit_input().await;
    }
}

/// Editing the excerpt of a reply.
fn handle_excerpt_mode(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    match code {
        KeyCode::Esc => app.exit_dialog_mode(),
        KeyCode::Enter => app.confirm_reply(),
        _ => {
            edit_input(app, code, modifiers);
        }
    }
}

/// Typing the first message of a new root conversation.
async fn handle_new_conversation_mode(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    match code {
        KeyCode::Esc => app.exit_dialog_mode(),
        KeyCode::Enter => {
            let first_msg = app.take_input();
            app.exit_dialog_mode();
            app.command_mode = false;
            if let Err(e) = app.create_root_conversation(&first_msg).await {
                app.set_error(format!("Failed to create conversation: {e}"));
            }
        }
        _ => {
            edit_input(app, code, modifiers);
        }
    }
}
