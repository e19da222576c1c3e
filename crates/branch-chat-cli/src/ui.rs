//! UI rendering with ratatui.
//!
//! Two columns: the conversation list on the left; breadcrumbs, chat,
//! quote banner and input on the right.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
    ScrollbarState, Wrap,
};
use ratatui::Frame;

use branch_chat_core::{breadcrumb_label, Message, QuoteContext};

use crate::app::{App, Focus, InputMode};

/// Horizontal padding for chat content.
const CHAT_PADDING: u16 = 2;

/// Longest quote preview shown in the banner.
const QUOTE_PREVIEW_CHARS: usize = 60;

/// Render the UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header bar
            Constraint::Min(5),    // Columns
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, main_layout[0]);

    let content_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(main_layout[1]);

    render_conversations_panel(frame, app, content_layout[0]);
    render_chat_column(frame, app, content_layout[1]);
    render_status_bar(frame, app, main_layout[2]);

    match app.input_mode {
        InputMode::Normal => {}
        InputMode::EditingExcerpt => render_input_dialog(
            frame,
            app,
            area,
            " Reply to Excerpt ",
            "Trim the text down to the part you are replying to:",
            "Enter to quote, Esc to cancel",
        ),
        InputMode::NewConversation => render_input_dialog(
            frame,
            app,
            area,
            " New Conversation ",
            "First message:",
            "Enter to create, Esc to cancel",
        ),
    }
}

/// Shorten `s` to `max_chars`, keeping both ends.
fn truncate_middle(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars {
        return s.to_string();
    }
    if max_chars < 5 {
        return s.chars().take(max_chars).collect();
    }
    let keep = (max_chars - 3) / 2;
    let start: String = s.chars().take(keep).collect();
    let end: String = s.chars().skip(count - keep).collect();
    format!("{start}...{end}")
}

/// Shorten `s` to `max_chars`, keeping the start.
fn preview(s: &str, max_chars: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let head: String = flat.chars().take(max_chars).collect();
    format!("{head}...")
}

fn width_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Render the header bar with the service URL and reachability.
fn render_header_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (status_text, status_style) = if app.refresh_error.is_some() {
        ("unreachable", Style::default().fg(Color::Red))
    } else {
        ("connected", Style::default().fg(Color::Green))
    };

    let title = "BRANCH CHAT";
    let max_url_width = (area.width as usize / 2).saturating_sub(15);
    let display_url = truncate_middle(app.api_url(), max_url_width);
    let right_width = display_url.chars().count() + status_text.len() + 3;
    let gap = (area.width as usize).saturating_sub(title.len() + right_width);

    let line = Line::from(vec![
        Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(gap)),
        Span::raw(display_url),
        Span::raw(" ["),
        Span::styled(status_text, status_style),
        Span::raw("]"),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    }
}

/// Render the conversation list.
fn render_conversations_panel(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Conversations;

    let block = Block::default()
        .title(" Conversations ")
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    let open = app
        .has_conversation
        .then(|| app.view.context().conversation_id);

    let items: Vec<ListItem> = app
        .conversations
        .iter()
        .map(|conversation| {
            let marker = if conversation.is_thread() { "↳ " } else { "" };
            let style = if open == Some(conversation.id) {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::DarkGray)),
                Span::styled(breadcrumb_label(&conversation.name), style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.selected_conversation);
    frame.render_stateful_widget(list, area, &mut state);

    if app.command_mode && area.height > 4 {
        let help_area = Rect::new(
            area.x + 1,
            area.y + area.height.saturating_sub(2),
            area.width.saturating_sub(2),
            1,
        );
        let help = Paragraph::new(Line::from(vec![
            Span::styled("[n]", Style::default().fg(Color::Yellow)),
            Span::raw("ew "),
            Span::styled("[o]", Style::default().fg(Color::Yellow)),
            Span::raw("pen "),
            Span::styled("[b]", Style::default().fg(Color::Yellow)),
            Span::raw("ack"),
        ]))
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, help_area);
    }
}

/// Render the right column: breadcrumbs, chat, quote banner and input.
fn render_chat_column(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Chat;

    let title = match app.agentic_mode {
        Some(mode) => format!(" Chat [{}] ", mode.label()),
        None => " Chat ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let banner_height = u16::from(!app.view.quote().is_none());
    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // Breadcrumbs
            Constraint::Min(1),                // Messages
            Constraint::Length(banner_height), // Quote banner
            Constraint::Length(1),             // Separator
            Constraint::Length(1),             // Input
        ])
        .split(inner_area);

    render_breadcrumbs(frame, app, inner_layout[0]);

    let chat_area_full = inner_layout[1];
    let chat_area = Rect::new(
        chat_area_full.x + CHAT_PADDING,
        chat_area_full.y,
        chat_area_full.width.saturating_sub(CHAT_PADDING * 2 + 1),
        chat_area_full.height,
    );
    render_messages(frame, app, chat_area, chat_area_full);

    if banner_height > 0 {
        render_quote_banner(frame, app, inner_layout[2]);
    }
    render_input_line(frame, app, inner_layout[3], inner_layout[4], is_focused);
}

/// Render the ancestry path of the open conversation.
fn render_breadcrumbs(frame: &mut Frame, app: &App, area: Rect) {
    let path = app.view.path();
    if path.is_empty() {
        return;
    }

    let mut spans = Vec::with_capacity(path.len() * 2);
    for (i, entry) in path.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
        }
        let style = if i + 1 == path.len() {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(breadcrumb_label(&entry.name), style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Lines for one finished message.
fn message_lines<'a>(msg: &'a Message, quote: &QuoteContext, under_cursor: bool) -> Vec<Line<'a>> {
    let mut lines = Vec::new();

    let marker = if under_cursor {
        Span::styled("▶ ", Style::default().fg(Color::Yellow))
    } else if quote.is_selected(msg.id()) {
        Span::styled("✓ ", Style::default().fg(Color::Magenta))
    } else if quote.quoted_message().is_some_and(|q| q.id() == msg.id()) {
        Span::styled("❝ ", Style::default().fg(Color::Magenta))
    } else {
        Span::raw("  ")
    };

    if msg.is_user() {
        lines.push(Line::from(vec![
            marker,
            Span::styled("[You]", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        ]));
        if let Some((_, excerpt)) = msg.referred() {
            lines.push(Line::from(Span::styled(
                format!("  ↪ \"{}\"", preview(excerpt, QUOTE_PREVIEW_CHARS)),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        lines.extend(msg.content.lines().map(|l| Line::from(Span::raw(l))));
    } else {
        lines.push(Line::from(vec![
            marker,
            Span::styled(
                "[Assistant]",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]));
        if let Some(reasoning) = &msg.reasoning_summary {
            lines.extend(reasoning.lines().map(|l| {
                Line::from(Span::styled(
                    l,
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                ))
            }));
        }
        lines.extend(msg.content.lines().map(|l| Line::from(Span::raw(l))));
    }

    for child in &msg.child_conversations {
        lines.push(Line::from(Span::styled(
            format!("  ⑂ {}", breadcrumb_label(&child.name)),
            Style::default().fg(Color::Blue),
        )));
    }
    lines.push(Line::from(""));
    lines
}

/// Lines for the reply that is still streaming.
fn live_lines<'a>(app: &'a App) -> Vec<Line<'a>> {
    let reasoning = app.view.live_reasoning();
    let content = app.view.live_content();

    let phase = if content.is_empty() && !reasoning.is_empty() {
        "thinking"
    } else if content.is_empty() {
        "waiting"
    } else {
        "answering"
    };

    let mut lines = vec![Line::from(vec![
        Span::raw("  "),
        Span::styled("[Assistant]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
        Span::styled(format!(" {phase}..."), Style::default().fg(Color::DarkGray)),
    ])];

    lines.extend(reasoning.lines().map(|l| {
        Line::from(Span::styled(
            l,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))
    }));
    lines.extend(content.lines().map(|l| Line::from(Span::raw(l))));
    lines
}

/// Render the message list with the live reply at the bottom.
fn render_messages(frame: &mut Frame, app: &App, chat_area: Rect, chat_area_full: Rect) {
    let messages = app.view.messages();

    if messages.is_empty() && !app.view.is_submitting() {
        let help = if app.has_conversation {
            "Type a message and press Enter to send"
        } else {
            "Press Esc then n to start a conversation, or o to open one"
        };
        let text = Paragraph::new(help)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(text, chat_area);
        return;
    }

    let quote = app.view.quote();
    let mut lines: Vec<Line> = Vec::new();
    for (i, msg) in messages.iter().enumerate() {
        lines.extend(message_lines(msg, quote, app.message_cursor == Some(i)));
    }
    if app.view.is_submitting() {
        lines.extend(live_lines(app));
    }

    let text = Text::from(lines);
    let content_width = chat_area.width as usize;
    let visible_lines = chat_area.height as usize;
    let total_wrapped_lines = calculate_wrapped_line_count(&text, content_width);

    // `chat_scroll` counts lines up from the bottom.
    let max_scroll = total_wrapped_lines.saturating_sub(visible_lines);
    let effective_scroll = app.chat_scroll.min(max_scroll);
    let scroll_offset = max_scroll.saturating_sub(effective_scroll);

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((width_u16(scroll_offset), 0));
    frame.render_widget(paragraph, chat_area);

    if total_wrapped_lines > visible_lines {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state = ScrollbarState::new(total_wrapped_lines)
            .position(scroll_offset)
            .viewport_content_length(visible_lines);
        frame.render_stateful_widget(scrollbar, chat_area_full, &mut scrollbar_state);
    }
}

/// Render the active quote above the input.
fn render_quote_banner(frame: &mut Frame, app: &App, area: Rect) {
    let label_style = Style::default().fg(Color::Black).bg(Color::Magenta);
    let line = match app.view.quote() {
        QuoteContext::None => return,
        QuoteContext::NewThread { message } => Line::from(vec![
            Span::styled(" NEW THREAD ", label_style),
            Span::raw(format!(" from \"{}\"", preview(&message.content, QUOTE_PREVIEW_CHARS))),
        ]),
        QuoteContext::Reply { excerpt, .. } => Line::from(vec![
            Span::styled(" REPLY ", label_style),
            Span::raw(format!(" to \"{}\"", preview(excerpt, QUOTE_PREVIEW_CHARS))),
        ]),
        QuoteContext::Select { ids } => Line::from(vec![
            Span::styled(" SELECT ", label_style),
            Span::raw(format!(" {} message(s)", ids.len())),
        ]),
    };
    let hint = Span::styled("  (Esc to close)", Style::default().fg(Color::DarkGray));
    let mut spans = line.spans;
    spans.push(hint);
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the input line at the bottom of the chat column.
fn render_input_line(
    frame: &mut Frame,
    app: &App,
    separator_area: Rect,
    input_area: Rect,
    is_focused: bool,
) {
    let separator = Paragraph::new("─".repeat(separator_area.width as usize))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(separator, separator_area);

    let in_modal = app.input_mode != InputMode::Normal;
    let typing = is_focused && !app.command_mode;

    let prompt = if app.command_mode {
        ": "
    } else if is_focused {
        "> "
    } else {
        "│ "
    };
    let input_text = if in_modal { "" } else { app.input.as_str() };

    let input_line = Line::from(vec![
        Span::styled(
            prompt,
            Style::default().fg(if typing { Color::Cyan } else { Color::DarkGray }),
        ),
        Span::styled(input_text, Style::default().fg(Color::White)),
    ]);
    frame.render_widget(Paragraph::new(input_line), input_area);

    // Hidden while streaming to prevent flicker.
    if typing && !in_modal && !app.view.is_submitting() {
        frame.set_cursor_position((
            input_area.x + width_u16(prompt.chars().count() + app.cursor_position),
            input_area.y,
        ));
    }
}

fn key(k: &str) -> Span<'_> {
    Span::styled(k, Style::default().fg(Color::Yellow))
}

/// Render the status bar.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_indicator = if app.command_mode {
        Span::styled(" COMMAND ", Style::default().fg(Color::Black).bg(Color::Blue))
    } else if app.view.is_submitting() {
        Span::styled(" STREAMING ", Style::default().fg(Color::Black).bg(Color::Yellow))
    } else {
        Span::styled(" INSERT ", Style::default().fg(Color::Black).bg(Color::Green))
    };

    let status = if let Some(ref error) = app.error_message {
        Line::from(vec![
            mode_indicator,
            Span::styled(" ERROR: ", Style::default().fg(Color::Red).bold()),
            Span::styled(error.as_str(), Style::default().fg(Color::Red)),
        ])
    } else if let Some(ref refresh_error) = app.refresh_error {
        Line::from(vec![
            mode_indicator,
            Span::styled(" ⚠ ", Style::default().fg(Color::Yellow).bold()),
            Span::styled(refresh_error.as_str(), Style::default().fg(Color::Yellow)),
        ])
    } else if let Some(ref status) = app.status_message {
        Line::from(vec![
            mode_indicator,
            Span::styled(format!(" {status}"), Style::default().fg(Color::Green)),
        ])
    } else if app.command_mode {
        Line::from(vec![
            mode_indicator,
            Span::raw(" "),
            key("j/k"),
            Span::raw(":cursor "),
            key("t"),
            Span::raw(":thread "),
            key("r"),
            Span::raw(":reply "),
            key("s"),
            Span::raw(":select "),
            key("x"),
            Span::raw(":close "),
            key("m"),
            Span::raw(":mode "),
            key("q"),
            Span::raw(":quit"),
        ])
    } else {
        Line::from(vec![
            mode_indicator,
            Span::raw(" "),
            key("Enter"),
            Span::raw(":send "),
            key("Esc"),
            Span::raw(if app.view.is_submitting() { ":stop " } else { ":command " }),
            key("Tab"),
            Span::raw(":switch"),
        ])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

/// Render a single-input dialog using the shared input buffer.
fn render_input_dialog(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    title: &str,
    label: &str,
    help: &str,
) {
    let dialog_area = centered_rect(60, 40, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Label
            Constraint::Min(3),    // Input box
            Constraint::Length(1), // Help text
        ])
        .split(inner);

    frame.render_widget(
        Paragraph::new(label).style(Style::default().fg(Color::White)),
        layout[0],
    );

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::Yellow))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(input, layout[1]);

    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        layout[2],
    );
}

/// Calculate the number of visual lines after text wrapping.
fn calculate_wrapped_line_count(text: &Text, available_width: usize) -> usize {
    if available_width == 0 {
        return text.lines.len();
    }
    text.lines
        .iter()
        .map(|line| line.width().div_ceil(available_width).max(1))
        .sum()
}

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
