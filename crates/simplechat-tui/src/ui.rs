use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
    },
};
use simplechat_core::ChatRole;

use crate::app::{char_to_byte_index, App, LoginField, Screen};
use crate::markdown::render_markdown;

const MAX_INPUT_ROWS: u16 = 6;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    match app.screen {
        Screen::Login => render_login_screen(app, frame, area),
        Screen::Chat => render_chat_screen(app, frame, area),
    }
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let input_rows = (app.input.split('\n').count() as u16).clamp(1, MAX_INPUT_ROWS);

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_rows + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Popups (in order of priority)
    if app.upload.uploading {
        render_uploading(app, frame, area);
    } else if app.upload.prompt_open {
        render_upload_prompt(app, frame, area);
    } else if let Some(feedback) = app.upload.feedback.as_deref() {
        render_toast(feedback, frame, chat_area);
    }
}

fn status_style(status: &str) -> Style {
    match status {
        "error" => Style::default().fg(Color::Red).bold(),
        "checking..." => Style::default().fg(Color::Yellow),
        _ => Style::default().fg(Color::Green).bold(),
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" Simple Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(" backend: ", Style::default().fg(Color::White)),
        Span::styled(app.status.clone(), status_style(&app.status)),
    ];

    if let Some(username) = &app.username {
        spans.push(Span::styled("  user: ", Style::default().fg(Color::White)));
        spans.push(Span::styled(username.clone(), Style::default().fg(Color::Cyan)));
    }

    if app.upload.uploading {
        spans.push(Span::styled("  uploading…", Style::default().fg(Color::Yellow)));
    }

    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::Gray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Role badge plus markdown body for every message
fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let messages = app.conversation.messages();
    let loading = app.conversation.is_loading();

    for (idx, msg) in messages.iter().enumerate() {
        let (badge, badge_bg) = match msg.role {
            ChatRole::User => (" you ", Color::Rgb(107, 161, 230)),
            ChatRole::Assistant => (" assistant ", Color::Rgb(238, 121, 72)),
            ChatRole::System => (" system ", Color::Rgb(60, 60, 60)),
        };
        lines.push(Line::from(Span::styled(
            badge,
            Style::default()
                .fg(Color::Rgb(10, 10, 10))
                .bg(badge_bg)
                .add_modifier(Modifier::BOLD),
        )));

        let is_last = idx + 1 == messages.len();
        if is_last && loading && msg.is_assistant() && msg.content.is_empty() {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!(" Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        } else {
            let base = match msg.role {
                ChatRole::User => Style::default().fg(Color::Cyan),
                _ => Style::default(),
            };
            for line in render_markdown(&msg.content, base) {
                let mut spans = vec![Span::raw(" ")];
                spans.extend(line.spans);
                lines.push(Line::from(spans));
            }
        }

        if !is_last {
            lines.push(Line::default());
        }
    }

    lines
}

/// Display width of a single character
fn char_width(c: char) -> usize {
    let mut buf = [0u8; 4];
    Span::raw(&*c.encode_utf8(&mut buf)).width()
}

/// Collect styled characters back into spans, dropping trailing whitespace
fn to_line(cells: &[(char, Style)], line_style: Style) -> Line<'static> {
    let end = cells
        .iter()
        .rposition(|(c, _)| !c.is_whitespace())
        .map_or(0, |pos| pos + 1);
    let cells = &cells[..end];

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut text = String::new();
    let mut style = None;

    for &(c, cell_style) in cells {
        if style.is_some_and(|s| s != cell_style) {
            spans.push(Span::styled(std::mem::take(&mut text), style.unwrap_or_default()));
        }
        style = Some(cell_style);
        text.push(c);
    }
    if !text.is_empty() {
        spans.push(Span::styled(text, style.unwrap_or_default()));
    }

    Line::from(spans).style(line_style)
}

/// Wrap a styled line on word boundaries so it fits within `width` columns.
/// Words wider than a full row are split across rows. Whitespace at the
/// start of a continuation row is dropped.
fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line];
    }

    let line_style = line.style;
    let cells: Vec<(char, Style)> = line
        .spans
        .iter()
        .flat_map(|span| span.content.chars().map(move |c| (c, span.style)))
        .collect();

    let mut rows: Vec<Line<'static>> = Vec::new();
    let mut row: Vec<(char, Style)> = Vec::new();
    let mut row_width = 0;

    let mut idx = 0;
    while idx < cells.len() {
        // A run of whitespace or a word
        let is_space = cells[idx].0.is_whitespace();
        let end = cells[idx..]
            .iter()
            .position(|(c, _)| c.is_whitespace() != is_space)
            .map(|offset| idx + offset)
            .unwrap_or(cells.len());
        let segment = &cells[idx..end];
        let segment_width: usize = segment.iter().map(|(c, _)| char_width(*c)).sum();
        idx = end;

        if is_space {
            if row.is_empty() && !rows.is_empty() {
                continue;
            }
            if row_width + segment_width <= width {
                row.extend_from_slice(segment);
                row_width += segment_width;
            } else {
                rows.push(to_line(&row, line_style));
                row.clear();
                row_width = 0;
            }
            continue;
        }

        if row_width + segment_width > width && row_width > 0 {
            rows.push(to_line(&row, line_style));
            row.clear();
            row_width = 0;
        }

        for &(c, style) in segment {
            let w = char_width(c);
            if row_width + w > width && row_width > 0 {
                rows.push(to_line(&row, line_style));
                row.clear();
                row_width = 0;
            }
            row.push((c, style));
            row_width += w;
        }
    }

    if !row.is_empty() || rows.is_empty() {
        rows.push(to_line(&row, line_style));
    }
    rows
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    let inner = block.inner(area);
    // Pre-wrapped so the row count matches what is drawn
    let lines: Vec<Line<'static>> = transcript_lines(app)
        .into_iter()
        .flat_map(|line| wrap_line(line, inner.width as usize))
        .collect();
    let total = lines.len().min(u16::MAX as usize) as u16;
    app.update_scroll_bounds(total.saturating_sub(inner.height));

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.scroll, 0));
    frame.render_widget(chat, area);

    if app.chat_max_scroll > 0 {
        let mut state = ScrollbarState::new(app.chat_max_scroll as usize)
            .position(app.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let loading = app.conversation.is_loading();

    let (title, border_color) = if loading {
        (" Waiting for reply… ", Color::DarkGray)
    } else {
        (" Message (Enter to send, Alt+Enter for newline) ", Color::Yellow)
    };

    let send_style = if app.can_submit() {
        Style::default().fg(Color::Blue).bold()
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
        .title(Line::from(Span::styled(" ➤ send ", send_style)).right_aligned());

    let inner = block.inner(area);

    // Keep the cursor row visible when the input is taller than the box
    let before_cursor = &app.input[..char_to_byte_index(&app.input, app.input_cursor)];
    let cursor_row = before_cursor.matches('\n').count() as u16;
    let cursor_col = before_cursor
        .rsplit('\n')
        .next()
        .map(|segment| Span::raw(segment).width())
        .unwrap_or(0) as u16;
    let input_scroll = cursor_row.saturating_sub(inner.height.saturating_sub(1));

    let input = if app.input.is_empty() && !loading {
        Paragraph::new(Span::styled(
            "Type a message…",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Paragraph::new(app.input.as_str()).style(Style::default().fg(if loading {
            Color::DarkGray
        } else {
            Color::Cyan
        }))
    };

    frame.render_widget(input.block(block).scroll((input_scroll, 0)), area);

    if !loading && !app.upload.prompt_open && !app.upload.uploading && inner.width > 0 {
        let x = inner.x + cursor_col.min(inner.width - 1);
        let y = inner.y + cursor_row - input_scroll;
        frame.set_cursor_position((x, y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let line = if let Some(error) = app.conversation.error() {
        Line::from(vec![
            Span::styled(" ERROR ", Style::default().bg(Color::Red).fg(Color::White).bold()),
            Span::styled(format!(" {} ", error), Style::default().fg(Color::Red)),
            Span::styled(" Esc ", key_style),
            Span::styled(" dismiss ", label_style),
        ])
    } else {
        Line::from(vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Alt+Enter ", key_style),
            Span::styled(" newline ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Ctrl+U ", key_style),
            Span::styled(" upload ", label_style),
            Span::styled(" Ctrl+C ", key_style),
            Span::styled(" quit ", label_style),
        ])
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4)).max(1);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_login_screen(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(56, 12, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Simple Chat · Sign in ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [info_area, user_area, pass_area, message_area, help_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    let info = Paragraph::new(Line::from(vec![
        Span::styled("backend: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.api.base_url().to_string(), Style::default().fg(Color::White)),
        Span::raw("  "),
        Span::styled(app.status.clone(), status_style(&app.status)),
    ]));
    frame.render_widget(info, info_area);

    let masked = "•".repeat(app.login.password.chars().count());
    let fields = [
        (LoginField::Username, " Username ", app.login.username.as_str(), user_area),
        (LoginField::Password, " Password ", masked.as_str(), pass_area),
    ];

    for (field, title, value, field_area) in fields {
        let active = app.login.field == field;
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if active { Color::Yellow } else { Color::DarkGray }))
            .title(title);
        let inner = block.inner(field_area);
        frame.render_widget(
            Paragraph::new(value).style(Style::default().fg(Color::Cyan)).block(block),
            field_area,
        );

        if active && !app.login.submitting && inner.width > 0 {
            let col = (Span::raw(value).width() as u16).min(inner.width - 1);
            frame.set_cursor_position((inner.x + col, inner.y));
        }
    }

    let message = if app.login.submitting {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Span::styled(format!("Signing in{}", dots), Style::default().fg(Color::Yellow))
    } else if let Some(error) = &app.login.error {
        Span::styled(error.clone(), Style::default().fg(Color::Red))
    } else {
        Span::raw("")
    };
    frame.render_widget(Paragraph::new(message), message_area);

    let help = Paragraph::new("Tab switch field · Enter sign in · Esc quit")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area);
}

fn render_upload_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(64, 5, area);
    frame.render_widget(Clear, popup_area);

    let store = app
        .config
        .vector_store_id
        .as_deref()
        .unwrap_or("not configured");

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Upload to knowledge base ({}) ", store));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("File path. Enter to upload, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let input = Paragraph::new(app.upload.path_input.as_str()).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    if inner.width > 0 {
        let col = (Span::raw(app.upload.path_input.as_str()).width() as u16).min(inner.width - 1);
        frame.set_cursor_position((input_area.x + col, input_area.y));
    }
}

fn render_uploading(app: &App, frame: &mut Frame, area: Rect) {
    const SPINNER: [&str; 3] = ["◐", "◓", "◑"];

    let popup_area = centered_rect(40, 3, area);
    frame.render_widget(Clear, popup_area);

    let spinner = SPINNER[app.animation_frame as usize % SPINNER.len()];
    let body = Paragraph::new(format!("{} Uploading file, please wait…", spinner))
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
    frame.render_widget(body, popup_area);
}

fn render_toast(feedback: &str, frame: &mut Frame, area: Rect) {
    let width = (Span::raw(feedback).width() as u16).saturating_add(12);
    let toast_width = width.min(area.width.saturating_sub(4)).max(1);
    let x = area.x + (area.width.saturating_sub(toast_width)) / 2;
    let y = (area.y + area.height).saturating_sub(4).max(area.y);
    let toast_area = Rect::new(x, y, toast_width, 3.min(area.height));

    frame.render_widget(Clear, toast_area);
    let line = Line::from(vec![
        Span::raw(feedback.to_string()),
        Span::styled("  Esc ✕", Style::default().fg(Color::DarkGray)),
    ]);
    let toast = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    frame.render_widget(toast, toast_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use simplechat_core::{AskReply, Config};

    fn chat_app() -> App {
        App::new(Config {
            skip_login: true,
            ..Config::new()
        })
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_wrap_line_on_word_boundaries() {
        let line = Line::from(vec![
            Span::raw(" hello "),
            Span::styled("world", Style::default().fg(Color::Cyan)),
            Span::raw(" foo"),
        ]);
        let rows = wrap_line(line, 12);
        assert_eq!(plain(&rows), vec![" hello world", "foo"]);
        assert_eq!(rows[0].spans[1].style.fg, Some(Color::Cyan));
    }

    #[test]
    fn test_wrap_line_splits_long_words() {
        let rows = wrap_line(Line::from("ab abcdefghij"), 4);
        assert_eq!(plain(&rows), vec!["ab", "abcd", "efgh", "ij"]);
        assert!(rows.iter().all(|row| row.width() <= 4));
    }

    #[test]
    fn test_wrap_line_wide_chars() {
        let rows = wrap_line(Line::from("你好世界"), 5);
        assert_eq!(plain(&rows), vec!["你好", "世界"]);
    }

    #[test]
    fn test_auto_scroll_shows_end_of_long_reply() {
        let mut app = chat_app();
        let mut reply: Vec<String> = (0..120).map(|n| format!("wordy{:03}", n)).collect();
        reply.push("ENDMARK".to_string());

        app.conversation.begin_turn("hi").unwrap();
        app.conversation.finish_turn(AskReply::text(reply.join(" ")));
        app.enable_auto_scroll();

        let mut terminal = Terminal::new(TestBackend::new(30, 16)).unwrap();
        for _ in 0..2 {
            terminal.draw(|frame| render(&mut app, frame)).unwrap();
        }
        let buffer = terminal.backend().buffer().clone();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();

        assert!(app.chat_max_scroll > 0);
        assert_eq!(app.scroll, app.chat_max_scroll);
        assert!(screen.contains("wordy119"));
        assert!(screen.contains("ENDMARK"));
    }

    #[test]
    fn test_renders_greeting_and_status() {
        let mut app = chat_app();
        app.set_health(Ok("ok".to_string()));
        let screen = draw(&mut app);
        assert!(screen.contains("backend: ok"));
        assert!(screen.contains("assistant"));
        assert!(screen.contains("Welcome back"));
    }

    #[test]
    fn test_renders_thinking_placeholder() {
        let mut app = chat_app();
        app.conversation.begin_turn("hi").unwrap();
        let screen = draw(&mut app);
        assert!(screen.contains("Thinking."));
        assert!(screen.contains("Waiting for reply"));
    }

    #[test]
    fn test_renders_tool_call_heading() {
        let mut app = chat_app();
        app.conversation.begin_turn("hi").unwrap();
        app.conversation.finish_turn(AskReply {
            message: simplechat_core::ChatMessage::assistant("done"),
            tool_calls: vec![simplechat_core::ToolCall::default()],
        });
        let screen = draw(&mut app);
        assert!(screen.contains("Tool call 1"));
        assert!(screen.contains("(no output)"));
    }

    #[test]
    fn test_login_screen_masks_password() {
        let mut app = App::new(Config::new());
        app.login.username = "ada".to_string();
        app.login.password = "secret".to_string();
        let screen = draw(&mut app);
        assert!(screen.contains("Sign in"));
        assert!(screen.contains("ada"));
        assert!(screen.contains("••••••"));
        assert!(!screen.contains("secret"));
    }
}
