//! Markdown to styled terminal lines.
//!
//! Messages are re-rendered on every streamed chunk, so the input is often
//! incomplete markdown (an open code fence, half a table). pulldown-cmark
//! tolerates that; this module only has to keep its own block stack
//! balanced, which it does by pairing every `End` with the last `Start`.

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;

/// What an `End` event closes
enum Open {
    Paragraph,
    Heading,
    Quote,
    CodeBlock,
    List,
    Item,
    Inline,
    Link(String),
    Table,
    TableHead,
    TableRow,
    TableCell,
    Other,
}

struct ListLevel {
    next_number: Option<u64>,
    indent: usize,
}

struct Renderer {
    base: Style,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    open: Vec<Open>,
    styles: Vec<Style>,
    lists: Vec<ListLevel>,
    pending_marker: Option<String>,
    quote_depth: usize,
    in_code_block: bool,
    table_row: Vec<String>,
    table_cell: Option<String>,
}

/// Render markdown text into lines styled on top of `base`.
pub fn render_markdown(text: &str, base: Style) -> Vec<Line<'static>> {
    let text = sanitize(text);
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::new(base);
    for event in Parser::new_ext(&text, options) {
        renderer.handle(event);
    }
    renderer.finish()
}

/// Strip ANSI escape sequences and control characters the backend might
/// relay from tool output. Tabs become four spaces.
pub fn sanitize(text: &str) -> String {
    static ESCAPES: OnceLock<Regex> = OnceLock::new();
    let escapes = ESCAPES.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07|[\x00-\x08\x0b-\x1f\x7f]")
            .expect("escape pattern is valid")
    });
    escapes.replace_all(text, "").replace('\t', "    ")
}

fn code_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn heading_style(level: HeadingLevel) -> Style {
    let style = Style::default().add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => style.fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
        HeadingLevel::H2 => style.fg(Color::Cyan),
        _ => style,
    }
}

impl Renderer {
    fn new(base: Style) -> Self {
        Self {
            base,
            lines: Vec::new(),
            current: Vec::new(),
            open: Vec::new(),
            styles: vec![base],
            lists: Vec::new(),
            pending_marker: None,
            quote_depth: 0,
            in_code_block: false,
            table_row: Vec::new(),
            table_cell: None,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or(self.base)
    }

    fn push_style(&mut self, patch: Style) {
        let style = self.style().patch(patch);
        self.styles.push(style);
        self.open.push(Open::Inline);
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if let Some(cell) = self.table_cell.as_mut() {
                    cell.push_str(&code);
                } else {
                    self.current
                        .push(Span::styled(code.into_string(), self.style().patch(code_style())));
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.lines.push(Line::from(Span::styled("─".repeat(24), dim())));
                self.blank();
            }
            Event::TaskListMarker(checked) => {
                let mark = if checked { "[x] " } else { "[ ] " };
                if let Some(marker) = self.pending_marker.as_mut() {
                    marker.push_str(mark);
                } else {
                    self.current.push(Span::styled(mark, self.style()));
                }
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph | Tag::HtmlBlock => self.open.push(Open::Paragraph),
            Tag::Heading { level, .. } => {
                self.flush_line();
                self.styles.push(self.style().patch(heading_style(level)));
                self.open.push(Open::Heading);
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
                self.open.push(Open::Quote);
            }
            Tag::CodeBlock(kind) => {
                self.flush_line();
                if let CodeBlockKind::Fenced(lang) = kind {
                    let lang = lang.split_whitespace().next().unwrap_or_default();
                    if !lang.is_empty() {
                        self.current.push(Span::styled(format!("┌ {}", lang), dim()));
                        self.flush_line();
                    }
                }
                self.in_code_block = true;
                self.open.push(Open::CodeBlock);
            }
            Tag::List(start) => {
                self.flush_line();
                self.lists.push(ListLevel {
                    next_number: start,
                    indent: 0,
                });
                self.open.push(Open::List);
            }
            Tag::Item => {
                self.flush_line();
                let marker = match self.lists.last_mut() {
                    Some(ListLevel {
                        next_number: Some(n),
                        indent,
                    }) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        *indent = marker.chars().count();
                        marker
                    }
                    Some(level) => {
                        level.indent = 2;
                        "• ".to_string()
                    }
                    None => "• ".to_string(),
                };
                self.pending_marker = Some(marker);
                self.open.push(Open::Item);
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                let style = self
                    .style()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::UNDERLINED);
                self.styles.push(style);
                self.open.push(Open::Link(dest_url.into_string()));
            }
            Tag::Table(_) => {
                self.flush_line();
                self.open.push(Open::Table);
            }
            Tag::TableHead => {
                self.table_row.clear();
                self.open.push(Open::TableHead);
            }
            Tag::TableRow => {
                self.table_row.clear();
                self.open.push(Open::TableRow);
            }
            Tag::TableCell => {
                self.table_cell = Some(String::new());
                self.open.push(Open::TableCell);
            }
            _ => self.open.push(Open::Other),
        }
    }

    fn end(&mut self) {
        let Some(open) = self.open.pop() else {
            return;
        };

        match open {
            Open::Paragraph => {
                self.flush_line();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Open::Heading => {
                self.flush_line();
                self.styles.pop();
                self.blank();
            }
            Open::Quote => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            Open::CodeBlock => {
                self.in_code_block = false;
                self.flush_line();
                self.blank();
            }
            Open::List => {
                self.flush_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Open::Item => self.flush_line(),
            Open::Inline => {
                self.styles.pop();
            }
            Open::Link(url) => {
                self.styles.pop();
                let shown: String = self.current.iter().map(|s| s.content.as_ref()).collect();
                if !url.is_empty() && !shown.ends_with(&url) {
                    self.current.push(Span::styled(format!(" ({})", url), dim()));
                }
            }
            Open::Table => self.blank(),
            Open::TableHead => {
                let widths: Vec<usize> = self.table_row.iter().map(|c| c.chars().count()).collect();
                self.push_table_row(Style::default().add_modifier(Modifier::BOLD));
                let rule = widths
                    .iter()
                    .map(|w| "─".repeat((*w).max(3)))
                    .collect::<Vec<_>>()
                    .join("─┼─");
                self.lines.push(Line::from(Span::styled(rule, dim())));
            }
            Open::TableRow => self.push_table_row(Style::default()),
            Open::TableCell => {
                if let Some(cell) = self.table_cell.take() {
                    self.table_row.push(cell.trim().to_string());
                }
            }
            Open::Other => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(cell) = self.table_cell.as_mut() {
            cell.push_str(&text.replace('\n', " "));
            return;
        }

        let (indent, style) = if self.in_code_block {
            ("  ", self.style().patch(code_style()))
        } else {
            ("", self.style())
        };

        // Embedded newlines (code, raw HTML) end the current line
        let mut segments = text.split('\n').peekable();
        while let Some(segment) = segments.next() {
            let is_last = segments.peek().is_none();
            if is_last && segment.is_empty() {
                break;
            }
            if self.in_code_block || !segment.is_empty() {
                self.current.push(Span::styled(format!("{}{}", indent, segment), style));
            }
            if !is_last {
                self.flush_line();
            }
        }
    }

    fn push_table_row(&mut self, style: Style) {
        let row = std::mem::take(&mut self.table_row).join(" │ ");
        self.current.push(Span::styled(row, self.base.patch(style)));
        self.flush_line();
    }

    fn prefix(&mut self) -> Vec<Span<'static>> {
        let mut spans = Vec::new();
        if self.quote_depth > 0 {
            spans.push(Span::styled("│ ".repeat(self.quote_depth), dim()));
        }
        if !self.lists.is_empty() {
            let outer: usize = self.lists[..self.lists.len() - 1]
                .iter()
                .map(|level| level.indent.max(2))
                .sum();
            match self.pending_marker.take() {
                Some(marker) => {
                    spans.push(Span::raw(" ".repeat(outer)));
                    spans.push(Span::styled(marker, self.base.fg(Color::Cyan)));
                }
                None => {
                    let own = self.lists.last().map(|level| level.indent).unwrap_or(0);
                    spans.push(Span::raw(" ".repeat(outer + own)));
                }
            }
        }
        spans
    }

    fn flush_line(&mut self) {
        if self.current.is_empty() && self.pending_marker.is_none() {
            return;
        }
        let mut spans = self.prefix();
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn render(text: &str) -> Vec<Line<'static>> {
        render_markdown(text, Style::default())
    }

    #[test]
    fn test_paragraphs_separated_by_blank_line() {
        let lines = render("first paragraph\n\nsecond one");
        assert_eq!(plain(&lines), vec!["first paragraph", "", "second one"]);
    }

    #[test]
    fn test_bold_and_inline_code() {
        let lines = render("use **cargo** and `rustc`");
        assert_eq!(lines.len(), 1);
        let bold = lines[0].spans.iter().find(|s| s.content == "cargo").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        let code = lines[0].spans.iter().find(|s| s.content == "rustc").unwrap();
        assert_eq!(code.style.fg, Some(Color::Yellow));
    }

    #[test]
    fn test_heading_style() {
        let lines = render("# Title\nbody");
        assert_eq!(plain(&lines)[0], "Title");
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(plain(&lines)[2], "body");
    }

    #[test]
    fn test_fenced_code_block() {
        let lines = render("```rust\nfn main() {}\nlet x = 1;\n```\nafter");
        assert_eq!(
            plain(&lines),
            vec!["┌ rust", "  fn main() {}", "  let x = 1;", "", "after"]
        );
    }

    #[test]
    fn test_unterminated_fence_while_streaming() {
        let lines = render("Here you go:\n\n```python\nprint(1)\nprint(");
        let text = plain(&lines);
        assert_eq!(text.last().unwrap(), "  print(");
    }

    #[test]
    fn test_lists() {
        let lines = render("- one\n- two\n  1. nested\n\n3. three");
        let text = plain(&lines);
        assert_eq!(text[0], "• one");
        assert_eq!(text[1], "• two");
        assert_eq!(text[2], "  1. nested");
        assert!(text.contains(&"3. three".to_string()));
    }

    #[test]
    fn test_task_list() {
        let lines = render("- [x] done\n- [ ] todo");
        assert_eq!(plain(&lines), vec!["• [x] done", "• [ ] todo"]);
    }

    #[test]
    fn test_blockquote_prefix() {
        let lines = render("> quoted");
        assert_eq!(plain(&lines), vec!["│ quoted"]);
    }

    #[test]
    fn test_table() {
        let lines = render("| a | b |\n|---|---|\n| 1 | 2 |");
        let text = plain(&lines);
        assert_eq!(text[0], "a │ b");
        assert!(text[1].contains('┼'));
        assert_eq!(text[2], "1 │ 2");
    }

    #[test]
    fn test_link_shows_url() {
        let lines = render("see [docs](https://example.com)");
        assert_eq!(plain(&lines), vec!["see docs (https://example.com)"]);
    }

    #[test]
    fn test_html_block_split_into_lines() {
        let lines = render("<div>\n<b>hi</b>\n</div>\n\nafter");
        let text = plain(&lines);
        assert!(text.iter().all(|line| !line.contains('\n')));
        assert_eq!(text, vec!["<div>", "<b>hi</b>", "</div>", "", "after"]);
    }

    #[test]
    fn test_sanitize_strips_escapes() {
        assert_eq!(sanitize("\x1b[31mred\x1b[0m\tok"), "red    ok");
    }

    #[test]
    fn test_empty_input() {
        assert!(render("").is_empty());
    }
}
