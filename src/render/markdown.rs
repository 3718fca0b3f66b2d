//! Markdown to render tree
//!
//! Converts markdown text into prose nodes (styled ratatui Lines) and code
//! nodes (raw source plus highlighted lines), preserving document order.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use super::highlight::Highlighter;
use super::palette::Palette;
use super::{CodeNode, RenderNode, RenderTree};

/// Code block being collected between its start and end events
struct OpenCode {
    lang: Option<String>,
    source: String,
}

struct TreeBuilder<'a> {
    palette: &'a Palette,
    highlighter: &'a Highlighter,
    nodes: Vec<RenderNode>,
    lines: Vec<Line<'static>>,
    current_spans: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    code: Option<OpenCode>,
}

impl<'a> TreeBuilder<'a> {
    fn new(palette: &'a Palette, highlighter: &'a Highlighter) -> Self {
        Self {
            palette,
            highlighter,
            nodes: Vec::new(),
            lines: Vec::new(),
            current_spans: Vec::new(),
            style_stack: vec![Style::default().fg(palette.text)],
            code: None,
        }
    }

    fn style(&self) -> Style {
        self.style_stack.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, f: impl FnOnce(Style) -> Style) {
        let style = f(self.style());
        self.style_stack.push(style);
    }

    fn pop_style(&mut self) {
        if self.style_stack.len() > 1 {
            self.style_stack.pop();
        }
    }

    fn break_line(&mut self) {
        if !self.current_spans.is_empty() {
            self.lines
                .push(Line::from(std::mem::take(&mut self.current_spans)));
        }
    }

    /// Close the prose node being built, if it has any content
    fn flush_prose(&mut self) {
        self.break_line();
        while self
            .lines
            .last()
            .is_some_and(|l| l.spans.iter().all(|s| s.content.is_empty()))
        {
            self.lines.pop();
        }
        if !self.lines.is_empty() {
            self.nodes
                .push(RenderNode::Prose(std::mem::take(&mut self.lines)));
        }
        self.lines.clear();
    }

    fn close_code(&mut self) {
        if let Some(open) = self.code.take() {
            let lines = self.highlighter.highlight(&open.source, open.lang.as_deref());
            self.nodes.push(RenderNode::Code(CodeNode {
                lang: open.lang,
                source: open.source,
                lines,
                affordance: None,
            }));
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        if let Some(open) = self.code.as_mut() {
            match event {
                Event::Text(text) => open.source.push_str(&text),
                Event::End(TagEnd::CodeBlock) => self.close_code(),
                _ => {}
            }
            return;
        }

        match event {
            Event::Text(text) => {
                let style = self.style();
                self.current_spans.push(Span::styled(text.to_string(), style));
            }
            Event::Code(code) => {
                self.current_spans.push(Span::styled(
                    format!("`{}`", code),
                    Style::default().fg(self.palette.accent).bg(self.palette.bg_code),
                ));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush_prose();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(OpenCode {
                    lang,
                    source: String::new(),
                });
            }
            Event::Start(Tag::Strong) => self.push_style(|s| s.add_modifier(Modifier::BOLD)),
            Event::Start(Tag::Emphasis) => self.push_style(|s| s.add_modifier(Modifier::ITALIC)),
            Event::Start(Tag::Strikethrough) => {
                self.push_style(|s| s.add_modifier(Modifier::CROSSED_OUT))
            }
            Event::Start(Tag::Link { .. }) => {
                let accent = self.palette.accent;
                self.push_style(|s| s.fg(accent).add_modifier(Modifier::UNDERLINED))
            }
            Event::Start(Tag::Heading { .. }) => {
                let accent = self.palette.accent;
                self.push_style(|s| s.fg(accent).add_modifier(Modifier::BOLD))
            }
            Event::End(TagEnd::Strong)
            | Event::End(TagEnd::Emphasis)
            | Event::End(TagEnd::Strikethrough)
            | Event::End(TagEnd::Link) => self.pop_style(),
            Event::End(TagEnd::Heading { .. }) => {
                self.pop_style();
                self.break_line();
                self.lines.push(Line::from(""));
            }
            Event::Start(Tag::Item) => {
                self.current_spans
                    .push(Span::styled("• ", Style::default().fg(self.palette.accent)));
            }
            Event::End(TagEnd::Item) | Event::End(TagEnd::List(_)) => self.break_line(),
            Event::SoftBreak | Event::HardBreak => self.break_line(),
            Event::End(TagEnd::TableCell) => {
                self.current_spans
                    .push(Span::styled(" │ ", Style::default().fg(self.palette.muted)));
            }
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => self.break_line(),
            Event::End(TagEnd::Paragraph) => {
                self.break_line();
                self.lines.push(Line::from(""));
            }
            Event::InlineHtml(html) => {
                let style = self.style();
                self.current_spans.push(Span::styled(html.to_string(), style));
            }
            Event::Html(html) => {
                let style = self.style();
                for line in html.lines() {
                    self.current_spans
                        .push(Span::styled(line.to_string(), style));
                    self.break_line();
                }
            }
            Event::Rule => {
                self.break_line();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(self.palette.muted),
                )));
            }
            _ => {}
        }
    }

    fn finish(mut self) -> RenderTree {
        // an unterminated fence while streaming still yields a code node
        self.close_code();
        self.flush_prose();
        RenderTree { nodes: self.nodes }
    }
}

/// Render markdown text into a render tree
///
/// Supports:
/// - **Bold**, *italic* and ~~struck~~ text
/// - `Inline code`
/// - Fenced and indented code blocks, highlighted by language hint
/// - Bullet lists, headings, links
pub fn render_markdown(text: &str, palette: &Palette, highlighter: &Highlighter) -> RenderTree {
    let mut options = pulldown_cmark::Options::empty();
    options.insert(pulldown_cmark::Options::ENABLE_STRIKETHROUGH);
    options.insert(pulldown_cmark::Options::ENABLE_TABLES);

    let mut builder = TreeBuilder::new(palette, highlighter);
    for event in Parser::new_ext(text, options) {
        builder.handle(event);
    }
    builder.finish()
}
