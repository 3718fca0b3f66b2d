//! Syntax highlighting for code nodes

use once_cell::sync::Lazy;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// Syntax highlighter for code blocks
pub struct Highlighter {
    theme: Theme,
    background: Color,
}

impl std::fmt::Debug for Highlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Highlighter")
            .field("theme", &self.theme.name)
            .finish()
    }
}

impl Highlighter {
    /// Create a highlighter for a bundled theme, falling back to any bundled theme
    pub fn new(theme_name: &str, background: Color) -> Self {
        let theme = THEME_SET
            .themes
            .get(theme_name)
            .or_else(|| THEME_SET.themes.values().next())
            .cloned()
            .unwrap_or_default();
        Self { theme, background }
    }

    fn syntax_for(&self, code: &str, lang: Option<&str>) -> &'static SyntaxReference {
        let set: &'static SyntaxSet = &SYNTAX_SET;
        lang.and_then(|lang| {
            set.find_syntax_by_token(lang)
                .or_else(|| set.find_syntax_by_name(lang))
                .or_else(|| set.find_syntax_by_extension(lang))
        })
        .or_else(|| code.lines().next().and_then(|first| set.find_syntax_by_first_line(first)))
        .unwrap_or_else(|| set.find_syntax_plain_text())
    }

    /// Highlight a code block, one output line per source line
    pub fn highlight(&self, code: &str, lang: Option<&str>) -> Vec<Line<'static>> {
        let syntax = self.syntax_for(code, lang);
        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        let plain = Style::default().bg(self.background);

        LinesWithEndings::from(code)
            .map(|line| {
                let spans = match highlighter.highlight_line(line, &SYNTAX_SET) {
                    Ok(ranges) => ranges
                        .into_iter()
                        .filter_map(|(style, text)| {
                            let text = text.trim_end_matches(['\n', '\r']);
                            (!text.is_empty()).then(|| {
                                let fg = style.foreground;
                                Span::styled(text.to_string(), plain.fg(Color::Rgb(fg.r, fg.g, fg.b)))
                            })
                        })
                        .collect(),
                    Err(e) => {
                        tracing::debug!("Highlighting failed, rendering plain: {}", e);
                        vec![Span::styled(
                            line.trim_end_matches(['\n', '\r']).to_string(),
                            plain,
                        )]
                    }
                };
                Line::from(spans)
            })
            .collect()
    }
}
