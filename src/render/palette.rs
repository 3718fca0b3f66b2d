//! Colors used by the renderer

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// Light or dark rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeKind {
    #[default]
    Dark,
    Light,
}

impl std::str::FromStr for ThemeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(format!("Unknown theme '{}' (expected dark or light)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub bg_code: Color,
    pub success: Color,
    pub error: Color,
    /// Name of the bundled syntect theme used for code
    pub syntax_theme: &'static str,
}

impl Palette {
    pub fn dark() -> Self {
        Self {
            text: Color::Rgb(205, 214, 244),
            muted: Color::Rgb(108, 112, 134),
            accent: Color::Rgb(137, 220, 235),
            bg_code: Color::Rgb(30, 30, 46),
            success: Color::Rgb(166, 227, 161),
            error: Color::Rgb(243, 139, 168),
            syntax_theme: "base16-ocean.dark",
        }
    }

    pub fn light() -> Self {
        Self {
            text: Color::Rgb(76, 79, 105),
            muted: Color::Rgb(140, 143, 161),
            accent: Color::Rgb(4, 165, 229),
            bg_code: Color::Rgb(239, 241, 245),
            success: Color::Rgb(64, 160, 43),
            error: Color::Rgb(210, 15, 57),
            syntax_theme: "InspiredGitHub",
        }
    }

    pub fn for_theme(kind: ThemeKind) -> Self {
        match kind {
            ThemeKind::Dark => Self::dark(),
            ThemeKind::Light => Self::light(),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::dark()
    }
}
