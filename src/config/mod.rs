//! Configuration management for bota

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::transcript::EmptyReplyPolicy;
use crate::render::ThemeKind;

/// System instruction sent as the first message of every session
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"Your name is "BOTA".
Your task is to answer with Python code that performs the task the user describes.
The code must run on the user's machine as-is: use absolute paths or environment
variables, and never leave placeholders such as '/path/to/file'. If you need
information you do not have, write code that discovers it.
If the user has not said clearly what to do, do not include any code; ask them to
clarify instead, and keep the conversation friendly.

When you do answer with code, use this format:

(what you are going to do, in simple words)
(the Python code, in a fenced code block)
"#;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub chat: ChatConfig,
    pub sandbox: SandboxConfig,
    pub clipboard: ClipboardConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Chat completion endpoint (streams `data:` lines)
    pub endpoint: String,
    /// Model instance name forwarded to the chat service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub system_prompt: String,
    /// Keep or drop assistant replies that streamed no content
    pub empty_reply: EmptyReplyPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/chat".to_string(),
            instance: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            empty_reply: EmptyReplyPolicy::Keep,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Code execution endpoint
    pub endpoint: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/execute".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClipboardConfig {
    /// How long copy feedback stays visible, in milliseconds
    pub feedback_ms: u64,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            feedback_ms: crate::clipboard::DEFAULT_FEEDBACK.as_millis() as u64,
        }
    }
}

impl ClipboardConfig {
    pub fn feedback(&self) -> Duration {
        Duration::from_millis(self.feedback_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub theme: ThemeKind,
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, defaulting when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "bota") {
            let config_dir = proj_dirs.config_dir();
            std::fs::create_dir_all(config_dir)?;
            Ok(config_dir.join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    /// Save configuration to default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
