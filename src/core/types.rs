//! Canonical type definitions for the session domain
//!
//! Single source of truth for the types shared by the transcript, the render
//! pipeline, the execution dispatcher and the controller.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Author of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of a transcript message
///
/// Ids are handed out by the session and are never reused, even when a
/// message is discarded from the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One entry of the conversation history
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: chrono::DateTime<Utc>,
}

impl Message {
    pub fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A user input waiting for the in-flight exchange to settle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub text: String,
}

/// UI state of one extracted code block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeBlockState {
    #[default]
    Idle,
    Copied,
    CopyFailed,
    Running,
    Succeeded,
    Failed,
}

impl CodeBlockState {
    /// Short label shown next to the block's affordances
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Copy | Run",
            Self::Copied => "Copied!",
            Self::CopyFailed => "Failed",
            Self::Running => "Running...",
            Self::Succeeded => "Done",
            Self::Failed => "Error",
        }
    }

    /// Copy feedback states revert to idle after the feedback delay
    pub fn is_copy_feedback(&self) -> bool {
        matches!(self, Self::Copied | Self::CopyFailed)
    }
}

/// Address of a code block: owning message plus its index within that message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub message: MessageId,
    pub index: usize,
}

impl BlockRef {
    pub fn new(message: MessageId, index: usize) -> Self {
        Self { message, index }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.message, self.index)
    }
}

/// A code fragment extracted from a finalized assistant message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Position in document order, assigned once at finalize
    pub index: usize,
    /// Fence info string, if any
    pub lang: Option<String>,
    pub source: String,
    pub state: CodeBlockState,
}

impl CodeBlock {
    pub fn new(index: usize, lang: Option<String>, source: impl Into<String>) -> Self {
        Self {
            index,
            lang,
            source: source.into(),
            state: CodeBlockState::Idle,
        }
    }

    /// Source text as it is copied or submitted for execution
    pub fn trimmed_source(&self) -> &str {
        self.source.trim()
    }
}
