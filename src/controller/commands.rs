//! User Intents
//!
//! Actions a front-end can ask the session controller to perform.

use crate::core::types::{BlockRef, MessageId};

/// Which code block an intent addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTarget {
    /// Block `index` of the most recently finalized assistant message
    Latest(usize),
    /// Block `index` of a specific message
    Exact(BlockRef),
}

impl BlockTarget {
    pub fn in_message(message: MessageId, index: usize) -> Self {
        Self::Exact(BlockRef::new(message, index))
    }
}

/// User intents handled by the session controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Submit chat input (queued while an exchange is in flight)
    Send(String),

    /// Copy a finalized code block to the clipboard
    Copy(BlockTarget),

    /// Run a finalized code block in the execution sandbox
    Execute(BlockTarget),

    /// Emit the conversation history
    History,

    /// Stop once the in-flight exchange, the queue and any running
    /// executions have finished
    QuitWhenIdle,

    /// Stop the controller
    Quit,
}
