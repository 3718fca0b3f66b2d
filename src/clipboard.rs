//! Clipboard service
//!
//! Copies a code block's trimmed source to the system clipboard and drives
//! the block's copy feedback (`Copied!` / `Failed`), which reverts to idle
//! after a fixed delay. Has no effect on transcript or execution state.

use std::collections::HashMap;
use std::time::Duration;

use arboard::Clipboard;

use crate::core::errors::ClipboardError;
use crate::core::types::{BlockRef, CodeBlock, CodeBlockState};

/// Default time the copy feedback stays visible
pub const DEFAULT_FEEDBACK: Duration = Duration::from_millis(2000);

/// Destination for copied text
pub trait ClipboardSink: Send {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The platform clipboard, via `arboard`
///
/// A handle is opened per write so the service works in sessions where the
/// clipboard comes and goes (e.g. SSH with X forwarding).
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}

/// Handle for reverting one copy's feedback once its delay has elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyTicket {
    pub block: BlockRef,
    generation: u64,
    pub revert_after: Duration,
}

/// Copy feedback currently shown on a block
#[derive(Debug, Clone, Copy)]
struct Feedback {
    generation: u64,
    /// State the block returns to when the feedback ends
    restore: CodeBlockState,
}

/// Copies code blocks and tracks their feedback timers
pub struct ClipboardService {
    sink: Box<dyn ClipboardSink>,
    feedback: Duration,
    /// Latest copy per block; older tickets no longer revert anything
    pending: HashMap<BlockRef, Feedback>,
    next_generation: u64,
}

impl std::fmt::Debug for ClipboardService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardService")
            .field("feedback", &self.feedback)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ClipboardService {
    pub fn new(sink: Box<dyn ClipboardSink>, feedback: Duration) -> Self {
        Self {
            sink,
            feedback,
            pending: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Copy the block's trimmed source, setting `Copied` or `CopyFailed`
    ///
    /// The state the block had before the feedback (idle, or an execution
    /// state) is remembered and put back by [`ClipboardService::revert`].
    pub fn copy(&mut self, block_ref: BlockRef, block: &mut CodeBlock) -> CopyTicket {
        let restore = match self.pending.get(&block_ref) {
            Some(feedback) if block.state.is_copy_feedback() => feedback.restore,
            _ if block.state.is_copy_feedback() => CodeBlockState::Idle,
            _ => block.state,
        };

        match self.sink.set_text(block.trimmed_source()) {
            Ok(()) => {
                tracing::debug!("Copied block {} to clipboard", block_ref);
                block.state = CodeBlockState::Copied;
            }
            Err(e) => {
                tracing::warn!("Failed to copy block {}: {}", block_ref, e);
                block.state = CodeBlockState::CopyFailed;
            }
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        self.pending
            .insert(block_ref, Feedback { generation, restore });
        CopyTicket {
            block: block_ref,
            generation,
            revert_after: self.feedback,
        }
    }

    /// Revert the feedback of a copy whose delay has elapsed
    ///
    /// Returns whether the block changed. A ticket superseded by a later copy,
    /// or a block whose execution settled during the feedback, is left alone.
    pub fn revert(&mut self, ticket: CopyTicket, block: &mut CodeBlock) -> bool {
        let Some(feedback) = self.pending.get(&ticket.block).copied() else {
            return false;
        };
        if feedback.generation != ticket.generation {
            return false;
        }
        self.pending.remove(&ticket.block);

        if block.state.is_copy_feedback() {
            block.state = feedback.restore;
            true
        } else {
            false
        }
    }
}
