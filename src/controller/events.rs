//! Session Events
//!
//! Events sent from the session controller to the front-end.

use crate::core::transcript::ReplyOutcome;
use crate::core::types::{BlockRef, CodeBlock, CodeBlockState, Message, MessageId};
use crate::render::RenderTree;

/// Events emitted by the controller
///
/// These are sent asynchronously via an mpsc channel so a front-end can
/// redraw while replies stream and executions run.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    // ========== Chat Events ==========
    /// A user message was appended to history
    UserMessage { id: MessageId, text: String },

    /// Input was queued behind the in-flight exchange
    Queued { text: String, position: usize },

    /// The assistant placeholder was opened and the request sent
    ExchangeStarted { id: MessageId },

    /// Text received for the open reply
    Delta { id: MessageId, text: String },

    /// The open reply was re-rendered from its accumulated content
    Rendered { id: MessageId, tree: RenderTree },

    /// The reply is final and its code blocks are addressable
    Finalized {
        id: MessageId,
        tree: RenderTree,
        blocks: Vec<CodeBlock>,
    },

    /// The exchange is over; the next queued send (if any) follows
    ExchangeSettled { id: MessageId, reply: ReplyOutcome },

    // ========== Code Block Events ==========
    /// A code block changed state (copy feedback, running, done)
    BlockState {
        block: BlockRef,
        state: CodeBlockState,
    },

    /// Result of an execution, rendered but not part of the history
    ExecutionResult {
        block: BlockRef,
        success: bool,
        tree: RenderTree,
    },

    // ========== Status Events ==========
    /// The conversation history, in order (answers `Intent::History`)
    History(Vec<Message>),

    /// Ephemeral notice, not part of the history
    Notice { text: String, tree: RenderTree },

    /// An intent could not be carried out
    Error(String),
}
