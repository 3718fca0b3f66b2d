//! Domain error types
//!
//! These errors represent session-level failures, distinct from the transport
//! errors raised while talking to the remote services (see `llm::error`).

use thiserror::Error;

use super::types::MessageId;

/// A line of the chat stream that carried the protocol marker but could not be
/// parsed as a structured record.
///
/// Recovered locally: the line is dropped, the error is kept as a decoder
/// diagnostic, and decoding continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed stream record ({reason}): {line}")]
pub struct ProtocolError {
    /// The offending line with the marker already stripped
    pub line: String,
    /// Parser message
    pub reason: String,
}

/// The execution service ran the code and reported `success: false`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Sandbox reported failure: {0}")]
pub struct SandboxError(pub String);

/// Platform clipboard failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClipboardError {
    /// No clipboard could be opened (headless session, missing display server)
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    /// The clipboard was opened but the write was rejected
    #[error("Clipboard write failed: {0}")]
    Write(String),
}

/// Errors raised when an intent addresses something that does not exist
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Unknown message: {0}")]
    UnknownMessage(MessageId),

    #[error("Message {message} has no code block {index}")]
    UnknownBlock { message: MessageId, index: usize },

    #[error("Message {0} is still streaming")]
    NotFinalized(MessageId),

    #[error("No finalized message to address")]
    NothingFinalized,
}
