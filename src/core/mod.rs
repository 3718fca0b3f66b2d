//! Core domain modules
//!
//! Session-level types shared by the controller, renderer and front-ends.

pub mod errors;
pub mod transcript;
pub mod types;

pub use errors::{ClipboardError, ControllerError, ProtocolError, SandboxError};
pub use transcript::{EmptyReplyPolicy, Session};
pub use types::{BlockRef, CodeBlock, CodeBlockState, Message, MessageId, Role};
