//! Session controller
//!
//! Separates the chat session's orchestration from any particular front-end:
//! a front-end sends [`Intent`]s and redraws from [`SessionEvent`]s.

mod commands;
mod events;
mod service;

pub use commands::{BlockTarget, Intent};
pub use events::SessionEvent;
pub use service::{SessionController, CHAT_ERROR_NOTICE};
