//! bota: terminal chat assistant that writes Python and runs it remotely
//!
//! This library provides:
//! - A single-flight chat session with a FIFO queue for later input
//! - Incremental decoding of the chat service's `data:` line stream
//! - Markdown rendering with syntax-highlighted, addressable code blocks
//! - Copy-to-clipboard and remote execution of finalized code blocks
//! - A line-oriented terminal front-end

pub mod clipboard;
pub mod config;
pub mod controller;
pub mod core;
pub mod llm;
pub mod render;
pub mod sandbox;
pub mod transport;

pub use config::Config;
pub use controller::{Intent, SessionController, SessionEvent};
