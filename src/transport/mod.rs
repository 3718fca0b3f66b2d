//! Transport layer for terminal interaction

pub mod cli;
