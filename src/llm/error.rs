//! Typed transport errors for the remote services
//!
//! Covers every network or status failure on either the chat path or the
//! execution path. None of these are retried: each one is terminal for the
//! single operation that raised it.

use thiserror::Error;

/// Network/status failure talking to the chat or execution service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout, ...
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body broke off mid-stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// The response body could not be decoded into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),
}

impl TransportError {
    /// Convert HTTP status code and error text into a typed error
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        TransportError::Status {
            status: status.as_u16(),
            body: error_text,
        }
    }

    /// Convert reqwest failures into a typed error
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            TransportError::Network(format!("Connection failed: {}", e))
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if e.is_body() {
            TransportError::Stream(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }

    /// HTTP status, when the failure came from one
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
