//! Chat completion service client

mod error;
mod http;
pub mod streaming;
mod types;

pub use error::TransportError;
pub use http::HttpChatBackend;
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw text fragments of a chat response body, in arrival order
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;

/// Trait for chat completion services
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Send the transcript and open the streamed response body
    ///
    /// Fails before any fragment when the request cannot be sent or the
    /// service answers with a non-success status.
    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream, TransportError>;
}
