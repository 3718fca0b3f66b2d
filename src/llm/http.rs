//! HTTP chat backend
//!
//! POSTs the transcript to the chat endpoint and exposes the chunked
//! response body as a stream of text fragments.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use super::error::TransportError;
use super::streaming::Utf8Carry;
use super::types::ChatRequest;
use super::{ChatBackend, FragmentStream};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat service reachable over HTTP
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream, TransportError> {
        tracing::debug!(
            "POST {} with {} messages",
            self.endpoint,
            request.messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(TransportError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::from_http_status(status, error_text));
        }

        let body = Box::pin(response.bytes_stream());
        let fragments = futures::stream::unfold(
            Some((body, Utf8Carry::new())),
            |state| async move {
                let (mut body, mut carry) = state?;
                match body.next().await {
                    Some(Ok(chunk)) => Some((Ok(carry.push(&chunk)), Some((body, carry)))),
                    Some(Err(e)) => Some((Err(TransportError::from_network_error(e)), None)),
                    None => {
                        let rest = carry.finish();
                        if rest.is_empty() {
                            None
                        } else {
                            Some((Ok(rest), None))
                        }
                    }
                }
            },
        );

        Ok(fragments.boxed())
    }
}
