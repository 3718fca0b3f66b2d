//! HTTP execution backend

use std::time::Duration;

use async_trait::async_trait;

use super::{ExecutionBackend, ExecutionRequest, ExecutionResponse};
use crate::llm::TransportError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Execution sandbox reachable over HTTP
#[derive(Debug, Clone)]
pub struct HttpExecutionBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExecutionBackend {
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
impl ExecutionBackend for HttpExecutionBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(TransportError::from_network_error)?;

        // any non-success status is a transport failure, even when the body
        // carries a `success: false` verdict
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::from_http_status(status, error_text));
        }

        let body = response
            .text()
            .await
            .map_err(TransportError::from_network_error)?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
