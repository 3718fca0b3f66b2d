//! Execution dispatch
//!
//! Sends a finalized code block's source to the remote execution sandbox and
//! turns the reply into an outcome that the controller renders as a
//! non-history message.

mod http;

pub use http::HttpExecutionBackend;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::SandboxError;
use crate::core::types::{CodeBlock, CodeBlockState};
use crate::llm::TransportError;

/// Body of an execution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
}

/// Reply of the execution service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Trait for code execution services
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Run the code and report the service's verdict
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResponse, TransportError>;
}

/// How one execution ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded { output: String },
    /// The sandbox ran the code and reported failure
    Failed(SandboxError),
    /// The request never produced a verdict
    TransportFailed(TransportError),
}

impl ExecutionOutcome {
    pub fn from_result(result: Result<ExecutionResponse, TransportError>) -> Self {
        match result {
            Ok(response) if response.success => Self::Succeeded {
                output: response.output.unwrap_or_default(),
            },
            Ok(response) => Self::Failed(SandboxError(
                response
                    .error
                    .unwrap_or_else(|| "Unknown error occurred.".to_string()),
            )),
            Err(err) => Self::TransportFailed(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// State the originating block ends up in
    pub fn block_state(&self) -> CodeBlockState {
        if self.is_success() {
            CodeBlockState::Succeeded
        } else {
            CodeBlockState::Failed
        }
    }

    /// Markdown for the result message
    ///
    /// Transport failures use locally generated text, never service output.
    pub fn to_markdown(&self) -> String {
        match self {
            Self::Succeeded { output } => {
                format!("```\nExecution result:\n{}\n```", output.trim_end())
            }
            Self::Failed(SandboxError(error)) => format!("```\nError:\n{}\n```", error.trim_end()),
            Self::TransportFailed(err) => {
                let reason = match err.status() {
                    Some(status) => format!("HTTP error! status: {}", status),
                    None => err.to_string(),
                };
                format!("```\nError executing code: {}\n```", reason)
            }
        }
    }
}

/// Dispatches code blocks to an execution backend
///
/// Executions are independent: any number may be outstanding at once, each
/// touching only its own block.
#[derive(Clone)]
pub struct ExecutionDispatcher {
    backend: Arc<dyn ExecutionBackend>,
}

impl std::fmt::Debug for ExecutionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionDispatcher")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl ExecutionDispatcher {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }

    /// Mark the block running and return the request future
    ///
    /// The future owns everything it needs, so the caller can spawn it and
    /// apply the outcome with [`ExecutionDispatcher::settle`] when it resolves.
    pub fn execute(&self, block: &mut CodeBlock) -> impl Future<Output = ExecutionOutcome> + Send + 'static {
        block.state = CodeBlockState::Running;
        let request = ExecutionRequest {
            code: block.trimmed_source().to_string(),
        };
        let backend = Arc::clone(&self.backend);

        tracing::info!(
            "Executing block {} ({} bytes) via {}",
            block.index,
            request.code.len(),
            backend.name()
        );

        async move {
            let outcome = ExecutionOutcome::from_result(backend.execute(request).await);
            match &outcome {
                ExecutionOutcome::Succeeded { .. } => tracing::debug!("Execution succeeded"),
                ExecutionOutcome::Failed(e) => tracing::debug!("{}", e),
                ExecutionOutcome::TransportFailed(e) => {
                    tracing::warn!("Execution request failed: {}", e)
                }
            }
            outcome
        }
    }

    /// Apply a finished execution to its block
    pub fn settle(block: &mut CodeBlock, outcome: &ExecutionOutcome) {
        block.state = outcome.block_state();
    }
}
