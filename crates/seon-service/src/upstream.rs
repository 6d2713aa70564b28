//! Outbound collaborators the search pipeline depends on.
//!
//! Implementations live in `seon-upstream`; tests substitute in-process
//! fakes.

use crate::types::{CompletionRequest, SelectionResult, Verification};

/// Failure talking to an upstream service.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Connection, TLS or body transfer failure.
    #[error("upstream request failed: {0}")]
    Http(String),

    /// Upstream answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Upstream answered with content that does not fit the expected shape.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("upstream request timed out")]
    Timeout,
}

/// Selects the candidate files relevant to a query.
#[async_trait::async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<SelectionResult, UpstreamError>;
}

/// Checks a client-supplied human-verification token.
#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Verification, UpstreamError>;
}
