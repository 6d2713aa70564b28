//! Service-layer error types.
//!
//! `ServiceError` is transport-agnostic. The HTTP crate maps it to status
//! codes and JSON error bodies.

use std::time::Instant;

use crate::validate::ValidationFailure;

/// Machine-readable rejection kind, stable across transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    RateLimit,
    Duplicate,
    Security,
    AiError,
    ServerError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Validation,
        ErrorKind::RateLimit,
        ErrorKind::Duplicate,
        ErrorKind::Security,
        ErrorKind::AiError,
        ErrorKind::ServerError,
    ];

    /// Wire name used in the `type` field of error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::RateLimit => "rate_limit",
            Self::Duplicate => "duplicate",
            Self::Security => "security",
            Self::AiError => "ai_error",
            Self::ServerError => "server_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search pipeline rejection.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or suspicious input.
    #[error("{0}")]
    Validation(#[from] ValidationFailure),

    /// Quota exceeded or temporarily blocked.
    #[error("{}", rate_limit_message(.is_blocked))]
    RateLimited {
        reset_at: Instant,
        is_blocked: bool,
        remaining: u64,
    },

    /// Near-identical resubmission of a recent query.
    #[error("similar query was recently submitted, please try a different search")]
    Duplicate,

    /// Human verification failed.
    #[error("security verification failed, please try again")]
    Security,

    /// Upstream completion failed or timed out.
    #[error("AI service temporarily unavailable: {0}")]
    Ai(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn rate_limit_message(is_blocked: &bool) -> &'static str {
    if *is_blocked {
        "too many requests, you have been temporarily blocked"
    } else {
        "rate limit exceeded, please wait before making another request"
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Duplicate => ErrorKind::Duplicate,
            Self::Security => ErrorKind::Security,
            Self::Ai(_) => ErrorKind::AiError,
            Self::Internal(_) => ErrorKind::ServerError,
        }
    }
}
