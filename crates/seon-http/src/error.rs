//! Mapping of pipeline rejections onto HTTP responses.

use std::any::Any;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use seon_service::error::{ErrorKind, ServiceError};

static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The request body could not be read as a search request.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable kind: validation, rate_limit, duplicate, security,
    /// ai_error or server_error.
    #[serde(rename = "type")]
    pub kind: String,
    /// When the rate-limit window or block ends, in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_blocked: Option<bool>,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Service(e) => e.kind(),
            Self::InvalidBody(_) => ErrorKind::Validation,
        }
    }

    /// Message sent to the client. Upstream and internal details stay in logs.
    fn client_message(&self) -> String {
        match self {
            Self::Service(ServiceError::Ai(_)) => {
                "AI service temporarily unavailable, please try again later".to_string()
            }
            Self::Service(ServiceError::Internal(_)) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::RateLimit | ErrorKind::Duplicate => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Security => StatusCode::FORBIDDEN,
        ErrorKind::AiError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let mut body = ErrorBody {
            error: self.client_message(),
            kind: kind.as_str().to_string(),
            reset_time: None,
            is_blocked: None,
        };
        let mut headers = HeaderMap::new();

        match &self {
            Self::Service(ServiceError::RateLimited {
                reset_at,
                is_blocked,
                remaining,
            }) => {
                let reset_ms = epoch_millis(*reset_at, Instant::now(), SystemTime::now());
                body.reset_time = Some(reset_ms);
                body.is_blocked = Some(*is_blocked);
                headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(*remaining));
                headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(reset_ms));
                headers.insert(
                    RETRY_AFTER,
                    HeaderValue::from(retry_after_secs(reset_at.saturating_duration_since(
                        Instant::now(),
                    ))),
                );
            }
            Self::Service(ServiceError::Internal(msg)) => {
                tracing::error!(%msg, "internal server error");
            }
            _ => {}
        }

        (status_for(kind), headers, Json(body)).into_response()
    }
}

/// Converts a monotonic deadline to wall-clock epoch milliseconds.
fn epoch_millis(at: Instant, now: Instant, wall_now: SystemTime) -> u64 {
    let wall = if at >= now {
        wall_now.checked_add(at - now)
    } else {
        wall_now.checked_sub(now - at)
    };
    match wall {
        Some(wall) => wall
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        None => u64::MAX,
    }
}

/// Whole seconds until `wait` elapses, rounded up.
fn retry_after_secs(wait: Duration) -> u64 {
    u64::try_from(wait.as_millis().div_ceil(1000)).unwrap_or(u64::MAX)
}

/// Response for a handler panic, installed via `CatchPanicLayer`.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    ApiError::from(ServiceError::Internal(format!("handler panicked: {detail}"))).into_response()
}
