//! Correlation IDs for search traffic.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Longest client-supplied ID that is echoed back.
const MAX_ID_LEN: usize = 128;

/// Tags each request with an `X-Request-Id` and logs it under that ID.
///
/// The search endpoint is public, so a caller's ID is only reused when it is
/// short visible ASCII. Anything else is replaced with a UUID v4. Rejections
/// logged by the pipeline carry `request_id`, `method` and `path` from the
/// enclosing span, and the client sees the same ID on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| is_acceptable_id(v))
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    let value = HeaderValue::from_str(&request_id).ok();
    if let Some(val) = &value {
        req.headers_mut().insert(X_REQUEST_ID.clone(), val.clone());
    }

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut response = next.run(req).instrument(span).await;

    if let Some(val) = value {
        response.headers_mut().insert(X_REQUEST_ID.clone(), val);
    }

    response
}

fn is_acceptable_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LEN && id.bytes().all(|b| b.is_ascii_graphic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_ids_are_screened() {
        assert!(is_acceptable_id("abc-123"));
        assert!(is_acceptable_id(&"a".repeat(MAX_ID_LEN)));
        assert!(!is_acceptable_id(""));
        assert!(!is_acceptable_id(&"a".repeat(MAX_ID_LEN + 1)));
        assert!(!is_acceptable_id("two words"));
    }
}
