//! Seon Upstream: HTTP clients for the services the AI search calls out to.
//!
//! - [`GeminiCompletion`]: file selection via a Gemini `generateContent`
//!   endpoint with a JSON response schema.
//! - [`RecaptchaVerifier`]: token check against a reCAPTCHA-style
//!   `siteverify` endpoint.
//!
//! Both implement the collaborator traits from `seon_service::upstream`.

pub mod gemini;
pub mod recaptcha;

use std::time::Duration;

use seon_service::upstream::UpstreamError;

pub use gemini::{GeminiCompletion, GeminiConfig};
pub use recaptcha::{RecaptchaConfig, RecaptchaVerifier};

/// Builds the shared HTTP client with a per-request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("seon-server/", env!("CARGO_PKG_VERSION")));
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| UpstreamError::Http(e.to_string()))
}

/// Joins an endpoint path onto a base URL regardless of trailing slashes.
pub(crate) fn endpoint(base: &url::Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'))
}

pub(crate) fn map_send_error(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Http(e.to_string())
    }
}

/// Turns a non-success response into `UpstreamError::Status`.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
) -> Result<reqwest::Response, UpstreamError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_handles_slashes() {
        let base = url::Url::parse("http://localhost:8080").unwrap();
        assert_eq!(endpoint(&base, "/v1/x"), "http://localhost:8080/v1/x");

        let base = url::Url::parse("http://localhost:8080/proxy/").unwrap();
        assert_eq!(endpoint(&base, "v1/x"), "http://localhost:8080/proxy/v1/x");
    }
}
