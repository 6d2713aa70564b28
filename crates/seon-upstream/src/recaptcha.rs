//! Human-verification through a reCAPTCHA-style `siteverify` endpoint.

use serde::Deserialize;
use url::Url;

use seon_service::types::Verification;
use seon_service::upstream::{UpstreamError, Verifier};

use crate::{endpoint, ensure_success, map_send_error};

pub const DEFAULT_BASE_URL: &str = "https://www.google.com";
pub const DEFAULT_MIN_SCORE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct RecaptchaConfig {
    pub base_url: Url,
    pub secret: String,
    /// Lowest score accepted as human. Responses without a score fail.
    pub min_score: f64,
}

pub struct RecaptchaVerifier {
    client: reqwest::Client,
    config: RecaptchaConfig,
}

#[derive(Deserialize)]
struct SiteVerifyResponse {
    #[serde(default)]
    success: bool,
    score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl RecaptchaVerifier {
    pub fn new(client: reqwest::Client, config: RecaptchaConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl Verifier for RecaptchaVerifier {
    async fn verify(&self, token: &str) -> Result<Verification, UpstreamError> {
        let resp = self
            .client
            .post(endpoint(&self.config.base_url, "recaptcha/api/siteverify"))
            .form(&[("secret", self.config.secret.as_str()), ("response", token)])
            .send()
            .await
            .map_err(map_send_error)?;
        let resp = ensure_success(resp).await?;

        let body: SiteVerifyResponse = resp
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        if !body.error_codes.is_empty() {
            tracing::debug!(codes = ?body.error_codes, "siteverify reported errors");
        }

        let passes = body.score.is_some_and(|s| s >= self.config.min_score);
        Ok(Verification {
            success: body.success && passes,
            score: body.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn verifier_for(server: &MockServer) -> RecaptchaVerifier {
        RecaptchaVerifier::new(
            crate::http_client(Duration::from_secs(5)).unwrap(),
            RecaptchaConfig {
                base_url: Url::parse(&server.uri()).unwrap(),
                secret: "shh".to_string(),
                min_score: DEFAULT_MIN_SCORE,
            },
        )
    }

    async fn mount_reply(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/recaptcha/api/siteverify"))
            .and(body_string_contains("secret=shh"))
            .and(body_string_contains("response=tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn accepts_score_at_threshold() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "success": true, "score": 0.5 })).await;

        let v = verifier_for(&server).verify("tok").await.unwrap();
        assert!(v.success);
        assert_eq!(v.score, Some(0.5));
    }

    #[tokio::test]
    async fn rejects_low_score() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "success": true, "score": 0.2 })).await;

        let v = verifier_for(&server).verify("tok").await.unwrap();
        assert!(!v.success);
    }

    #[tokio::test]
    async fn rejects_missing_score_and_failed_check() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "success": true })).await;
        assert!(!verifier_for(&server).verify("tok").await.unwrap().success);

        let server = MockServer::start().await;
        mount_reply(
            &server,
            json!({ "success": false, "score": 0.9, "error-codes": ["timeout-or-duplicate"] }),
        )
        .await;
        assert!(!verifier_for(&server).verify("tok").await.unwrap().success);
    }

    #[tokio::test]
    async fn server_error_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = verifier_for(&server).verify("tok").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 500, .. }));
    }
}
