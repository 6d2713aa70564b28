//! The AI search pipeline.
//!
//! Sequences validation, throttling, duplicate detection, optional human
//! verification and the result cache around the upstream completion call.
//! Transport-agnostic: the HTTP crate derives the client identity and maps
//! errors to responses.

use std::time::Instant;

use crate::ServiceState;
use crate::cache::fingerprint;
use crate::error::ServiceError;
use crate::types::{CompletionRequest, SearchOutcome, SearchRequest, SelectionResult};
use crate::upstream::UpstreamError;
use crate::validate::{ValidationFailure, validate};

/// Stateless search operations over a shared `ServiceState`.
pub struct SearchService;

impl SearchService {
    /// Runs one search for `client`, recording the outcome in metrics.
    pub async fn search(
        state: &ServiceState,
        client: &str,
        req: SearchRequest,
    ) -> Result<SearchOutcome, ServiceError> {
        let result = Self::run(state, client, req).await;
        match &result {
            Ok(outcome) => {
                state.metrics().record_success(outcome.cached);
                tracing::debug!(
                    client,
                    cached = outcome.cached,
                    selected = outcome.selected_files.len(),
                    remaining = outcome.remaining,
                    "search served"
                );
            }
            Err(err) => {
                state.metrics().record_rejection(err.kind());
                tracing::debug!(client, kind = %err.kind(), %err, "search rejected");
            }
        }
        result
    }

    async fn run(
        state: &ServiceState,
        client: &str,
        req: SearchRequest,
    ) -> Result<SearchOutcome, ServiceError> {
        let query = validate(req.query.as_deref().unwrap_or_default())?;

        let decision = state.rate_limiter().check(client);
        if !decision.allowed {
            return Err(ServiceError::RateLimited {
                reset_at: decision.reset_at,
                is_blocked: decision.is_blocked,
                remaining: decision.remaining,
            });
        }

        if state.recent_queries().check(client, &query).is_duplicate {
            return Err(ServiceError::Duplicate);
        }

        if let Some(token) = req.recaptcha_token.as_deref().filter(|t| !t.is_empty()) {
            Self::verify(state, client, token).await?;
        }

        let file_names = candidate_files(req.file_names);
        if file_names.is_empty() {
            return Err(ValidationFailure::NoCandidateFiles.into());
        }

        let key = fingerprint(&query, &file_names);
        let (selection, cached) = match state.cache().get(&key) {
            Some(hit) => (hit, true),
            None => {
                state.metrics().record_cache_miss();
                let selection = Self::complete(state, &query, file_names).await?;
                state.cache().set(key, selection.clone());
                (selection, false)
            }
        };

        state.recent_queries().record(client, &query);

        Ok(SearchOutcome {
            selected_files: selection.selected_files,
            cached,
            remaining: decision.remaining,
        })
    }

    /// Checks the verification token. A failed check costs the client a
    /// slot in the strict limiter.
    async fn verify(state: &ServiceState, client: &str, token: &str) -> Result<(), ServiceError> {
        let Some(verifier) = state.verifier() else {
            tracing::warn!("verification service not configured, skipping check");
            return Ok(());
        };

        let passed = match verifier.verify(token).await {
            Ok(verdict) => verdict.success,
            Err(e) => {
                tracing::warn!(error = %e, "verification request failed");
                false
            }
        };

        if !passed {
            let penalty = state.strict_limiter().check(client);
            tracing::warn!(
                client,
                limiter = state.strict_limiter().name(),
                is_blocked = penalty.is_blocked,
                "verification failed, strict limit applied"
            );
            return Err(ServiceError::Security);
        }
        Ok(())
    }

    async fn complete(
        state: &ServiceState,
        query: &str,
        file_names: Vec<String>,
    ) -> Result<SelectionResult, ServiceError> {
        let request = CompletionRequest {
            file_names,
            user_query: query.to_owned(),
        };
        let call = state.completion().complete(request);

        let started = Instant::now();
        let outcome = match state.ai_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(UpstreamError::Timeout)),
            None => call.await,
        };
        state
            .metrics()
            .record_ai_call(started.elapsed().as_micros() as u64);

        outcome.map_err(|e| {
            tracing::error!(error = %e, "AI completion failed");
            ServiceError::Ai(e.to_string())
        })
    }
}

/// Drops blank names and duplicates, keeping first-seen order.
fn candidate_files(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::ServiceConfig;
    use crate::error::ErrorKind;
    use crate::rate_limit::{RatePolicy, UNLIMITED_REMAINING};
    use crate::types::Verification;
    use crate::upstream::{Completion, Verifier};

    /// Selects every candidate whose stem appears in the query.
    #[derive(Default)]
    struct FakeCompletion {
        calls: AtomicUsize,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl Completion for FakeCompletion {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<SelectionResult, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(UpstreamError::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            let query = request.user_query.to_lowercase();
            Ok(SelectionResult {
                selected_files: request
                    .file_names
                    .into_iter()
                    .filter(|f| query.contains(f.trim_end_matches(".md")))
                    .collect(),
            })
        }
    }

    struct FixedVerifier(Result<bool, ()>);

    #[async_trait::async_trait]
    impl Verifier for FixedVerifier {
        async fn verify(&self, _token: &str) -> Result<Verification, UpstreamError> {
            match self.0 {
                Ok(success) => Ok(Verification {
                    success,
                    score: Some(if success { 0.9 } else { 0.1 }),
                }),
                Err(()) => Err(UpstreamError::Http("connection refused".into())),
            }
        }
    }

    fn state_with(
        completion: Arc<FakeCompletion>,
        verifier: Option<Arc<dyn Verifier>>,
        config: ServiceConfig,
    ) -> ServiceState {
        ServiceState::new(&config, completion, verifier)
    }

    fn request(query: &str, files: &[&str]) -> SearchRequest {
        SearchRequest {
            query: Some(query.to_owned()),
            file_names: files.iter().map(|f| (*f).to_owned()).collect(),
            recaptcha_token: None,
        }
    }

    #[tokio::test]
    async fn second_identical_search_is_served_from_cache() {
        let ai = Arc::new(FakeCompletion::default());
        let state = state_with(ai.clone(), None, ServiceConfig::default());

        let first = SearchService::search(&state, "c1", request("setup guide", &["setup.md", "faq.md"]))
            .await
            .unwrap();
        assert!(!first.cached);
        assert_eq!(first.selected_files, vec!["setup.md"]);
        assert_eq!(first.remaining, 9);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 1);

        // a different client asking the same thing hits the cache
        let second = SearchService::search(&state, "c2", request("setup guide", &["faq.md", "setup.md"]))
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.selected_files, vec!["setup.md"]);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eleventh_search_in_window_is_rate_limited() {
        let ai = Arc::new(FakeCompletion::default());
        let state = state_with(ai, None, ServiceConfig::default());
        let topics = [
            "deploy", "install", "faq", "roadmap", "license", "testing", "ci", "docs", "api",
            "auth", "cache",
        ];

        for (i, topic) in topics.iter().enumerate() {
            let result =
                SearchService::search(&state, "c", request(&format!("about {topic}"), &["a.md"])).await;
            if i < 10 {
                let outcome = result.unwrap();
                assert_eq!(outcome.remaining, 9 - i as u64);
            } else {
                let err = result.unwrap_err();
                assert_eq!(err.kind(), ErrorKind::RateLimit);
                assert!(matches!(err, ServiceError::RateLimited { is_blocked: true, .. }));
            }
        }
    }

    #[tokio::test]
    async fn whitespace_variant_is_rejected_as_duplicate() {
        let ai = Arc::new(FakeCompletion::default());
        let state = state_with(ai.clone(), None, ServiceConfig::default());

        SearchService::search(&state, "c", request("setup guide", &["setup.md"]))
            .await
            .unwrap();
        let err = SearchService::search(&state, "c", request("setup   guide", &["setup.md"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert_eq!(state.recent_queries().len_for("c"), 1);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_query_spends_nothing() {
        let ai = Arc::new(FakeCompletion::default());
        let state = state_with(ai.clone(), None, ServiceConfig::default());

        for q in [None, Some("x"), Some("aaaaaaaaaaaa")] {
            let req = SearchRequest {
                query: q.map(str::to_owned),
                file_names: vec!["a.md".into()],
                recaptcha_token: None,
            };
            let err = SearchService::search(&state, "c", req).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(state.rate_limiter().tracked(), 0);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.metrics().rejections(ErrorKind::Validation), 3);
    }

    #[tokio::test]
    async fn empty_candidate_set_is_a_validation_error() {
        let ai = Arc::new(FakeCompletion::default());
        let state = state_with(ai.clone(), None, ServiceConfig::default());

        let err = SearchService::search(&state, "c", request("setup guide", &["", "  "]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationFailure::NoCandidateFiles)
        ));
        assert_eq!(ai.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_verification_applies_strict_penalty() {
        let ai = Arc::new(FakeCompletion::default());
        let verifier: Arc<dyn Verifier> = Arc::new(FixedVerifier(Ok(false)));
        let state = state_with(ai.clone(), Some(verifier), ServiceConfig::default());

        let mut req = request("setup guide", &["setup.md"]);
        req.recaptcha_token = Some("bad".into());
        let err = SearchService::search(&state, "c", req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
        assert_eq!(state.strict_limiter().tracked(), 1);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 0);
        // query was not recorded, so a retry is not a duplicate
        assert_eq!(state.recent_queries().len_for("c"), 0);

        let err = SearchService::search(&state, "c", request("setup guide", &["setup.md"]))
            .await;
        assert!(err.is_ok());
    }

    #[tokio::test]
    async fn verifier_transport_error_counts_as_failure() {
        let ai = Arc::new(FakeCompletion::default());
        let verifier: Arc<dyn Verifier> = Arc::new(FixedVerifier(Err(())));
        let state = state_with(ai, Some(verifier), ServiceConfig::default());

        let mut req = request("setup guide", &["setup.md"]);
        req.recaptcha_token = Some("token".into());
        let err = SearchService::search(&state, "c", req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
    }

    #[tokio::test]
    async fn passing_or_unconfigured_verification_proceeds() {
        let ai = Arc::new(FakeCompletion::default());
        let verifier: Arc<dyn Verifier> = Arc::new(FixedVerifier(Ok(true)));
        let state = state_with(ai.clone(), Some(verifier), ServiceConfig::default());
        let mut req = request("setup guide", &["setup.md"]);
        req.recaptcha_token = Some("good".into());
        assert!(SearchService::search(&state, "c", req).await.is_ok());

        let open = state_with(ai, None, ServiceConfig::default());
        let mut req = request("setup guide", &["setup.md"]);
        req.recaptcha_token = Some("anything".into());
        assert!(SearchService::search(&open, "c", req).await.is_ok());
        assert_eq!(open.strict_limiter().tracked(), 0);
    }

    #[tokio::test]
    async fn ai_failure_is_not_cached() {
        let ai = Arc::new(FakeCompletion {
            fail: true,
            ..FakeCompletion::default()
        });
        let state = state_with(ai.clone(), None, ServiceConfig::default());

        let err = SearchService::search(&state, "c", request("setup guide", &["setup.md"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AiError);
        assert!(state.cache().is_empty());
        assert_eq!(state.recent_queries().len_for("c"), 0);

        // not recorded as a duplicate either, so a retry reaches the AI again
        let err = SearchService::search(&state, "c", request("setup guide", &["setup.md"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AiError);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_ai_call_times_out() {
        let ai = Arc::new(FakeCompletion {
            delay: Some(Duration::from_secs(60)),
            ..FakeCompletion::default()
        });
        let config = ServiceConfig {
            ai_timeout: Duration::from_secs(5),
            ..ServiceConfig::default()
        };
        let state = state_with(ai, None, config);

        let err = SearchService::search(&state, "c", request("setup guide", &["setup.md"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AiError);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn disabled_rate_limit_reports_unbounded_remaining() {
        let ai = Arc::new(FakeCompletion::default());
        let config = ServiceConfig {
            rate_limit: RatePolicy {
                max_requests: 0,
                ..RatePolicy::LENIENT
            },
            ..ServiceConfig::default()
        };
        let state = state_with(ai, None, config);
        let outcome = SearchService::search(&state, "c", request("setup guide", &["setup.md"]))
            .await
            .unwrap();
        assert_eq!(outcome.remaining, UNLIMITED_REMAINING);
    }

    #[test]
    fn candidate_files_are_trimmed_and_deduplicated() {
        let names = vec![
            " setup.md".to_owned(),
            "faq.md".to_owned(),
            "setup.md".to_owned(),
            String::new(),
        ];
        assert_eq!(candidate_files(names), vec!["setup.md", "faq.md"]);
    }
}
