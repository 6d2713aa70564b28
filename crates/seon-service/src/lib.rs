//! Seon Service: search-protection core for the Seon documentation server.
//!
//! This crate contains all transport-agnostic logic guarding the AI
//! search: query validation, near-duplicate detection, fixed-window rate
//! limiting, the selection cache, and the pipeline that sequences them
//! around the upstream completion call.
//!
//! The HTTP transport (`seon-http`) and upstream clients (`seon-upstream`)
//! depend on this crate. **Zero transport dependencies**: no axum, no
//! reqwest.

pub mod cache;
pub mod error;
pub mod metrics;
pub mod rate_limit;
pub mod recent;
pub mod search;
pub mod similarity;
pub mod sweeper;
pub mod types;
pub mod upstream;
pub mod validate;

use std::sync::Arc;
use std::time::{Duration, Instant};

use cache::SearchCache;
use metrics::{Gauges, Metrics};
use rate_limit::{RateLimiter, RatePolicy};
use recent::RecentQueries;
use upstream::{Completion, Verifier};

/// Configuration subset relevant to the service layer.
///
/// Transport-specific config (ports, CORS origins, upstream URLs) stays in
/// the binary crate's `Config` struct.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Default per-client search budget.
    pub rate_limit: RatePolicy,
    /// Penalty budget applied after failed verification.
    pub strict_rate_limit: RatePolicy,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub recent_capacity: usize,
    pub recent_retention: Duration,
    /// Upper bound on one completion call (`Duration::ZERO` = unbounded).
    pub ai_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            rate_limit: RatePolicy::LENIENT,
            strict_rate_limit: RatePolicy::STRICT,
            cache_capacity: cache::DEFAULT_CAPACITY,
            cache_ttl: cache::DEFAULT_TTL,
            recent_capacity: recent::DEFAULT_CAPACITY,
            recent_retention: recent::DEFAULT_RETENTION,
            ai_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared service state, cloneable across all transport handlers.
///
/// Owns the three mutable stores and the upstream collaborators. Nothing
/// here is process-global: every store lives and dies with its state.
#[derive(Clone)]
pub struct ServiceState {
    inner: Arc<Inner>,
}

struct Inner {
    rate_limiter: RateLimiter,
    strict_limiter: RateLimiter,
    cache: SearchCache,
    recent_queries: RecentQueries,
    metrics: Metrics,
    completion: Arc<dyn Completion>,
    verifier: Option<Arc<dyn Verifier>>,
    ai_timeout: Duration,
    start_time: Instant,
}

impl ServiceState {
    /// Creates a new service state from config and collaborators.
    ///
    /// With `verifier = None`, supplied verification tokens are accepted
    /// without a check.
    pub fn new(
        config: &ServiceConfig,
        completion: Arc<dyn Completion>,
        verifier: Option<Arc<dyn Verifier>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                rate_limiter: RateLimiter::new("default", config.rate_limit),
                strict_limiter: RateLimiter::new("strict", config.strict_rate_limit),
                cache: SearchCache::new(config.cache_capacity, config.cache_ttl),
                recent_queries: RecentQueries::new(
                    config.recent_capacity,
                    config.recent_retention,
                ),
                metrics: Metrics::new(),
                completion,
                verifier,
                ai_timeout: config.ai_timeout,
                start_time: Instant::now(),
            }),
        }
    }

    // --- Accessors ---

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    pub fn strict_limiter(&self) -> &RateLimiter {
        &self.inner.strict_limiter
    }

    pub fn cache(&self) -> &SearchCache {
        &self.inner.cache
    }

    pub fn recent_queries(&self) -> &RecentQueries {
        &self.inner.recent_queries
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn completion(&self) -> &dyn Completion {
        self.inner.completion.as_ref()
    }

    pub fn verifier(&self) -> Option<&dyn Verifier> {
        self.inner.verifier.as_deref()
    }

    /// Effective completion timeout, `None` when unbounded.
    pub fn ai_timeout(&self) -> Option<Duration> {
        if self.inner.ai_timeout.is_zero() {
            None
        } else {
            Some(self.inner.ai_timeout)
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    /// Samples store sizes for the metrics endpoint.
    pub fn gauges(&self) -> Gauges {
        Gauges {
            cache: self.inner.cache.stats(),
            rate_limited_clients: self.inner.rate_limiter.tracked(),
            penalized_clients: self.inner.strict_limiter.tracked(),
            recent_query_clients: self.inner.recent_queries.tracked(),
            uptime_seconds: self.uptime_secs(),
        }
    }

    // --- Maintenance ---

    /// Clean up rate limiter entries in both policies. Returns count removed.
    pub fn sweep_rate_limits(&self) -> usize {
        self.inner.rate_limiter.sweep() + self.inner.strict_limiter.sweep()
    }

    /// Clean up expired cache entries. Returns count removed.
    pub fn sweep_cache(&self) -> usize {
        self.inner.cache.sweep()
    }

    /// Clean up stale recent-query logs. Returns clients removed.
    pub fn sweep_recent_queries(&self) -> usize {
        self.inner.recent_queries.sweep()
    }
}
