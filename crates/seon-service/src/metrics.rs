//! Lightweight Prometheus-compatible metrics using atomic counters.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::CacheStats;
use crate::error::ErrorKind;

/// Live values sampled from the stores at render time.
pub struct Gauges {
    pub cache: CacheStats,
    pub rate_limited_clients: usize,
    pub penalized_clients: usize,
    pub recent_query_clients: usize,
    pub uptime_seconds: u64,
}

/// Application-wide search metrics.
pub struct Metrics {
    searches_ok: AtomicU64,
    /// Indexed like `ErrorKind::ALL`.
    rejections: [AtomicU64; 6],
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    ai_calls: AtomicU64,
    ai_duration_us_sum: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_index(kind: ErrorKind) -> usize {
    match kind {
        ErrorKind::Validation => 0,
        ErrorKind::RateLimit => 1,
        ErrorKind::Duplicate => 2,
        ErrorKind::Security => 3,
        ErrorKind::AiError => 4,
        ErrorKind::ServerError => 5,
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            searches_ok: AtomicU64::new(0),
            rejections: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            ai_calls: AtomicU64::new(0),
            ai_duration_us_sum: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self, cached: bool) {
        self.searches_ok.fetch_add(1, Ordering::Relaxed);
        if cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejection(&self, kind: ErrorKind) {
        self.rejections[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one upstream completion call, successful or not.
    pub fn record_ai_call(&self, duration_us: u64) {
        self.ai_calls.fetch_add(1, Ordering::Relaxed);
        self.ai_duration_us_sum
            .fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn searches_ok(&self) -> u64 {
        self.searches_ok.load(Ordering::Relaxed)
    }

    pub fn rejections(&self, kind: ErrorKind) -> u64 {
        self.rejections[kind_index(kind)].load(Ordering::Relaxed)
    }

    pub fn ai_calls(&self) -> u64 {
        self.ai_calls.load(Ordering::Relaxed)
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self, gauges: &Gauges) -> String {
        let mut out = String::with_capacity(2048);

        gauge(
            &mut out,
            "seon_cache_entries",
            "Cached selections, including expired ones not yet swept",
            gauges.cache.size,
        );
        gauge(
            &mut out,
            "seon_cache_valid_entries",
            "Cached selections within their TTL",
            gauges.cache.valid_entries,
        );
        gauge(
            &mut out,
            "seon_cache_entry_hits",
            "Hits accumulated by valid cache entries",
            gauges.cache.total_hits,
        );
        gauge(
            &mut out,
            "seon_rate_limited_clients",
            "Clients tracked by the default rate limiter",
            gauges.rate_limited_clients,
        );
        gauge(
            &mut out,
            "seon_penalized_clients",
            "Clients tracked by the strict rate limiter",
            gauges.penalized_clients,
        );
        gauge(
            &mut out,
            "seon_recent_query_clients",
            "Clients with a recent-query history",
            gauges.recent_query_clients,
        );
        gauge(
            &mut out,
            "seon_uptime_seconds",
            "Server uptime in seconds",
            gauges.uptime_seconds,
        );

        writeln!(out, "# HELP seon_searches_total Search requests by outcome.").unwrap();
        writeln!(out, "# TYPE seon_searches_total counter").unwrap();
        let ok = self.searches_ok();
        writeln!(out, "seon_searches_total{{outcome=\"ok\"}} {ok}").unwrap();
        for kind in ErrorKind::ALL {
            let label = kind.as_str();
            let n = self.rejections(kind);
            writeln!(out, "seon_searches_total{{outcome=\"{label}\"}} {n}").unwrap();
        }

        counter(
            &mut out,
            "seon_cache_hits_total",
            "Searches answered from the cache",
            self.cache_hits.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "seon_cache_misses_total",
            "Searches that required an AI call",
            self.cache_misses.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "seon_ai_calls_total",
            "Upstream completion calls",
            self.ai_calls(),
        );

        let us = self.ai_duration_us_sum.load(Ordering::Relaxed);
        let secs = us as f64 / 1_000_000.0;
        writeln!(
            out,
            "# HELP seon_ai_duration_seconds_sum Total upstream completion time in seconds."
        )
        .unwrap();
        writeln!(out, "# TYPE seon_ai_duration_seconds_sum counter").unwrap();
        writeln!(out, "seon_ai_duration_seconds_sum {secs:.6}").unwrap();

        out
    }
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    writeln!(out, "# HELP {name} {help}").unwrap();
    writeln!(out, "# TYPE {name} gauge").unwrap();
    writeln!(out, "{name} {value}").unwrap();
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    writeln!(out, "# HELP {name} {help}.").unwrap();
    writeln!(out, "# TYPE {name} counter").unwrap();
    writeln!(out, "{name} {value}").unwrap();
}
