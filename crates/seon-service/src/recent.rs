//! Per-client history of recently accepted queries, for resubmission spam.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::similarity::{DEFAULT_THRESHOLD, is_similar};

/// Default number of queries remembered per client.
pub const DEFAULT_CAPACITY: usize = 10;
/// Default age after which a remembered query is forgotten.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
struct RecentQuery {
    query: String,
    submitted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
}

/// Bounded per-client query logs.
///
/// The search pipeline calls [`check`](Self::check) before verification and
/// [`record`](Self::record) only after a successful answer, so a rejected
/// request never enters the log. [`record_and_check`](Self::record_and_check)
/// serves callers that accept a query as soon as it is not a duplicate.
pub struct RecentQueries {
    logs: DashMap<String, VecDeque<RecentQuery>>,
    capacity: usize,
    retention: Duration,
    threshold: f64,
}

impl Default for RecentQueries {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_RETENTION)
    }
}

impl RecentQueries {
    pub fn new(capacity: usize, retention: Duration) -> Self {
        Self {
            logs: DashMap::new(),
            capacity,
            retention,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Reports whether `query` resembles anything `client` recently submitted.
    pub fn check(&self, client: &str, query: &str) -> DuplicateCheck {
        let is_duplicate = self
            .logs
            .get(client)
            .is_some_and(|log| self.matches(&log, query));
        DuplicateCheck { is_duplicate }
    }

    /// Appends an accepted query to the client's log.
    pub fn record(&self, client: &str, query: &str) {
        self.record_at(client, query, Instant::now());
    }

    pub fn record_at(&self, client: &str, query: &str, now: Instant) {
        let mut log = self.logs.entry(client.to_owned()).or_default();
        self.push(&mut log, query, now);
    }

    /// Checks and, when not a duplicate, records in one step.
    pub fn record_and_check(&self, client: &str, query: &str) -> DuplicateCheck {
        self.record_and_check_at(client, query, Instant::now())
    }

    pub fn record_and_check_at(&self, client: &str, query: &str, now: Instant) -> DuplicateCheck {
        let mut log = self.logs.entry(client.to_owned()).or_default();
        if self.matches(&log, query) {
            return DuplicateCheck { is_duplicate: true };
        }
        self.push(&mut log, query, now);
        DuplicateCheck {
            is_duplicate: false,
        }
    }

    fn matches(&self, log: &VecDeque<RecentQuery>, query: &str) -> bool {
        log.iter()
            .any(|recent| is_similar(&recent.query, query, self.threshold))
    }

    fn push(&self, log: &mut VecDeque<RecentQuery>, query: &str, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        log.push_back(RecentQuery {
            query: query.to_owned(),
            submitted_at: now,
        });
        while log.len() > self.capacity {
            log.pop_front();
        }
    }

    /// Drops entries older than the retention window and forgets clients
    /// with nothing left. Returns the number of clients removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let retention = self.retention;
        let before = self.logs.len();
        self.logs.retain(|_, log| {
            log.retain(|q| now.saturating_duration_since(q.submitted_at) < retention);
            !log.is_empty()
        });
        before.saturating_sub(self.logs.len())
    }

    /// Number of clients with a non-empty log.
    pub fn tracked(&self) -> usize {
        self.logs.len()
    }

    /// Number of queries currently remembered for `client`.
    pub fn len_for(&self, client: &str) -> usize {
        self.logs.get(client).map_or(0, |log| log.len())
    }
}
