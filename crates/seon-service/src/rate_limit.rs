//! Per-client rate limiting with a fixed-window counter and escalating blocks.
//!
//! Transport-agnostic core. One `RateLimiter` enforces one `RatePolicy`;
//! the service holds a lenient and a strict instance, each with its own
//! per-client state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Request budget for one limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// Requests allowed per window. `0` disables the limiter.
    pub max_requests: u64,
    pub window: Duration,
    /// How long a client is locked out after exceeding the budget.
    pub block_duration: Option<Duration>,
}

impl RatePolicy {
    /// Default policy for AI search: 10 per 15 minutes, 30 minute block.
    pub const LENIENT: Self = Self {
        max_requests: 10,
        window: Duration::from_secs(15 * 60),
        block_duration: Some(Duration::from_secs(30 * 60)),
    };

    /// Penalty policy after failed verification: 3 per 5 minutes, 1 hour block.
    pub const STRICT: Self = Self {
        max_requests: 3,
        window: Duration::from_secs(5 * 60),
        block_duration: Some(Duration::from_secs(60 * 60)),
    };
}

/// Outcome of a single `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u64,
    /// When the window resets, or when the block lifts while blocked.
    pub reset_at: Instant,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    count: u64,
    window_reset_at: Instant,
    blocked_until: Option<Instant>,
}

/// Furthest deadline a window or block is allowed to reach.
const MAX_HORIZON: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Remaining count reported by a disabled limiter: the largest integer a
/// JavaScript client reads exactly (`Number.MAX_SAFE_INTEGER`).
pub const UNLIMITED_REMAINING: u64 = (1 << 53) - 1;

/// `now + after`, saturating at [`MAX_HORIZON`] for oversized durations.
fn deadline(now: Instant, after: Duration) -> Instant {
    now.checked_add(after.min(MAX_HORIZON)).unwrap_or(now)
}

impl WindowState {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.window_reset_at && self.blocked_until.is_none_or(|until| until <= now)
    }
}

/// In-memory per-client rate limiter with fixed-window counters.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    name: &'static str,
    policy: RatePolicy,
    counters: DashMap<String, WindowState>,
}

impl RateLimiter {
    /// Creates a new rate limiter. `name` labels it in logs.
    pub fn new(name: &'static str, policy: RatePolicy) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                name,
                policy,
                counters: DashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.policy.max_requests > 0
    }

    /// Counts one request from `client` and decides whether it may proceed.
    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    /// [`check`](Self::check) against an explicit clock reading.
    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let policy = self.inner.policy;
        if !self.is_enabled() {
            return RateDecision {
                allowed: true,
                remaining: UNLIMITED_REMAINING,
                reset_at: now,
                is_blocked: false,
            };
        }

        let fresh = WindowState {
            count: 1,
            window_reset_at: deadline(now, policy.window),
            blocked_until: None,
        };

        // The shard lock is held for the whole read-modify-write.
        let mut entry = match self.inner.counters.entry(client.to_owned()) {
            Entry::Occupied(entry) => entry,
            Entry::Vacant(entry) => {
                entry.insert(fresh);
                return RateDecision {
                    allowed: true,
                    remaining: policy.max_requests - 1,
                    reset_at: fresh.window_reset_at,
                    is_blocked: false,
                };
            }
        };
        let state = entry.get_mut();

        if let Some(until) = state.blocked_until
            && until > now
        {
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_at: until,
                is_blocked: true,
            };
        }

        if now >= state.window_reset_at {
            *state = fresh;
            return RateDecision {
                allowed: true,
                remaining: policy.max_requests - 1,
                reset_at: state.window_reset_at,
                is_blocked: false,
            };
        }

        state.count += 1;
        if state.count > policy.max_requests {
            if let Some(block) = policy.block_duration {
                state.blocked_until = Some(deadline(now, block));
            }
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_at: state.window_reset_at,
                is_blocked: policy.block_duration.is_some(),
            };
        }

        RateDecision {
            allowed: true,
            remaining: policy.max_requests - state.count,
            reset_at: state.window_reset_at,
            is_blocked: false,
        }
    }

    /// Removes records whose window and block have both expired.
    /// Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.inner.counters.len();
        self.inner.counters.retain(|_, state| !state.is_expired(now));
        before.saturating_sub(self.inner.counters.len())
    }

    /// Number of clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.inner.counters.len()
    }
}
