//! Background cleanup of the rate-limit, cache and recent-query stores.
//!
//! Each store is swept on its own interval by its own task. Sweeps lock one
//! map shard at a time, so request handling is never stalled behind a
//! full-store pass.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::ServiceState;

/// How often each store is swept. `Duration::ZERO` disables that sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepIntervals {
    pub rate_limits: Duration,
    pub cache: Duration,
    pub recent_queries: Duration,
}

impl Default for SweepIntervals {
    fn default() -> Self {
        Self {
            rate_limits: Duration::from_secs(5 * 60),
            cache: Duration::from_secs(30 * 60),
            recent_queries: Duration::from_secs(10 * 60),
        }
    }
}

/// Handle to the running sweep tasks. Dropping it cancels them.
pub struct Sweeper {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawns the sweep tasks on the current tokio runtime.
    pub fn start(state: ServiceState, intervals: SweepIntervals) -> Self {
        let token = CancellationToken::new();
        let mut tasks = Vec::with_capacity(3);

        let s = state.clone();
        tasks.extend(spawn_sweep(&token, "rate_limit", intervals.rate_limits, move || {
            s.sweep_rate_limits()
        }));
        let s = state.clone();
        tasks.extend(spawn_sweep(&token, "cache", intervals.cache, move || {
            s.sweep_cache()
        }));
        tasks.extend(spawn_sweep(
            &token,
            "recent_queries",
            intervals.recent_queries,
            move || state.sweep_recent_queries(),
        ));

        Self { token, tasks }
    }

    /// Number of sweep tasks running.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancels all sweeps and waits for the tasks to finish.
    pub async fn stop(mut self) {
        self.token.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "sweep task ended abnormally");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn spawn_sweep<F>(
    token: &CancellationToken,
    store: &'static str,
    every: Duration,
    sweep: F,
) -> Option<JoinHandle<()>>
where
    F: Fn() -> usize + Send + 'static,
{
    if every.is_zero() {
        tracing::debug!(store, "sweep disabled");
        return None;
    }

    let token = token.clone();
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = sweep();
                    if removed > 0 {
                        tracing::info!(store, removed, "Swept expired entries");
                    }
                }
            }
        }
    }))
}
