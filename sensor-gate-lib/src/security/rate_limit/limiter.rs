//! Sliding-window rate limiter keyed by client address.

use ahash::AHashMap;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::security::ClientAddress;

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is admitted and was recorded.
    Allowed {
        /// Maximum number of requests allowed in the window
        limit: usize,
        /// Requests still admissible in the current window
        remaining: usize,
    },
    /// Request exceeds the budget. It was not recorded.
    Limited {
        /// Maximum number of requests allowed in the window
        limit: usize,
        /// Time until the oldest in-window request ages out
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitResult::Limited { .. })
    }

    pub fn limit(&self) -> usize {
        match self {
            RateLimitResult::Allowed { limit, .. } => *limit,
            RateLimitResult::Limited { limit, .. } => *limit,
        }
    }

    pub fn remaining(&self) -> usize {
        match self {
            RateLimitResult::Allowed { remaining, .. } => *remaining,
            RateLimitResult::Limited { .. } => 0,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Limited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

#[derive(Default)]
struct LimiterState {
    /// Per-address request timestamps, oldest first
    logs: AHashMap<ClientAddress, VecDeque<Instant>>,
    /// Evaluated calls since the last request-triggered sweep
    calls_since_sweep: u64,
}

/// Per-address sliding-window counter.
///
/// Each address may make at most `max_requests` admitted requests within any
/// trailing `window`. A rejected request is not recorded. Prune, check and
/// record happen under one lock so two concurrent requests from the same
/// address can never both take the last slot.
///
/// Idle addresses are evicted by [`sweep`](Self::sweep), which also runs
/// automatically every `sweep_every` calls to [`allow`](Self::allow).
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    max_requests: usize,
    window: Duration,
    sweep_every: u64,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `window` per address.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self { state: Mutex::new(LimiterState::default()), max_requests, window, sweep_every: 0 }
    }

    /// Run a sweep every `calls` evaluated requests. 0 disables it.
    pub fn with_sweep_every(mut self, calls: u64) -> Self {
        self.sweep_every = calls;
        self
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests as usize, Duration::from_secs(config.window_seconds))
            .with_sweep_every(config.sweep_every)
    }

    /// Check the budget for `address` at `now`, recording the request if admitted.
    ///
    /// Timestamps at least `window` old are dropped first. A timestamp later
    /// than `now` (clock moved backwards) is kept, which can only make the
    /// limiter stricter.
    pub fn allow(&self, address: &ClientAddress, now: Instant) -> RateLimitResult {
        let mut state = self.lock();

        let result = {
            let log = state.logs.entry(*address).or_default();
            prune(log, now, self.window);

            if log.len() >= self.max_requests {
                let retry_after = log
                    .front()
                    .and_then(|oldest| oldest.checked_add(self.window))
                    .map(|expires| expires.saturating_duration_since(now))
                    .unwrap_or(self.window);
                RateLimitResult::Limited { limit: self.max_requests, retry_after }
            } else {
                log.push_back(now);
                RateLimitResult::Allowed {
                    limit: self.max_requests,
                    remaining: self.max_requests.saturating_sub(log.len()),
                }
            }
        };

        if self.sweep_every > 0 {
            state.calls_since_sweep = state.calls_since_sweep.saturating_add(1);
            if state.calls_since_sweep >= self.sweep_every {
                state.calls_since_sweep = 0;
                let evicted = sweep_locked(&mut state, now, self.window);
                if evicted > 0 {
                    debug!(evicted, "rate limiter sweep");
                }
            }
        }

        result
    }

    /// Drop every address whose most recent request is at least `window` old.
    ///
    /// Returns the number of evicted addresses.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut state = self.lock();
        sweep_locked(&mut state, now, self.window)
    }

    /// Number of addresses currently holding a request log
    pub fn tracked_addresses(&self) -> usize {
        self.lock().logs.len()
    }

    /// Number of timestamps stored for `address`, stale ones included
    pub fn history_len(&self, address: &ClientAddress) -> usize {
        self.lock().logs.get(address).map_or(0, VecDeque::len)
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        // A poisoned table is still a valid table
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn prune(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = log.front() {
        if now.saturating_duration_since(*oldest) >= window {
            log.pop_front();
        } else {
            break;
        }
    }
}

fn sweep_locked(state: &mut LimiterState, now: Instant, window: Duration) -> usize {
    let before = state.logs.len();
    state.logs.retain(|_, log| match log.back() {
        Some(newest) => now.saturating_duration_since(*newest) < window,
        None => false,
    });
    before.saturating_sub(state.logs.len())
}
