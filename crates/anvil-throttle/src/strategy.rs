//! The three admission strategies: token bucket, sliding window, quota.
//!
//! Each strategy owns its own per-identity state shape and decides
//! admission from `(state, now)` alone — no strategy reaches back into the
//! limiter or the store, so `RateLimiter` can hold any of them behind one
//! `dyn Strategy` per policy.

use std::time::{Duration, Instant};

/// The outcome of one admission check against a single identity's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at: Duration,
}

/// Per-identity state a strategy mutates on every evaluation. Strategies
/// that don't need a field leave it at its default; `RateLimiter` always
/// allocates the union so one `DashMap<String, State>` covers every policy.
#[derive(Debug, Clone)]
pub(crate) enum State {
    TokenBucket { tokens: f64, last_refill: Instant },
    SlidingWindow { events: Vec<Instant> },
    Quota { count: u64, period_start: Instant },
}

pub trait Strategy: Send + Sync {
    /// Construct this strategy's initial per-identity state.
    fn initial_state(&self, now: Instant) -> State;

    /// Evaluate and mutate `state` in place for one admission check at `now`.
    fn evaluate(&self, state: &mut State, now: Instant) -> Decision;
}

/// `{capacity, refill_per_sec}`. Admits if a token is available, refilling
/// continuously from elapsed wall time rather than on a fixed tick.
pub struct TokenBucket {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl Strategy for TokenBucket {
    fn initial_state(&self, now: Instant) -> State {
        State::TokenBucket { tokens: self.capacity, last_refill: now }
    }

    fn evaluate(&self, state: &mut State, now: Instant) -> Decision {
        let State::TokenBucket { tokens, last_refill } = state else {
            unreachable!("TokenBucket strategy given non-token-bucket state")
        };
        let elapsed = now.saturating_duration_since(*last_refill).as_secs_f64();
        *tokens = (*tokens + elapsed * self.refill_per_sec).min(self.capacity);
        *last_refill = now;

        if *tokens >= 1.0 {
            *tokens -= 1.0;
            Decision { allowed: true, remaining: tokens.floor() as u64, reset_at: Duration::ZERO }
        } else {
            let deficit = 1.0 - *tokens;
            let wait = Duration::from_secs_f64((deficit / self.refill_per_sec.max(f64::EPSILON)).max(0.0));
            Decision { allowed: false, remaining: 0, reset_at: wait }
        }
    }
}

/// `{window, limit}`. Admits while fewer than `limit` events fall within the
/// trailing `window`; the event log is pruned to the window on every check.
pub struct SlidingWindow {
    pub window: Duration,
    pub limit: u64,
}

impl Strategy for SlidingWindow {
    fn initial_state(&self, _now: Instant) -> State {
        State::SlidingWindow { events: Vec::new() }
    }

    fn evaluate(&self, state: &mut State, now: Instant) -> Decision {
        let State::SlidingWindow { events } = state else {
            unreachable!("SlidingWindow strategy given non-sliding-window state")
        };
        let cutoff = now.checked_sub(self.window).unwrap_or(now);
        events.retain(|&t| t > cutoff);

        if (events.len() as u64) < self.limit {
            events.push(now);
            let remaining = self.limit - events.len() as u64;
            Decision { allowed: true, remaining, reset_at: Duration::ZERO }
        } else {
            let oldest = events.first().copied().unwrap_or(now);
            let reset_at = (oldest + self.window).saturating_duration_since(now);
            Decision { allowed: false, remaining: 0, reset_at }
        }
    }
}

/// `{limit, period}`. Resets the counter at period boundaries rather than
/// decaying continuously.
pub struct Quota {
    pub limit: u64,
    pub period: Duration,
}

impl Strategy for Quota {
    fn initial_state(&self, now: Instant) -> State {
        State::Quota { count: 0, period_start: now }
    }

    fn evaluate(&self, state: &mut State, now: Instant) -> Decision {
        let State::Quota { count, period_start } = state else {
            unreachable!("Quota strategy given non-quota state")
        };
        if now.saturating_duration_since(*period_start) >= self.period {
            *count = 0;
            *period_start = now;
        }

        let reset_at = (*period_start + self.period).saturating_duration_since(now);
        if *count < self.limit {
            *count += 1;
            Decision { allowed: true, remaining: self.limit - *count, reset_at }
        } else {
            Decision { allowed: false, remaining: 0, reset_at }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_admits_up_to_capacity_then_blocks() {
        let bucket = TokenBucket { capacity: 2.0, refill_per_sec: 0.0 };
        let now = Instant::now();
        let mut state = bucket.initial_state(now);

        assert!(bucket.evaluate(&mut state, now).allowed);
        assert!(bucket.evaluate(&mut state, now).allowed);
        assert!(!bucket.evaluate(&mut state, now).allowed);
    }

    #[test]
    fn token_bucket_refills_from_elapsed_time() {
        let bucket = TokenBucket { capacity: 1.0, refill_per_sec: 1.0 };
        let now = Instant::now();
        let mut state = bucket.initial_state(now);
        assert!(bucket.evaluate(&mut state, now).allowed);
        assert!(!bucket.evaluate(&mut state, now).allowed);

        let later = now + Duration::from_secs(1);
        assert!(bucket.evaluate(&mut state, later).allowed);
    }

    #[test]
    fn sliding_window_counts_within_window_only() {
        let strategy = SlidingWindow { window: Duration::from_secs(1), limit: 2 };
        let now = Instant::now();
        let mut state = strategy.initial_state(now);

        assert!(strategy.evaluate(&mut state, now).allowed);
        assert!(strategy.evaluate(&mut state, now).allowed);
        assert!(!strategy.evaluate(&mut state, now).allowed);

        let later = now + Duration::from_secs(2);
        assert!(strategy.evaluate(&mut state, later).allowed);
    }

    #[test]
    fn quota_resets_at_period_boundary() {
        let strategy = Quota { limit: 1, period: Duration::from_secs(60) };
        let now = Instant::now();
        let mut state = strategy.initial_state(now);

        assert!(strategy.evaluate(&mut state, now).allowed);
        assert!(!strategy.evaluate(&mut state, now).allowed);

        let next_period = now + Duration::from_secs(61);
        assert!(strategy.evaluate(&mut state, next_period).allowed);
    }
}
