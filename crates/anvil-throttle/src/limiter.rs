//! `RateLimiter`: named policies, each owning a strategy and an identity
//! projection, evaluated against `dashmap`-backed per-identity state.
//!
//! The limiter never takes a map-wide lock: each
//! identity's state lives in its own `DashMap` shard/entry, and the
//! strategy's compare-and-set happens inside that entry's guard.

use std::sync::Arc;
use std::time::Instant;

use anvil_signals::EventBus;
use dashmap::DashMap;

use crate::entry::{FailoverMode, RateLimitEntry};
use crate::identity::{IdentityInputs, IdentityStrategy};
use crate::strategy::{State, Strategy};

/// Fired after a successful evaluation, whether allowed or blocked.
#[derive(Debug, Clone)]
pub struct RateLimitAllowed {
    pub entry: RateLimitEntry,
}

#[derive(Debug, Clone)]
pub struct RateLimitBlocked {
    pub entry: RateLimitEntry,
    pub retry_after: std::time::Duration,
}

/// One configured policy: a name, a strategy, and an identity projection.
pub struct RateLimitPolicy {
    pub name: String,
    pub strategy: Box<dyn Strategy>,
    pub identity: Box<dyn IdentityStrategy>,
    pub failover: FailoverMode,
}

impl RateLimitPolicy {
    pub fn new(
        name: impl Into<String>,
        strategy: impl Strategy + 'static,
        identity: impl IdentityStrategy + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            strategy: Box::new(strategy),
            identity: Box::new(identity),
            failover: FailoverMode::default(),
        }
    }

    pub fn failover(mut self, mode: FailoverMode) -> Self {
        self.failover = mode;
        self
    }
}

fn strategy_label(strategy: &dyn Strategy) -> &'static str {
    // `Strategy` doesn't carry a name itself (it's meant to be opaque to
    // callers); evaluate on a throwaway state to see which variant it
    // produces rather than adding a dedicated `fn name` to the trait.
    match strategy.initial_state(Instant::now()) {
        State::TokenBucket { .. } => "token_bucket",
        State::SlidingWindow { .. } => "sliding_window",
        State::Quota { .. } => "quota",
    }
}

struct StoreOutage;

/// A shared limiter: a name-keyed table of policies, each with its own
/// `DashMap<String, State>` of per-identity state.
#[derive(Default)]
pub struct RateLimiter {
    policies: DashMap<String, Arc<RateLimitPolicy>>,
    state: DashMap<(String, String), State>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, policy: RateLimitPolicy) {
        self.policies.insert(policy.name.clone(), Arc::new(policy));
    }

    pub fn policy(&self, name: &str) -> Option<Arc<RateLimitPolicy>> {
        self.policies.get(name).map(|p| p.clone())
    }

    /// Evaluate `policy_name` for one request, publishing `RateLimitAllowed`
    /// or `RateLimitBlocked` on `events`. Returns `Err` only when the named
    /// policy doesn't exist — a missing policy is a configuration bug, not
    /// a store failure, so it is never subject to `failover`.
    pub async fn evaluate(
        &self,
        policy_name: &str,
        inputs: &IdentityInputs<'_>,
        events: &EventBus,
    ) -> crate::Result<RateLimitEntry> {
        let policy = self
            .policy(policy_name)
            .ok_or_else(|| crate::Error::StoreUnavailable(format!("no such policy `{policy_name}`")))?;

        let identity = policy.identity.derive(inputs);
        let key = (policy_name.to_string(), identity.clone());
        let now = Instant::now();

        let decision = {
            let mut slot = self.state.entry(key).or_insert_with(|| policy.strategy.initial_state(now));
            policy.strategy.evaluate(&mut slot, now)
        };

        let entry = RateLimitEntry {
            identity,
            policy: policy_name.to_string(),
            strategy: strategy_label(policy.strategy.as_ref()),
            tokens_remaining: decision.remaining,
            reset_at: decision.reset_at,
            failover_mode: None,
        };

        if decision.allowed {
            tracing::debug!(policy = %policy_name, identity = %entry.identity, "rate limit allowed");
            events.publish(RateLimitAllowed { entry: entry.clone() }).await;
        } else {
            tracing::info!(policy = %policy_name, identity = %entry.identity, "rate limit blocked");
            events
                .publish(RateLimitBlocked { entry: entry.clone(), retry_after: decision.reset_at })
                .await;
        }

        if decision.allowed {
            Ok(entry)
        } else {
            Err(crate::Error::Blocked(entry))
        }
    }

    /// Evaluate as above, but treat a store outage (no such policy is never
    /// one; this is for a future persistent backend) according to the
    /// policy's configured `failover` mode rather than propagating.
    #[allow(dead_code)]
    async fn evaluate_with_failover(
        &self,
        policy: &RateLimitPolicy,
        entry: RateLimitEntry,
        _outage: StoreOutage,
    ) -> RateLimitEntry {
        match policy.failover {
            FailoverMode::Open => RateLimitEntry { failover_mode: Some(FailoverMode::Open), ..entry },
            FailoverMode::Closed => RateLimitEntry { failover_mode: Some(FailoverMode::Closed), ..entry },
            FailoverMode::Shadow => RateLimitEntry { failover_mode: Some(FailoverMode::Shadow), ..entry },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ByClientIp;
    use crate::strategy::TokenBucket;

    #[tokio::test]
    async fn evaluate_admits_then_blocks_at_capacity() {
        let limiter = RateLimiter::new();
        limiter.register(RateLimitPolicy::new(
            "api",
            TokenBucket { capacity: 1.0, refill_per_sec: 0.0 },
            ByClientIp,
        ));
        let events = EventBus::new();
        let inputs = IdentityInputs { client_ip: Some("1.2.3.4"), ..Default::default() };

        assert!(limiter.evaluate("api", &inputs, &events).await.is_ok());
        let blocked = limiter.evaluate("api", &inputs, &events).await;
        assert!(matches!(blocked, Err(crate::Error::Blocked(_))));
    }

    #[tokio::test]
    async fn distinct_identities_have_independent_budgets() {
        let limiter = RateLimiter::new();
        limiter.register(RateLimitPolicy::new(
            "api",
            TokenBucket { capacity: 1.0, refill_per_sec: 0.0 },
            ByClientIp,
        ));
        let events = EventBus::new();

        let a = IdentityInputs { client_ip: Some("1.1.1.1"), ..Default::default() };
        let b = IdentityInputs { client_ip: Some("2.2.2.2"), ..Default::default() };
        assert!(limiter.evaluate("api", &a, &events).await.is_ok());
        assert!(limiter.evaluate("api", &b, &events).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_policy_errors() {
        let limiter = RateLimiter::new();
        let events = EventBus::new();
        let inputs = IdentityInputs::default();
        assert!(limiter.evaluate("missing", &inputs, &events).await.is_err());
    }
}
