//! `RateLimitEntry`: the per-evaluation snapshot handed to telemetry and to
//! the `429` response renderer.

use std::time::Duration;

/// What to do when the backing store (a Redis-backed policy, in practice)
/// is unavailable for an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailoverMode {
    /// Allow the request through.
    #[default]
    Open,
    /// Deny the request.
    Closed,
    /// Allow the request through, but mark the entry so telemetry can tell
    /// this admission was a failover rather than a real evaluation.
    Shadow,
}

/// `{identity, policy, strategy, tokens_remaining, reset_at, failover_mode?}`
/// updated atomically per evaluation.
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub identity: String,
    pub policy: String,
    pub strategy: &'static str,
    pub tokens_remaining: u64,
    pub reset_at: Duration,
    pub failover_mode: Option<FailoverMode>,
}
