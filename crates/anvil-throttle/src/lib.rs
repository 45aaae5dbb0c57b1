//! Rate limiting for the Anvil engine.
//!
//! Three admission [`strategy::Strategy`] implementations (token bucket,
//! sliding window, quota) share one [`limiter::RateLimiter`], each policy
//! keyed by name and carrying its own [`identity::IdentityStrategy`] and
//! [`entry::FailoverMode`]. Evaluating a policy publishes
//! [`limiter::RateLimitAllowed`]/[`limiter::RateLimitBlocked`] on an
//! `anvil_signals::EventBus`; the `anvil-middleware::rate_limit` layer
//! renders a blocked evaluation into a `429` response directly.

pub mod entry;
pub mod error;
pub mod identity;
pub mod limiter;
pub mod strategy;

pub use entry::{FailoverMode, RateLimitEntry};
pub use error::{Error, Result};
pub use identity::{ByApiKey, ByClientIp, ByUser, IdentityInputs, IdentityStrategy, PerRoute};
pub use limiter::{RateLimitAllowed, RateLimitBlocked, RateLimitPolicy, RateLimiter};
pub use strategy::{Quota, SlidingWindow, Strategy, TokenBucket};
