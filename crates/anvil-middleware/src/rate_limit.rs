//! Enforces an `anvil-throttle` policy as a pipeline layer.
//!
//! A blocked evaluation builds its own `429` response rather than raising
//! `Error::RateLimited` for the generic error-handler to render: only this
//! layer holds the `RateLimitEntry` (remaining, reset, policy), and the
//! `X-RateLimit-*`/`Retry-After` headers they populate would otherwise be
//! lost crossing the `Result` boundary.

use std::sync::Arc;

use anvil_core::{Error, Handler, Middleware, Result};
use anvil_http::{Request, Response};
use anvil_throttle::{IdentityInputs, RateLimiter};
use async_trait::async_trait;

pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
    policy: String,
    events: Arc<anvil_signals::EventBus>,
    /// Route name attached to `IdentityInputs` for per-route policies;
    /// `None` derives identity independent of which route matched.
    route: Option<String>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<RateLimiter>, policy: impl Into<String>, events: Arc<anvil_signals::EventBus>) -> Self {
        Self { limiter, policy: policy.into(), events, route: None }
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
        let client_ip = request.remote_addr.map(|a| a.ip().to_string());
        let inputs = IdentityInputs {
            client_ip: client_ip.as_deref(),
            user_id: None,
            api_key: request.header("x-api-key"),
            route: self.route.as_deref(),
        };

        match self.limiter.evaluate(&self.policy, &inputs, &self.events).await {
            Ok(entry) => {
                let mut response = next.handle(request).await?;
                response.set_header(
                    "x-ratelimit-remaining".parse().unwrap(),
                    &entry.tokens_remaining.to_string(),
                );
                Ok(response)
            }
            Err(anvil_throttle::Error::Blocked(entry)) => {
                let mut response = Response::new(http::StatusCode::TOO_MANY_REQUESTS);
                response.set_header(http::header::RETRY_AFTER, &entry.reset_at.as_secs().to_string());
                response.set_header(
                    "x-ratelimit-remaining".parse().unwrap(),
                    &entry.tokens_remaining.to_string(),
                );
                response.set_header(
                    "x-ratelimit-reset".parse().unwrap(),
                    &entry.reset_at.as_secs().to_string(),
                );
                response.set_header("x-ratelimit-policy".parse().unwrap(), &entry.policy);
                Ok(response)
            }
            Err(anvil_throttle::Error::StoreUnavailable(reason)) => {
                tracing::error!(policy = %self.policy, reason, "rate limit store unavailable");
                Err(Error::Internal(anyhow::anyhow!("rate limit store unavailable: {reason}")))
            }
        }
    }

    fn name(&self) -> &'static str {
        "anvil.rate_limit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_throttle::{ByClientIp, RateLimitPolicy, TokenBucket};

    struct Ok200;
    #[async_trait]
    impl Handler for Ok200 {
        async fn handle(&self, _request: Request) -> Result<Response> {
            Ok(Response::ok())
        }
    }

    #[tokio::test]
    async fn blocks_after_capacity_exhausted() {
        let limiter = Arc::new(RateLimiter::new());
        limiter.register(RateLimitPolicy::new("api", TokenBucket { capacity: 1.0, refill_per_sec: 0.0 }, ByClientIp));
        let middleware = RateLimitMiddleware::new(limiter, "api", Arc::new(anvil_signals::EventBus::new()));
        let handler: Arc<dyn Handler> = Arc::new(Ok200);

        let req = || Request::builder().remote_addr("127.0.0.1:1234".parse().unwrap()).build();
        assert!(middleware.process(req(), handler.clone()).await.is_ok());
        let response = middleware.process(req(), handler).await.unwrap();
        assert_eq!(response.status, http::StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers.contains_key(http::header::RETRY_AFTER));
        assert!(response.headers.get("x-ratelimit-remaining").is_some());
    }
}
