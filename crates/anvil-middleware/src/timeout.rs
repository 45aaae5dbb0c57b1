//! Deadline enforcement and cancellation propagation.

use std::sync::Arc;
use std::time::Duration;

use anvil_core::{CancelSource, Error, Handler, Middleware, Result};
use anvil_http::{Request, Response};
use async_trait::async_trait;

/// Arms a deadline for the rest of the pipeline and the handler.
///
/// A [`anvil_core::CancelToken`] is attached to the request's extensions
/// before `next` runs; handlers doing long work should poll
/// `request.extensions.get::<CancelToken>()` rather than assume the
/// `tokio::select!` below interrupts them mid-await (it only stops waiting
/// on their result, it does not abort the task running them — `tokio::spawn`
/// is the only thing that does that, and this pipeline deliberately runs
/// in-task to keep stack depth and scheduling simple).
pub struct TimeoutMiddleware {
    duration: Duration,
}

impl TimeoutMiddleware {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Middleware for TimeoutMiddleware {
    async fn process(&self, mut request: Request, next: Arc<dyn Handler>) -> Result<Response> {
        let (source, token) = CancelSource::new();
        request.extensions.insert(token);

        tokio::select! {
            biased;
            result = next.handle(request) => result,
            _ = tokio::time::sleep(self.duration) => {
                source.cancel();
                Err(Error::Timeout)
            }
        }
    }

    fn name(&self) -> &'static str {
        "anvil.timeout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow(Duration);
    #[async_trait]
    impl Handler for Slow {
        async fn handle(&self, _request: Request) -> Result<Response> {
            tokio::time::sleep(self.0).await;
            Ok(Response::ok())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fast_handler_completes_within_deadline() {
        let middleware = TimeoutMiddleware::new(Duration::from_secs(5));
        let handler: Arc<dyn Handler> = Arc::new(Slow(Duration::from_millis(10)));
        let result = middleware.process(Request::builder().build(), handler).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let middleware = TimeoutMiddleware::new(Duration::from_millis(10));
        let handler: Arc<dyn Handler> = Arc::new(Slow(Duration::from_secs(5)));
        let result = middleware.process(Request::builder().build(), handler).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }
}
