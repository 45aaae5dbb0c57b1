//! Conditional-request short-circuiting for routes whose representation can
//! be described cheaply, without running the handler (static assets,
//! anything with a stable `Last-Modified`/`ETag` independent of rendering).
//!
//! `Context::if_none_match` covers the case where the
//! handler itself computes the validators after doing work; this
//! middleware covers the case where they're known up front.

use std::sync::Arc;

use anvil_core::{Error, Handler, Middleware, Result};
use anvil_http::{ConditionalOutcome, ETag, Request, Response, conditional::chrono_lite::HttpDate, evaluate_conditional};
use async_trait::async_trait;

/// Supplies the validators for a request without running the full handler.
/// Implementors typically look the value up from a route parameter or a
/// static asset's file metadata.
pub trait ConditionalSource: Send + Sync {
    fn etag(&self, request: &Request) -> Option<ETag>;
    fn last_modified(&self, request: &Request) -> Option<HttpDate>;
}

pub struct ConditionalSourceMiddleware {
    source: Arc<dyn ConditionalSource>,
}

impl ConditionalSourceMiddleware {
    pub fn new(source: Arc<dyn ConditionalSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Middleware for ConditionalSourceMiddleware {
    async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
        let etag = self.source.etag(&request);
        let last_modified = self.source.last_modified(&request);

        match evaluate_conditional(&request.method, &request.headers, etag.as_ref(), last_modified.as_ref()) {
            ConditionalOutcome::Proceed => next.handle(request).await,
            ConditionalOutcome::NotModified => {
                let mut response = Response::new(http::StatusCode::NOT_MODIFIED);
                if let Some(etag) = &etag {
                    response.set_header(http::header::ETAG, &etag.to_header_value());
                }
                Ok(response)
            }
            ConditionalOutcome::PreconditionFailed => Err(Error::PreconditionFailed),
        }
    }

    fn name(&self) -> &'static str {
        "anvil.conditional"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    struct Fixed(Option<ETag>, Option<HttpDate>);
    impl ConditionalSource for Fixed {
        fn etag(&self, _request: &Request) -> Option<ETag> {
            self.0.clone()
        }
        fn last_modified(&self, _request: &Request) -> Option<HttpDate> {
            self.1
        }
    }

    struct Ok200;
    #[async_trait]
    impl Handler for Ok200 {
        async fn handle(&self, _request: Request) -> Result<Response> {
            Ok(Response::ok())
        }
    }

    #[tokio::test]
    async fn matching_if_none_match_short_circuits_to_304() {
        let etag = ETag::strong("v1");
        let middleware = ConditionalSourceMiddleware::new(Arc::new(Fixed(Some(etag.clone()), None)));
        let request = Request::builder()
            .method(Method::GET)
            .header("if-none-match", &etag.to_header_value())
            .unwrap()
            .build();

        let response = middleware.process(request, Arc::new(Ok200)).await.unwrap();
        assert_eq!(response.status, http::StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn mismatched_if_match_is_precondition_failed() {
        let etag = ETag::strong("v1");
        let middleware = ConditionalSourceMiddleware::new(Arc::new(Fixed(Some(etag), None)));
        let request = Request::builder()
            .method(Method::PUT)
            .header("if-match", "\"stale\"")
            .unwrap()
            .build();

        let result = middleware.process(request, Arc::new(Ok200)).await;
        assert!(matches!(result, Err(Error::PreconditionFailed)));
    }
}
