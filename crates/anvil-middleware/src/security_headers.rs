//! Baseline security response headers.

use std::sync::Arc;

use anvil_core::{Handler, Middleware, Result};
use anvil_http::{Request, Response};
use async_trait::async_trait;
use http::HeaderName;

#[derive(Debug, Clone)]
pub struct SecurityHeadersConfig {
    pub content_type_options_nosniff: bool,
    pub frame_options: Option<String>,
    pub hsts_max_age: Option<u64>,
    pub referrer_policy: Option<String>,
    pub content_security_policy: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            content_type_options_nosniff: true,
            frame_options: Some("DENY".to_string()),
            hsts_max_age: Some(31_536_000),
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            content_security_policy: None,
        }
    }
}

/// Sets the usual defensive response headers. `Strict-Transport-Security`
/// is only meaningful over TLS; callers terminating TLS upstream of Anvil
/// (most deployments) still want it set on every response so the browser
/// enforces HTTPS on subsequent visits.
pub struct SecurityHeadersMiddleware {
    config: SecurityHeadersConfig,
}

impl SecurityHeadersMiddleware {
    pub fn new(config: SecurityHeadersConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Middleware for SecurityHeadersMiddleware {
    async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
        let mut response = next.handle(request).await?;

        if self.config.content_type_options_nosniff {
            response.set_header(http::header::X_CONTENT_TYPE_OPTIONS, "nosniff");
        }
        if let Some(frame_options) = &self.config.frame_options {
            response.set_header(
                HeaderName::from_static("x-frame-options"),
                frame_options,
            );
        }
        if let Some(max_age) = self.config.hsts_max_age {
            response.set_header(
                http::header::STRICT_TRANSPORT_SECURITY,
                &format!("max-age={max_age}; includeSubDomains"),
            );
        }
        if let Some(policy) = &self.config.referrer_policy {
            response.set_header(http::header::REFERRER_POLICY, policy);
        }
        if let Some(csp) = &self.config.content_security_policy {
            response.set_header(http::header::CONTENT_SECURITY_POLICY, csp);
        }

        Ok(response)
    }

    fn name(&self) -> &'static str {
        "anvil.security_headers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ok200;
    #[async_trait]
    impl Handler for Ok200 {
        async fn handle(&self, _request: Request) -> Result<Response> {
            Ok(Response::ok())
        }
    }

    #[tokio::test]
    async fn default_config_sets_expected_headers() {
        let middleware = SecurityHeadersMiddleware::new(SecurityHeadersConfig::default());
        let response = middleware.process(Request::builder().build(), Arc::new(Ok200)).await.unwrap();

        assert_eq!(response.headers.get(http::header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(response.headers.get("x-frame-options").unwrap(), "DENY");
        assert!(response.headers.get(http::header::STRICT_TRANSPORT_SECURITY).is_some());
    }

    #[tokio::test]
    async fn csp_is_absent_unless_configured() {
        let middleware = SecurityHeadersMiddleware::new(SecurityHeadersConfig::default());
        let response = middleware.process(Request::builder().build(), Arc::new(Ok200)).await.unwrap();
        assert!(response.headers.get(http::header::CONTENT_SECURITY_POLICY).is_none());
    }
}
