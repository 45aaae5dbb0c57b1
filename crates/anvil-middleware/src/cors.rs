//! Cross-Origin Resource Sharing.

use std::sync::Arc;
use std::time::Duration;

use anvil_core::{Handler, Middleware, Result};
use anvil_http::{Request, Response};
use async_trait::async_trait;
use http::{Method, StatusCode, header};

/// Which origins a [`CorsMiddleware`] accepts.
#[derive(Debug, Clone)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    fn matches(&self, origin: &str) -> bool {
        match self {
            AllowedOrigins::Any => true,
            AllowedOrigins::List(list) => list.iter().any(|o| o == origin),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: AllowedOrigins,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: Option<Duration>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: AllowedOrigins::Any,
            allowed_methods: vec![Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE],
            allowed_headers: vec!["content-type".to_string(), "authorization".to_string()],
            allow_credentials: false,
            max_age: Some(Duration::from_secs(600)),
        }
    }
}

/// Answers preflight `OPTIONS` requests directly and annotates actual
/// responses with the allow-origin/allow-credentials/vary headers.
///
/// `Access-Control-Allow-Origin: *` and `Access-Control-Allow-Credentials`
/// are mutually exclusive per the Fetch spec; when both `allow_credentials`
/// and `AllowedOrigins::Any` are configured, the echoed request origin is
/// used instead of `*` so credentialed requests still work.
pub struct CorsMiddleware {
    config: CorsConfig,
}

impl CorsMiddleware {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    fn origin_header_value(&self, origin: &str) -> Option<String> {
        if !self.config.allowed_origins.matches(origin) {
            return None;
        }
        Some(match (&self.config.allowed_origins, self.config.allow_credentials) {
            (AllowedOrigins::Any, false) => "*".to_string(),
            _ => origin.to_string(),
        })
    }

    fn apply_common_headers(&self, response: &mut Response, allow_origin: &str) {
        response.set_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
        response.add_header(header::VARY, "Origin");
        if self.config.allow_credentials {
            response.set_header(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
        }
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
        let Some(origin) = request.header(header::ORIGIN.as_str()).map(str::to_string) else {
            return next.handle(request).await;
        };
        let Some(allow_origin) = self.origin_header_value(&origin) else {
            return next.handle(request).await;
        };

        let is_preflight = request.method == Method::OPTIONS
            && request.header(header::ACCESS_CONTROL_REQUEST_METHOD.as_str()).is_some();

        if is_preflight {
            let mut response = Response::new(StatusCode::NO_CONTENT);
            self.apply_common_headers(&mut response, &allow_origin);

            let methods: Vec<String> = self.config.allowed_methods.iter().map(|m| m.to_string()).collect();
            response.set_header(header::ACCESS_CONTROL_ALLOW_METHODS, &methods.join(", "));
            response.set_header(header::ACCESS_CONTROL_ALLOW_HEADERS, &self.config.allowed_headers.join(", "));
            if let Some(max_age) = self.config.max_age {
                response.set_header(header::ACCESS_CONTROL_MAX_AGE, &max_age.as_secs().to_string());
            }
            return Ok(response);
        }

        let mut response = next.handle(request).await?;
        self.apply_common_headers(&mut response, &allow_origin);
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "anvil.cors"
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
    async fn preflight_echoes_requested_method() {
        let middleware = CorsMiddleware::new(CorsConfig::default());
        let request = Request::builder()
            .method(Method::OPTIONS)
            .header("origin", "https://app.example")
            .unwrap()
            .header("access-control-request-method", "POST")
            .unwrap()
            .build();

        let response = middleware.process(request, Arc::new(Ok200)).await.unwrap();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(response.headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).is_some());
    }

    #[tokio::test]
    async fn disallowed_origin_is_not_annotated() {
        let config = CorsConfig { allowed_origins: AllowedOrigins::List(vec!["https://trusted".into()]), ..CorsConfig::default() };
        let middleware = CorsMiddleware::new(config);
        let request = Request::builder().header("origin", "https://evil.example").unwrap().build();

        let response = middleware.process(request, Arc::new(Ok200)).await.unwrap();
        assert!(response.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn credentials_echo_origin_instead_of_wildcard() {
        let config = CorsConfig { allow_credentials: true, ..CorsConfig::default() };
        let middleware = CorsMiddleware::new(config);
        let request = Request::builder().header("origin", "https://app.example").unwrap().build();

        let response = middleware.process(request, Arc::new(Ok200)).await.unwrap();
        assert_eq!(response.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "https://app.example");
    }
}
