//! Maps `anvil_core::Error` into an HTTP response.
//!
//! Installed as the outermost global middleware so every error raised
//! anywhere downstream — routing, binding, a handler, another middleware —
//! is caught in one place rather than each layer rendering its own error
//! body.

use std::sync::Arc;

use anvil_core::{Error, Handler, Middleware, Result, ValidationError};
use anvil_http::{Request, Response};
use async_trait::async_trait;
use http::StatusCode;
use serde_json::json;

/// Renders caught errors as a `{"error": ..., "fields": ...}` JSON body.
///
/// `500`s are logged with `tracing::error!` and never echo the underlying
/// message to the client (the message may carry internal detail); every
/// other status logs at `warn!` with the message included, since those are
/// expected, client-actionable outcomes.
pub struct ErrorHandlerMiddleware {
    /// When true, `Error::Internal`'s message is included in the body.
    /// Off by default; a binary consumer may flip it on for local dev.
    pub expose_internal_errors: bool,
}

impl Default for ErrorHandlerMiddleware {
    fn default() -> Self {
        Self { expose_internal_errors: false }
    }
}

impl ErrorHandlerMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    fn render(&self, error: &Error) -> Response {
        let status = error.status_code();
        let body = match error {
            Error::Validation(ValidationError { fields }) => {
                json!({ "error": "validation_failed", "fields": fields })
            }
            Error::MethodNotAllowed { allowed } => {
                let allowed: Vec<String> = allowed.iter().map(|m| m.to_string()).collect();
                json!({ "error": "method_not_allowed", "allowed": allowed })
            }
            Error::RateLimited { retry_after } => {
                json!({ "error": "rate_limited", "retry_after_secs": retry_after.as_secs() })
            }
            Error::Internal(inner) => {
                if self.expose_internal_errors {
                    json!({ "error": "internal_error", "message": inner.to_string() })
                } else {
                    json!({ "error": "internal_error" })
                }
            }
            other => json!({ "error": other.to_string() }),
        };

        let mut response = Response::json_with_status(&body, status)
            .unwrap_or_else(|_| Response::new(StatusCode::INTERNAL_SERVER_ERROR));
        if let Error::RateLimited { retry_after } = error {
            response.set_header(http::header::RETRY_AFTER, &retry_after.as_secs().to_string());
        }
        if let Error::MethodNotAllowed { allowed } = error {
            let mut methods: Vec<String> = allowed.iter().map(|m| m.to_string()).collect();
            methods.sort();
            response.set_header(http::header::ALLOW, &methods.join(", "));
        }
        response
    }
}

#[async_trait]
impl Middleware for ErrorHandlerMiddleware {
    async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
        match next.handle(request).await {
            Ok(response) => Ok(response),
            Err(error) => {
                if error.status_code().is_server_error() {
                    tracing::error!(error = %error, "request failed");
                } else {
                    tracing::warn!(error = %error, "request rejected");
                }
                Ok(self.render(&error))
            }
        }
    }

    fn name(&self) -> &'static str {
        "anvil.error_handler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_core::ValidationError;

    struct AlwaysFails(Error);
    #[async_trait]
    impl Handler for AlwaysFails {
        async fn handle(&self, _request: Request) -> Result<Response> {
            Err(match &self.0 {
                Error::Validation(v) => Error::Validation(v.clone()),
                Error::NotFound => Error::NotFound,
                Error::Unauthorized => Error::Unauthorized,
                _ => Error::Internal(anyhow::anyhow!("boom")),
            })
        }
    }

    #[tokio::test]
    async fn maps_not_found_to_404() {
        let middleware = ErrorHandlerMiddleware::new();
        let handler: Arc<dyn Handler> = Arc::new(AlwaysFails(Error::NotFound));
        let response = middleware.process(Request::builder().build(), handler).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validation_error_includes_fields() {
        let mut fields = ValidationError::new();
        fields.add("email", "is required");
        let middleware = ErrorHandlerMiddleware::new();
        let handler: Arc<dyn Handler> = Arc::new(AlwaysFails(Error::Validation(fields)));
        let response = middleware.process(Request::builder().build(), handler).await.unwrap();
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body["fields"]["email"].is_array());
    }

    #[tokio::test]
    async fn internal_errors_hide_message_by_default() {
        let middleware = ErrorHandlerMiddleware::new();
        let handler: Arc<dyn Handler> = Arc::new(AlwaysFails(Error::Internal(anyhow::anyhow!("secret"))));
        let response = middleware.process(Request::builder().build(), handler).await.unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body.get("message").is_none());
    }
}
