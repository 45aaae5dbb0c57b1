//! The engine's error taxonomy.
//!
//! Handlers return `Result<Response, Error>`; the default error-handler
//! middleware (see `anvil-middleware::error_handler`) maps each variant to
//! an HTTP status and a JSON `{"error": ..., "fields": ...}` body. Unknown
//! errors (`Error::Internal`) map to `500` and get logged with the request
//! id rather than echoed to the client.

use std::collections::HashMap;
use std::time::Duration;

use http::Method;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no route matches this path")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed { allowed: Vec<Method> },

    #[error("route conflict: {0}")]
    RouteConflict(String),

    #[error("named route error: {0}")]
    NamedRouteError(String),

    #[error("validation failed")]
    Validation(ValidationError),

    #[error("missing required parameter: {0}")]
    MissingParam(String),

    #[error("failed to bind request body: {0}")]
    Binding(String),

    #[error("precondition failed")]
    PreconditionFailed,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("request timed out")]
    Timeout,

    #[error("the engine is draining and is not accepting new requests")]
    ShutdownInProgress,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("cyclic provider dependency detected: {0:?}")]
    CyclicProviders(Vec<String>),

    #[error("state error: {0}")]
    State(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Per-field validation messages, as produced by `Context::bind*`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ValidationError {
    pub fields: HashMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} field(s) failed validation", self.fields.len())
    }
}

impl Error {
    /// The status code a default error-handler should respond with.
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode as S;
        match self {
            Error::NotFound => S::NOT_FOUND,
            Error::MethodNotAllowed { .. } => S::METHOD_NOT_ALLOWED,
            Error::RouteConflict(_) | Error::NamedRouteError(_) => S::INTERNAL_SERVER_ERROR,
            Error::Validation(_) => S::UNPROCESSABLE_ENTITY,
            Error::MissingParam(_) | Error::Binding(_) => S::BAD_REQUEST,
            Error::PreconditionFailed => S::PRECONDITION_FAILED,
            Error::Unauthorized => S::UNAUTHORIZED,
            Error::Forbidden => S::FORBIDDEN,
            Error::RateLimited { .. } => S::TOO_MANY_REQUESTS,
            Error::Timeout => S::GATEWAY_TIMEOUT,
            Error::ShutdownInProgress => S::SERVICE_UNAVAILABLE,
            Error::Provider(_) | Error::CyclicProviders(_) | Error::State(_) => {
                S::INTERNAL_SERVER_ERROR
            }
            Error::Internal(_) => S::INTERNAL_SERVER_ERROR,
        }
    }
}
