//! Concrete middleware shipped with the Anvil engine.
//!
//! Each middleware here implements [`anvil_core::Middleware`] and is meant
//! to be installed as global engine middleware, group middleware, or route
//! middleware, composed in that order. None of them know about each other;
//! ordering (e.g. compression after error-handling, so a generated error
//! body still gets compressed) is the caller's concern at `Engine::build`
//! time.

pub mod error_handler;
pub mod timeout;

#[cfg(feature = "cors")]
pub mod cors;

#[cfg(feature = "compression")]
pub mod compression;

#[cfg(feature = "security")]
pub mod security_headers;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

pub mod conditional;

pub use conditional::{ConditionalSource, ConditionalSourceMiddleware};
pub use error_handler::ErrorHandlerMiddleware;
pub use timeout::TimeoutMiddleware;

#[cfg(feature = "cors")]
pub use cors::{CorsConfig, CorsMiddleware};

#[cfg(feature = "compression")]
pub use compression::CompressionMiddleware;

#[cfg(feature = "security")]
pub use security_headers::{SecurityHeadersConfig, SecurityHeadersMiddleware};

#[cfg(feature = "rate-limit")]
pub use rate_limit::RateLimitMiddleware;
