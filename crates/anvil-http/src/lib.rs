//! HTTP primitives shared across the Anvil request engine.
//!
//! This crate owns the wire-level types — [`Request`] and [`Response`] — plus
//! the two pieces of HTTP semantics that depend only on them: conditional
//! request evaluation ([`conditional`]) and cookie representation
//! ([`cookie`]). Everything that needs a request/response but also needs
//! routing or middleware concepts (park those in `anvil-core` instead).

pub mod conditional;
pub mod cookie;
mod error;
pub mod request;
pub mod response;

pub use cookie::{Cookie, CookieJar, SameSite};
pub use error::HttpError;
pub use request::{Request, RequestBuilder, TrustedProxies};
pub use response::{Response, ResponseBuilder};

pub use conditional::{ConditionalOutcome, ETag, EtagStrategy, evaluate_conditional};

pub type Result<T> = std::result::Result<T, HttpError>;
