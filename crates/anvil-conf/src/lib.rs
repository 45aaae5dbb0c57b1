//! Deep-merged, dotted-path configuration resolver.
//!
//! Vault/AWS/Azure secret backends, hot reload, and field-level encryption
//! are out of scope here (config is resolved once at `Engine::build` and
//! read-only afterward) — only `secrecy::SecretString` wrapping for
//! sensitive keys is carried.

mod coerce;
mod duration;
mod error;
mod resolver;
mod value;

pub use coerce::FromValue;
pub use error::{Error, Result};
pub use resolver::{Config, ConfigResolver};
pub use value::Value;
