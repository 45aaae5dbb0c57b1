//! Core request/response abstractions shared by the Anvil engine.
//!
//! This crate owns the concepts that sit one layer above the wire (`anvil_http`)
//! but below anything that needs routing, DI, or signals: the `Handler`/
//! `Middleware`/`Pipeline` composition primitives, the engine's error
//! taxonomy, content negotiation, and request-body binding with validation.

pub mod binding;
pub mod cancel;
pub mod error;
pub mod handler;
pub mod negotiation;

pub use cancel::{CancelSource, CancelToken};
pub use error::{Error, Result, ValidationError};
pub use handler::{Handler, Middleware, Pipeline};
pub use negotiation::{NegotiatedMediaType, Offer, negotiate};
