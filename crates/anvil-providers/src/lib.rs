//! Provider registration and boot ordering.
//!
//! `Provider::register` handles pure bindings, `Provider::boot` handles
//! side-effectful init. Collapsed into a single trait (rather than a
//! builder plus a separate hook registry) since the engine core only
//! needs the two lifecycle phases.

mod events;
mod provider;
mod registry;

pub use events::{ProviderBooted, ProviderRegistered, ProviderShutDown};
pub use provider::Provider;
pub use registry::ProviderRegistry;
