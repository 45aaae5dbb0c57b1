//! The Session/Store abstraction.

mod handle;
mod store;

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "cookie")]
mod cookie;

pub use handle::Session;
pub use store::{SessionData, Store, StoredSession};

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "cookie")]
pub use cookie::CookieStore;
