//! Process-wide typed publish/subscribe for the Anvil engine.
//!
//! Two primitives live here:
//!
//! - [`EventBus`]: register a handler for a Rust type `E` and receive every
//!   instance of it that gets published, in registration order.
//! - [`Signal`]: a named stream of a single event type with the extra
//!   plumbing lifecycle signals need — sender scoping, a de-duplication key
//!   so re-subscribing replaces rather than piles up, and a handle you can
//!   drop to unsubscribe.
//!
//! Both deliver sequentially within one dispatch and never hold a lock
//! across a handler invocation.

mod bus;
mod error;
mod signal;

pub use bus::{EventBus, EventHandler, HandlerResult};
pub use error::UnhandledSignalError;
pub use signal::{Signal, SubscriptionHandle};

/// Any `Send + Sync + 'static` value can flow through the bus or a signal.
pub trait Event: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Event for T {}
