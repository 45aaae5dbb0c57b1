//! The service container: singleton/transient/request scopes, child scopes,
//! and disposables.
//!
//! The scope/cycle semantics follow the cursor/task-local idioms
//! established in `anvil-core` and `anvil-signals`.

mod container;
mod error;
mod scope;

pub use container::Container;
pub use error::{Error, Result};
pub use scope::Scope;
