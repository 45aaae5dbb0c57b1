//! Principal extraction, gates/policies, session-vs-token strategy
//! selection, and the Session/Store abstraction.
//!
//! A database-backed user model, JWT issuance/rotation, MFA, and OAuth2
//! provider flows are out of scope here — OAuth provider specifics in
//! particular are a non-goal for this crate, and the rest are
//! implementation-provided collaborators behind the `Store`/`AuthStrategy`
//! seams this crate defines.

mod error;
mod gate;
mod principal;
mod session;
mod strategy;

pub use error::{Error, Result};
pub use gate::{AllOf, AllowAny, AnyOf, Gate, GateContext, HasRole, IsActiveUser, IsAuthenticated};
pub use principal::{AuthSource, Principal};
pub use session::{Session, SessionData, Store, StoredSession};
pub use strategy::{AuthOrchestrator, AuthRequest, AuthStrategy, BearerTokenStrategy, SessionCookieStrategy};

#[cfg(feature = "memory")]
pub use session::MemoryStore;

#[cfg(feature = "cookie")]
pub use session::CookieStore;
