//! The `Store` interface every session backend implements:
//! `load`/`save`/`destroy`/`regenerate_id`, against one payload shape
//! (`HashMap<String, serde_json::Value>`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub type SessionData = HashMap<String, Value>;

/// A loaded session's row, as a store returns it: the data plus its
/// absolute expiry so callers don't need a second round-trip to know if
/// it's stale.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub data: SessionData,
    pub expires_in: Duration,
}

/// Backs a [`crate::session::Session`]. Implementations: cookie (the data
/// itself, signed/encrypted, never touches a server-side store — `load`/
/// `save`/`destroy` are no-ops there since the cookie *is* the session) and
/// memory (this crate); a Redis/database-backed store is an
/// implementation-provided collaborator.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<StoredSession>>;
    async fn save(&self, id: &str, data: SessionData, expiry: Duration) -> Result<()>;
    async fn destroy(&self, id: &str) -> Result<()>;
    /// Moves `old`'s data to `new` and destroys `old`. Session id rotation
    /// on privilege change always goes through this rather than `save` +
    /// `destroy` so a store backed by a single round-trip (e.g. `RENAME`
    /// in Redis) can do it atomically.
    async fn regenerate_id(&self, old: &str, new: &str) -> Result<()>;
}
