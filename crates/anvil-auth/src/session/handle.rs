//! `Session`: the per-request handle `Context::session()` hands out.
//!
//! Holds an `Arc<dyn Store>` rather than being generic over a backend
//! type — the engine's `Context` is built once per request against
//! whatever store the active provider registered, so monomorphizing per
//! backend type buys nothing here. An owned value, not a borrow of
//! `Context`: session/flash references never hold a back-reference into
//! the context they came from.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::session::store::{SessionData, Store};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Mapping key -> value plus metadata (id, expiry, flash bag, dirty flag).
///
/// Flash entries are carried in the same map as ordinary data, tagged in
/// a side-set of keys due to expire after the *next* read rather than
/// deleted on write: flash data lives for exactly one subsequent
/// response.
pub struct Session {
    store: Arc<dyn Store>,
    id: String,
    data: SessionData,
    flash_keys: HashMap<String, ()>,
    consumed_flash_keys: Vec<String>,
    dirty: bool,
    timeout: Duration,
}

impl Session {
    pub fn new(store: Arc<dyn Store>, id: impl Into<String>) -> Self {
        Self {
            store,
            id: id.into(),
            data: SessionData::new(),
            flash_keys: HashMap::new(),
            consumed_flash_keys: Vec::new(),
            dirty: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub async fn load(store: Arc<dyn Store>, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let loaded = store.load(&id).await?;
        let (data, timeout) = match loaded {
            Some(stored) => (stored.data, stored.expires_in),
            None => (SessionData::new(), DEFAULT_TIMEOUT),
        };
        Ok(Self {
            store,
            id,
            data,
            flash_keys: HashMap::new(),
            consumed_flash_keys: Vec::new(),
            dirty: false,
            timeout,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.data.get(key).map(|v| serde_json::from_value(v.clone())).transpose().map_err(Error::from)
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let key = key.into();
        let json = serde_json::to_value(value).map_err(Error::from)?;
        self.data.insert(key, json);
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.dirty = true;
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Sets a value that survives exactly one subsequent read (by a
    /// *different* request than the one that set it): it's written now,
    /// and the key is dropped the next time [`Session::take_flash`] reads
    /// it for any key, or on the following [`Session::save`] if untouched.
    pub fn flash<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let key = key.into();
        self.flash_keys.insert(key.clone(), ());
        self.set(key, value)
    }

    /// Reads and consumes a flash value: present for exactly one read.
    pub fn take_flash<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        let value = self.get(key)?;
        if self.flash_keys.remove(key).is_some() {
            self.consumed_flash_keys.push(key.to_string());
            self.dirty = true;
        }
        Ok(value)
    }

    /// Persists pending changes, dropping any flash keys consumed this
    /// request so they don't reappear on the next load.
    pub async fn save(&mut self) -> Result<()> {
        for key in self.consumed_flash_keys.drain(..) {
            self.data.remove(&key);
        }
        self.store.save(&self.id, self.data.clone(), self.timeout).await?;
        self.dirty = false;
        Ok(())
    }

    pub async fn destroy(&self) -> Result<()> {
        self.store.destroy(&self.id).await
    }

    /// Rotates the session id, moving data to the new id and destroying
    /// the old one. Call this on privilege change (e.g. login) so a
    /// fixed session id can't be reused across the boundary.
    pub async fn regenerate(&mut self, new_id: impl Into<String>) -> Result<()> {
        let new_id = new_id.into();
        self.store.regenerate_id(&self.id, &new_id).await?;
        self.id = new_id;
        Ok(())
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::session::memory::MemoryStore;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut session = Session::new(store, "sess1");
        session.set("user_id", 42i64).unwrap();
        assert_eq!(session.get::<i64>("user_id").unwrap(), Some(42));
        assert!(session.is_dirty());
    }

    #[tokio::test]
    async fn flash_value_survives_exactly_one_read() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut session = Session::new(store, "sess1");
        session.flash("notice", "saved").unwrap();

        assert_eq!(session.take_flash::<String>("notice").unwrap(), Some("saved".to_string()));
        session.save().await.unwrap();
        assert_eq!(session.get::<String>("notice").unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_through_store() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut session = Session::new(store.clone(), "sess1");
        session.set("k", "v").unwrap();
        session.save().await.unwrap();

        let reloaded = Session::load(store, "sess1").await.unwrap();
        assert_eq!(reloaded.get::<String>("k").unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn regenerate_moves_data_to_new_id() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut session = Session::new(store.clone(), "old-id");
        session.set("k", "v").unwrap();
        session.save().await.unwrap();

        session.regenerate("new-id").await.unwrap();
        assert_eq!(session.id(), "new-id");

        let reloaded = Session::load(store, "new-id").await.unwrap();
        assert_eq!(reloaded.get::<String>("k").unwrap(), Some("v".to_string()));
    }
}
