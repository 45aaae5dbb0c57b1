//! An in-process `Store`. Suitable for single-process deployments and
//! tests; state is lost on restart and not shared across processes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::session::store::{SessionData, Store, StoredSession};

struct Entry {
    data: SessionData,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<StoredSession>> {
        let Some(entry) = self.entries.get(id) else { return Ok(None) };
        let now = Instant::now();
        if entry.expires_at <= now {
            drop(entry);
            self.entries.remove(id);
            return Ok(None);
        }
        Ok(Some(StoredSession {
            data: entry.data.clone(),
            expires_in: entry.expires_at - now,
        }))
    }

    async fn save(&self, id: &str, data: SessionData, expiry: Duration) -> Result<()> {
        self.entries.insert(id.to_string(), Entry { data, expires_at: Instant::now() + expiry });
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.entries.remove(id);
        Ok(())
    }

    async fn regenerate_id(&self, old: &str, new: &str) -> Result<()> {
        if let Some((_, entry)) = self.entries.remove(old) {
            self.entries.insert(new.to_string(), entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_save_and_load() {
        let store = MemoryStore::new();
        let mut data = SessionData::new();
        data.insert("user_id".into(), serde_json::json!(42));
        store.save("sess1", data, Duration::from_secs(60)).await.unwrap();

        let loaded = store.load("sess1").await.unwrap().unwrap();
        assert_eq!(loaded.data.get("user_id"), Some(&serde_json::json!(42)));
    }

    #[tokio::test]
    async fn expired_entries_load_as_none() {
        let store = MemoryStore::new();
        store.save("sess1", SessionData::new(), Duration::from_millis(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.load("sess1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn regenerate_id_moves_data_and_destroys_old() {
        let store = MemoryStore::new();
        let mut data = SessionData::new();
        data.insert("k".into(), serde_json::json!("v"));
        store.save("old", data, Duration::from_secs(60)).await.unwrap();

        store.regenerate_id("old", "new").await.unwrap();
        assert!(store.load("old").await.unwrap().is_none());
        assert!(store.load("new").await.unwrap().is_some());
    }
}
