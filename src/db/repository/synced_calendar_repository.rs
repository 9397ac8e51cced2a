use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::models::EventMap;
use crate::db::repository::KeyValueStore;
use crate::error::AppResult;

/// Repository for the mapping table between synced items and their external
/// calendar events.
///
/// The whole table lives in one key-value entry, so every mutation is a
/// read-modify-write of the full blob. Mutations hold `write_lock` for the
/// entire cycle so that concurrent writers for different keys never drop
/// each other's entries.
pub struct SyncedCalendarRepository {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    write_lock: Mutex<()>,
}

impl SyncedCalendarRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, storage_key: impl Into<String>) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Load the full mapping table. A missing or corrupt blob is an empty table.
    pub async fn load(&self) -> AppResult<EventMap> {
        let raw = self.store.get(&self.storage_key).await?;
        Ok(EventMap::from_stored(raw.as_deref()))
    }

    /// Look up the external event id stored for a mapping key.
    pub async fn find_event_id(&self, mapping_key: &str) -> AppResult<Option<String>> {
        let map = self.load().await?;
        Ok(map.get(mapping_key).map(str::to_string))
    }

    /// Store `mapping_key -> event_id`, preserving every other entry.
    pub async fn upsert(&self, mapping_key: &str, event_id: &str) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.load().await?;
        map.insert(mapping_key, event_id);
        self.save(&map).await
    }

    /// Remove a mapping key, preserving every other entry. Returns the id
    /// that was stored, if any.
    pub async fn delete(&self, mapping_key: &str) -> AppResult<Option<String>> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.load().await?;
        let removed = map.remove(mapping_key);
        if removed.is_some() {
            self.save(&map).await?;
        }
        Ok(removed)
    }

    async fn save(&self, map: &EventMap) -> AppResult<()> {
        let raw = map.to_stored()?;
        self.store.set(&self.storage_key, &raw).await
    }
}
