pub mod kv_store;
pub mod synced_calendar_repository;

pub use kv_store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use synced_calendar_repository::SyncedCalendarRepository;
