//! InMemoryTaskStore - 開発・テスト用の TaskStore
//!
//! BTreeMap で channel_id 順に保持する。プロセス終了で消える。

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::{ChannelId, PersistedPurgeRecord, StoreError};
use crate::ports::TaskStore;

/// Volatile task store.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    records: Mutex<BTreeMap<ChannelId, i64>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store (used to simulate a previous run).
    pub fn with_records(records: impl IntoIterator<Item = PersistedPurgeRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.channel_id, r.purge_duration_seconds))
            .collect();
        Self {
            records: Mutex::new(map),
        }
    }

    /// Synchronous lookup for assertions.
    pub fn get(&self, channel_id: ChannelId) -> Option<i64> {
        self.lock().get(&channel_id).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // ロック中に await しないので std の Mutex で足りる
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ChannelId, i64>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list_all(&self) -> Result<Vec<PersistedPurgeRecord>, StoreError> {
        Ok(self
            .lock()
            .iter()
            .map(|(&channel_id, &purge_duration_seconds)| PersistedPurgeRecord {
                channel_id,
                purge_duration_seconds,
            })
            .collect())
    }

    async fn upsert(&self, record: PersistedPurgeRecord) -> Result<(), StoreError> {
        self.lock()
            .insert(record.channel_id, record.purge_duration_seconds);
        Ok(())
    }

    async fn delete(&self, channel_id: ChannelId) -> Result<(), StoreError> {
        self.lock().remove(&channel_id);
        Ok(())
    }
}
