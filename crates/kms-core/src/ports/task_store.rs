//! TaskStore port - スケジュールの永続化
//!
//! # 実装
//! - `SqliteTaskStore`: 本番用（`kms_tasks` テーブル）
//! - `InMemoryTaskStore`: テスト・開発用

use async_trait::async_trait;

use crate::domain::{ChannelId, PersistedPurgeRecord, StoreError};

/// Durable channel_id → retention-seconds map.
///
/// すべての操作は冪等。
/// - `upsert` を同じ値で2回呼んでもレコードは1件
/// - 存在しないチャンネルの `delete` は成功扱い
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<PersistedPurgeRecord>, StoreError>;

    async fn upsert(&self, record: PersistedPurgeRecord) -> Result<(), StoreError>;

    async fn delete(&self, channel_id: ChannelId) -> Result<(), StoreError>;
}
