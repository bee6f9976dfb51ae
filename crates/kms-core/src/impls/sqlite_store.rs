//! SqliteTaskStore - `kms_tasks` テーブルによる TaskStore 実装
//!
//! # スキーマ
//! ```sql
//! CREATE TABLE IF NOT EXISTS kms_tasks(
//!     channel_id INTEGER PRIMARY KEY,
//!     purge_duration_seconds INTEGER NOT NULL
//! )
//! ```
//!
//! channel_id はサーバーを跨いで一意なので主キーにできる。
//! クエリはすべてプレースホルダ経由でバインドする。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::domain::{ChannelId, PersistedPurgeRecord, StoreError};
use crate::ports::TaskStore;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kms_tasks(\
     channel_id INTEGER PRIMARY KEY, \
     purge_duration_seconds INTEGER NOT NULL)";

/// SQLite-backed task store.
#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Opens (and creates if absent) the database file at `path`.
    ///
    /// パスは URL を経由せずそのまま渡す（`?` や `%` を含むファイル名でも壊れない）
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        Self::connect(opts).await
    }

    /// In-memory database, gone when the store is dropped.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect(SqliteConnectOptions::new().in_memory(true)).await
    }

    async fn connect(opts: SqliteConnectOptions) -> Result<Self, StoreError> {
        // 書き込みは少ないので接続は1本で十分（:memory: は接続ごとに別 DB になる）
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        debug!("kms_tasks table ready");
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn list_all(&self) -> Result<Vec<PersistedPurgeRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT channel_id, purge_duration_seconds FROM kms_tasks ORDER BY channel_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<PersistedPurgeRecord, StoreError> {
                Ok(PersistedPurgeRecord {
                    channel_id: ChannelId::from_i64(row.try_get("channel_id")?),
                    purge_duration_seconds: row.try_get("purge_duration_seconds")?,
                })
            })
            .collect()
    }

    async fn upsert(&self, record: PersistedPurgeRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO kms_tasks (channel_id, purge_duration_seconds) VALUES (?1, ?2) \
             ON CONFLICT(channel_id) DO UPDATE SET purge_duration_seconds = excluded.purge_duration_seconds",
        )
        .bind(record.channel_id.to_i64())
        .bind(record.purge_duration_seconds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, channel_id: ChannelId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kms_tasks WHERE channel_id = ?1")
            .bind(channel_id.to_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
