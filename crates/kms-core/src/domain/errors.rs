//! Errors - エラー型と分類
//!
//! # 分類
//! - PlatformError: チャットプラットフォーム呼び出しの失敗
//!   - MissingAccess: チャンネルに到達できない（恒久的）
//!   - MissingPermissions: 削除権限がない（恒久的、チャンネルに通知する）
//!   - その他: 一時的なものとして次の tick で再試行
//! - StoreError: 永続化の失敗（ベストエフォート、呼び出し元には伝播しない）

use std::time::Duration;

use thiserror::Error;

use super::ids::ChannelId;

/// Failure reported by a chat-platform gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("missing access")]
    MissingAccess,

    #[error("missing permissions")]
    MissingPermissions,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Failure of the durable task store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by `PurgeScheduler::set_schedule`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("could not announce purge schedule in channel {channel_id}: {source}")]
    Announce {
        channel_id: ChannelId,
        #[source]
        source: PlatformError,
    },
}

/// Errors surfaced by `ModerationService`.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("timeout of {0:?} exceeds the platform limit")]
    TimeoutTooLong(Duration),

    #[error("timeout duration must be positive")]
    ZeroTimeout,

    /// 保護ロールが 1 つもないとギルド全員が対象になる
    #[error("no protected roles configured; refusing to kick every member")]
    NoProtectedRoles,

    #[error(transparent)]
    Platform(#[from] PlatformError),
}
