//! Chat platform ports
//!
//! コマンド登録や接続処理はここには含めない（bot クレート側の責務）。
//! コアが必要とするのは以下だけ:
//! - チャンネル: 解決 / 送信 / 履歴取得 / 削除
//! - メンバー: 一覧 / キック / タイムアウト

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ChannelId, GuildId, HistoryQuery, MemberSummary, MessageId, MessageSummary, PlatformError,
    UserId,
};

/// Channel type, as far as the scheduler cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Other,
}

/// A channel resolved through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub name: String,
    pub kind: ChannelKind,
}

impl ChannelInfo {
    pub fn is_text(&self) -> bool {
        self.kind == ChannelKind::Text
    }
}

/// Messaging side of the chat platform.
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    /// Looks up a channel the bot can currently see.
    ///
    /// 見つからない / アクセスできない場合は `Ok(None)` または `Err` を返す。
    async fn resolve_channel(&self, channel: ChannelId)
    -> Result<Option<ChannelInfo>, PlatformError>;

    async fn send_message(&self, channel: ChannelId, content: &str)
    -> Result<MessageId, PlatformError>;

    /// Oldest-first history older than `query.before`, at most `query.limit` items.
    async fn fetch_history(
        &self,
        channel: ChannelId,
        query: HistoryQuery,
    ) -> Result<Vec<MessageSummary>, PlatformError>;

    /// Deletes the given messages; implementations pick bulk or single deletes.
    async fn delete_messages(
        &self,
        channel: ChannelId,
        messages: &[MessageId],
    ) -> Result<(), PlatformError>;
}

/// Member-management side of the chat platform.
#[async_trait]
pub trait MemberGateway: Send + Sync {
    async fn list_members(&self, guild: GuildId) -> Result<Vec<MemberSummary>, PlatformError>;

    async fn kick(&self, guild: GuildId, user: UserId) -> Result<(), PlatformError>;

    async fn timeout(
        &self,
        guild: GuildId,
        user: UserId,
        until: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<(), PlatformError>;
}
