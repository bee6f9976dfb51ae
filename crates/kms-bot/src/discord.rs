//! Discord implementation of the core chat ports (serenity HTTP client).
//!
//! # エラー分類
//! Discord の JSON エラーコードで PlatformError に振り分ける:
//! - 50001 Missing Access → `MissingAccess`
//! - 50013 Missing Permissions → `MissingPermissions`
//! - 10003 Unknown Channel / 10008 Unknown Message / 10007 Unknown Member → `NotFound`
//! - その他（レート制限、ネットワーク等）→ `Other`（次の tick で再試行）

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use kms_core::domain::{
    ChannelId, GuildId, HistoryQuery, MemberSummary, MessageId, MessageSummary, PlatformError,
    RoleId, UserId,
};
use kms_core::ports::{ChannelGateway, ChannelInfo, ChannelKind, MemberGateway};
use poise::serenity_prelude as serenity;
use tracing::debug;

const MISSING_ACCESS: isize = 50001;
const MISSING_PERMISSIONS: isize = 50013;
const UNKNOWN_CHANNEL: isize = 10003;
const UNKNOWN_MEMBER: isize = 10007;
const UNKNOWN_MESSAGE: isize = 10008;

/// First millisecond of the Discord snowflake epoch (2015-01-01T00:00:00Z).
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// Bulk delete only accepts messages younger than this many days.
const BULK_DELETE_MAX_AGE_DAYS: i64 = 14;

/// Page size for member listing.
const MEMBER_PAGE: u64 = 1000;

/// Discord gateway backed by the serenity HTTP client.
#[derive(Clone)]
pub struct DiscordGateway {
    http: Arc<serenity::Http>,
}

impl DiscordGateway {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChannelGateway for DiscordGateway {
    async fn resolve_channel(
        &self,
        channel: ChannelId,
    ) -> Result<Option<ChannelInfo>, PlatformError> {
        let found = match self.http.get_channel(to_channel(channel)).await {
            Ok(found) => found,
            Err(err) => {
                return match classify(&err) {
                    PlatformError::NotFound(_) => Ok(None),
                    other => Err(other),
                };
            }
        };

        let info = match found {
            serenity::Channel::Guild(gc) => ChannelInfo {
                id: channel,
                guild_id: Some(GuildId::new(gc.guild_id.get())),
                name: gc.name,
                kind: if gc.kind == serenity::ChannelType::Text {
                    ChannelKind::Text
                } else {
                    ChannelKind::Other
                },
            },
            _ => ChannelInfo {
                id: channel,
                guild_id: None,
                name: String::new(),
                kind: ChannelKind::Other,
            },
        };
        Ok(Some(info))
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, PlatformError> {
        let sent = to_channel(channel)
            .say(&*self.http, content)
            .await
            .map_err(|e| classify(&e))?;
        Ok(MessageId::new(sent.id.get()))
    }

    async fn fetch_history(
        &self,
        channel: ChannelId,
        query: HistoryQuery,
    ) -> Result<Vec<MessageSummary>, PlatformError> {
        // after を指定すると古い順の先頭 limit 件が返る
        let limit = u8::try_from(query.limit.min(100)).unwrap_or(100);
        let builder = serenity::GetMessages::new()
            .after(serenity::MessageId::new(1))
            .limit(limit);
        let messages = to_channel(channel)
            .messages(&*self.http, builder)
            .await
            .map_err(|e| classify(&e))?;

        let mut summaries: Vec<_> = messages
            .into_iter()
            .filter_map(|m| {
                let created_at = DateTime::from_timestamp(m.timestamp.unix_timestamp(), 0)?;
                Some(MessageSummary {
                    id: MessageId::new(m.id.get()),
                    created_at,
                    pinned: m.pinned,
                })
            })
            .filter(|m| m.created_at < query.before)
            .collect();
        summaries.sort_by_key(|m| (m.created_at, m.id));
        Ok(summaries)
    }

    async fn delete_messages(
        &self,
        channel: ChannelId,
        messages: &[MessageId],
    ) -> Result<(), PlatformError> {
        let target = to_channel(channel);
        let horizon = Utc::now() - TimeDelta::days(BULK_DELETE_MAX_AGE_DAYS);
        let (bulk, single): (Vec<_>, Vec<_>) = messages
            .iter()
            .map(|id| serenity::MessageId::new(id.get()))
            .partition(|id| snowflake_time(id.get()).is_some_and(|at| at > horizon));

        match bulk.as_slice() {
            [] => {}
            [only] => target
                .delete_message(&*self.http, *only)
                .await
                .map_err(|e| classify(&e))?,
            many => target
                .delete_messages(&*self.http, many)
                .await
                .map_err(|e| classify(&e))?,
        }

        for id in single {
            if let Err(err) = target.delete_message(&*self.http, id).await {
                match classify(&err) {
                    // 既に消えていれば問題ない
                    PlatformError::NotFound(_) => debug!(%channel, message = %id, "already deleted"),
                    other => return Err(other),
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MemberGateway for DiscordGateway {
    async fn list_members(&self, guild: GuildId) -> Result<Vec<MemberSummary>, PlatformError> {
        let guild = serenity::GuildId::new(guild.get());
        let mut all = Vec::new();
        let mut after: Option<serenity::UserId> = None;

        loop {
            let page = guild
                .members(&*self.http, Some(MEMBER_PAGE), after)
                .await
                .map_err(|e| classify(&e))?;
            let full = page.len() as u64 == MEMBER_PAGE;
            after = page.last().map(|m| m.user.id);

            all.extend(page.into_iter().map(|m| MemberSummary {
                user_id: UserId::new(m.user.id.get()),
                name: m.user.name,
                roles: m.roles.iter().map(|r| RoleId::new(r.get())).collect(),
            }));

            if !full || after.is_none() {
                break;
            }
        }
        Ok(all)
    }

    async fn kick(&self, guild: GuildId, user: UserId) -> Result<(), PlatformError> {
        serenity::GuildId::new(guild.get())
            .kick(&*self.http, serenity::UserId::new(user.get()))
            .await
            .map_err(|e| classify(&e))
    }

    async fn timeout(
        &self,
        guild: GuildId,
        user: UserId,
        until: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<(), PlatformError> {
        let mut edit = serenity::EditMember::new().disable_communication_until(until.to_rfc3339());
        if let Some(reason) = reason {
            edit = edit.audit_log_reason(reason);
        }
        serenity::GuildId::new(guild.get())
            .edit_member(&*self.http, serenity::UserId::new(user.get()), edit)
            .await
            .map(|_| ())
            .map_err(|e| classify(&e))
    }
}

fn to_channel(channel: ChannelId) -> serenity::ChannelId {
    serenity::ChannelId::new(channel.get())
}

/// Creation time encoded in a Discord snowflake.
fn snowflake_time(raw: u64) -> Option<DateTime<Utc>> {
    let ms = (raw >> 22).checked_add(DISCORD_EPOCH_MS)?;
    DateTime::from_timestamp_millis(i64::try_from(ms).ok()?)
}

/// Maps a serenity error onto the core error classes.
fn classify(err: &serenity::Error) -> PlatformError {
    if let serenity::Error::Http(http) = err {
        let http: &serenity::HttpError = http;
        if let serenity::HttpError::UnsuccessfulRequest(resp) = http {
            return classify_code(resp.error.code, &resp.error.message);
        }
    }
    PlatformError::Other(err.to_string())
}

fn classify_code(code: isize, message: &str) -> PlatformError {
    match code {
        MISSING_ACCESS => PlatformError::MissingAccess,
        MISSING_PERMISSIONS => PlatformError::MissingPermissions,
        UNKNOWN_CHANNEL | UNKNOWN_MEMBER | UNKNOWN_MESSAGE => {
            PlatformError::NotFound(message.to_string())
        }
        _ => PlatformError::Other(format!("discord error {code}: {message}")),
    }
}
