//! テスト用の fake 実装（ChannelGateway / MemberGateway / 失敗する TaskStore）

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::domain::{
    ChannelId, GuildId, HistoryQuery, MemberSummary, MessageId, MessageSummary,
    PersistedPurgeRecord, PlatformError, StoreError, UserId,
};
use crate::ports::{ChannelGateway, ChannelInfo, ChannelKind, MemberGateway, TaskStore};

/// Lets spawned jobs run until they block again.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn text_channel(id: u64) -> ChannelInfo {
    ChannelInfo {
        id: ChannelId::new(id),
        guild_id: Some(GuildId::new(1)),
        name: format!("channel-{id}"),
        kind: ChannelKind::Text,
    }
}

#[derive(Default)]
struct ChannelsState {
    channels: HashMap<ChannelId, ChannelInfo>,
    resolve_failures: HashMap<ChannelId, PlatformError>,
    history: HashMap<ChannelId, Vec<MessageSummary>>,
    fetch_failures: HashMap<ChannelId, VecDeque<PlatformError>>,
    send_failures: HashMap<ChannelId, PlatformError>,
    send_delay: Option<Duration>,
    delete_failures: HashMap<ChannelId, VecDeque<PlatformError>>,
    fetches: HashMap<ChannelId, usize>,
    sent: Vec<(ChannelId, String)>,
    deleted: Vec<(ChannelId, Vec<MessageId>)>,
    next_message_id: u64,
}

/// Recording fake of the messaging side of the platform.
///
/// 送信したメッセージは `ts(0)` の時刻で履歴に追加される（= 十分古い）。
/// マーカーを除外し忘れると削除されてしまうので、除外のテストになる。
#[derive(Default)]
pub struct FakeChannels {
    state: Mutex<ChannelsState>,
}

impl FakeChannels {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ChannelsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_channel(&self, info: ChannelInfo) {
        self.lock().channels.insert(info.id, info);
    }

    pub fn fail_resolve(&self, channel: ChannelId, err: PlatformError) {
        self.lock().resolve_failures.insert(channel, err);
    }

    pub fn add_message(&self, channel: ChannelId, message: MessageSummary) {
        self.lock().history.entry(channel).or_default().push(message);
    }

    /// The next fetch for `channel` fails with `err` (queued, one per call).
    pub fn fail_next_fetch(&self, channel: ChannelId, err: PlatformError) {
        self.lock()
            .fetch_failures
            .entry(channel)
            .or_default()
            .push_back(err);
    }

    pub fn fail_sends(&self, channel: ChannelId, err: PlatformError) {
        self.lock().send_failures.insert(channel, err);
    }

    /// Every send takes `delay` (tokio time) before it is recorded.
    pub fn delay_sends(&self, delay: Duration) {
        self.lock().send_delay = Some(delay);
    }

    /// The next delete in `channel` fails with `err` (queued, one per call).
    pub fn fail_next_delete(&self, channel: ChannelId, err: PlatformError) {
        self.lock()
            .delete_failures
            .entry(channel)
            .or_default()
            .push_back(err);
    }

    pub fn sent_to(&self, channel: ChannelId) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn deleted_in(&self, channel: ChannelId) -> Vec<MessageId> {
        self.lock()
            .deleted
            .iter()
            .filter(|(c, _)| *c == channel)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    pub fn history_of(&self, channel: ChannelId) -> Vec<MessageId> {
        self.lock()
            .history
            .get(&channel)
            .map(|h| h.iter().map(|m| m.id).collect())
            .unwrap_or_default()
    }

    pub fn fetch_count(&self, channel: ChannelId) -> usize {
        self.lock().fetches.get(&channel).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ChannelGateway for FakeChannels {
    async fn resolve_channel(
        &self,
        channel: ChannelId,
    ) -> Result<Option<ChannelInfo>, PlatformError> {
        let state = self.lock();
        if let Some(err) = state.resolve_failures.get(&channel) {
            return Err(err.clone());
        }
        Ok(state.channels.get(&channel).cloned())
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, PlatformError> {
        let delay = self.lock().send_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(err) = state.send_failures.get(&channel) {
            return Err(err.clone());
        }
        state.next_message_id += 1;
        let id = MessageId::new(1_000_000 + state.next_message_id);
        state.sent.push((channel, content.to_string()));
        state.history.entry(channel).or_default().push(MessageSummary {
            id,
            created_at: ts(0),
            pinned: false,
        });
        Ok(id)
    }

    async fn fetch_history(
        &self,
        channel: ChannelId,
        query: HistoryQuery,
    ) -> Result<Vec<MessageSummary>, PlatformError> {
        let mut state = self.lock();
        *state.fetches.entry(channel).or_default() += 1;
        if let Some(err) = state
            .fetch_failures
            .get_mut(&channel)
            .and_then(|q| q.pop_front())
        {
            return Err(err);
        }

        let mut messages: Vec<_> = state
            .history
            .get(&channel)
            .map(|h| {
                h.iter()
                    .filter(|m| m.created_at < query.before)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        messages.sort_by_key(|m| m.created_at);
        messages.truncate(query.limit);
        Ok(messages)
    }

    async fn delete_messages(
        &self,
        channel: ChannelId,
        messages: &[MessageId],
    ) -> Result<(), PlatformError> {
        let mut state = self.lock();
        if let Some(err) = state
            .delete_failures
            .get_mut(&channel)
            .and_then(|q| q.pop_front())
        {
            return Err(err);
        }
        if let Some(history) = state.history.get_mut(&channel) {
            history.retain(|m| !messages.contains(&m.id));
        }
        state.deleted.push((channel, messages.to_vec()));
        Ok(())
    }
}

/// TaskStore whose every call fails.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl TaskStore for FailingStore {
    async fn list_all(&self) -> Result<Vec<PersistedPurgeRecord>, StoreError> {
        Err(StoreError::Other("disk on fire".into()))
    }

    async fn upsert(&self, _record: PersistedPurgeRecord) -> Result<(), StoreError> {
        Err(StoreError::Other("disk on fire".into()))
    }

    async fn delete(&self, _channel_id: ChannelId) -> Result<(), StoreError> {
        Err(StoreError::Other("disk on fire".into()))
    }
}

#[derive(Default)]
struct MembersState {
    members: Vec<MemberSummary>,
    kick_failures: HashMap<UserId, PlatformError>,
    kicked: Vec<UserId>,
    timeouts: Vec<(UserId, DateTime<Utc>, Option<String>)>,
}

/// Recording fake of the member-management side of the platform.
#[derive(Default)]
pub struct FakeMembers {
    state: Mutex<MembersState>,
}

impl FakeMembers {
    pub fn with_members(members: Vec<MemberSummary>) -> Self {
        let fake = Self::default();
        fake.lock().members = members;
        fake
    }

    fn lock(&self) -> MutexGuard<'_, MembersState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_kick(&self, user: UserId, err: PlatformError) {
        self.lock().kick_failures.insert(user, err);
    }

    pub fn kicked(&self) -> Vec<UserId> {
        self.lock().kicked.clone()
    }

    pub fn timeouts(&self) -> Vec<(UserId, DateTime<Utc>, Option<String>)> {
        self.lock().timeouts.clone()
    }
}

#[async_trait]
impl MemberGateway for FakeMembers {
    async fn list_members(&self, _guild: GuildId) -> Result<Vec<MemberSummary>, PlatformError> {
        Ok(self.lock().members.clone())
    }

    async fn kick(&self, _guild: GuildId, user: UserId) -> Result<(), PlatformError> {
        let mut state = self.lock();
        if let Some(err) = state.kick_failures.get(&user) {
            return Err(err.clone());
        }
        state.kicked.push(user);
        Ok(())
    }

    async fn timeout(
        &self,
        _guild: GuildId,
        user: UserId,
        until: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<(), PlatformError> {
        self.lock()
            .timeouts
            .push((user, until, reason.map(str::to_string)));
        Ok(())
    }
}
