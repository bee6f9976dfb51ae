//! Purge - スケジュールの永続レコードと 1 回分の purge pass の判定
//!
//! # 設計
//! - `PersistedPurgeRecord`: ストレージに保存される channel_id → 保持秒数
//! - `PurgeSchedule`: 稼働中ジョブの読み取り専用ビュー
//! - `select_purgeable`: 取得したメッセージから削除対象を選ぶ（純粋関数）

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::duration::{ClampNotice, format_duration};
use super::ids::{ChannelId, JobId, MessageId};

/// Max messages fetched (and therefore deleted) per purge pass.
pub const PURGE_BATCH_LIMIT: usize = 100;

/// Durable schedule record, keyed by channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPurgeRecord {
    pub channel_id: ChannelId,
    pub purge_duration_seconds: i64,
}

impl PersistedPurgeRecord {
    pub fn new(channel_id: ChannelId, retention: Duration) -> Self {
        Self {
            channel_id,
            purge_duration_seconds: i64::try_from(retention.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// 負の値は 0 秒として扱う（クランプで最小値に引き上げられる）
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.purge_duration_seconds).unwrap_or(0))
    }
}

/// Read-only view of one active purge job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeSchedule {
    pub channel_id: ChannelId,
    pub job_id: JobId,
    pub retention: Duration,
    pub tick: Duration,
    pub marker: MessageId,
}

/// What the scheduler reports back to the caller of `set_schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub effective: Duration,
    pub tick: Duration,
    pub notice: Option<ClampNotice>,
    pub job_id: JobId,
}

/// Minimal message metadata needed to decide whether to purge it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSummary {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
    pub pinned: bool,
}

/// Query for one purge pass: oldest messages first, at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub before: DateTime<Utc>,
    pub limit: usize,
}

/// Picks the messages a purge pass deletes.
///
/// 対象:
/// - `cutoff` より古い
/// - ピン留めされていない
/// - スケジューラ自身のマーカーメッセージではない
///
/// 入力順（古い順）を保ったまま最大 `PURGE_BATCH_LIMIT` 件を返す。
pub fn select_purgeable(
    messages: &[MessageSummary],
    cutoff: DateTime<Utc>,
    marker: MessageId,
) -> Vec<MessageId> {
    messages
        .iter()
        .filter(|m| m.created_at < cutoff && !m.pinned && m.id != marker)
        .map(|m| m.id)
        .take(PURGE_BATCH_LIMIT)
        .collect()
}

/// Text of the marker message posted when a schedule is (re)armed.
pub fn marker_text(retention: Duration) -> String {
    format!(
        "messages older than {} will be deleted on a rolling basis in this channel.",
        format_duration(retention)
    )
}

/// Text posted when the requested age had to be clamped.
pub fn clamp_notice_text(notice: ClampNotice, bound: Duration) -> String {
    match notice {
        ClampNotice::TooShort => {
            format!("minimum duration to kms is {}.", format_duration(bound))
        }
        ClampNotice::TooLong => {
            format!("maximum duration to kms is {}.", format_duration(bound))
        }
    }
}

/// Text posted when a schedule halts because delete rights were revoked.
pub const MISSING_PERMISSIONS_TEXT: &str = "Σ(°Д°) kms stopped: missing permissions.";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn msg(id: u64, secs: i64, pinned: bool) -> MessageSummary {
        MessageSummary {
            id: MessageId::new(id),
            created_at: at(secs),
            pinned,
        }
    }

    #[test]
    fn selects_only_old_unpinned_non_marker_messages() {
        let messages = vec![
            msg(1, 0, false),
            msg(2, 1, true),
            msg(3, 2, false), // marker
            msg(4, 3, false),
            msg(5, 100, false), // newer than cutoff
        ];

        let selected = select_purgeable(&messages, at(50), MessageId::new(3));
        assert_eq!(selected, vec![MessageId::new(1), MessageId::new(4)]);
    }

    #[test]
    fn message_exactly_at_cutoff_is_kept() {
        let messages = vec![msg(1, 10, false)];
        assert!(select_purgeable(&messages, at(10), MessageId::new(99)).is_empty());
    }

    #[test]
    fn selection_is_capped_at_batch_limit() {
        let messages: Vec<_> = (0..150).map(|i| msg(i + 1, i as i64, false)).collect();
        let selected = select_purgeable(&messages, at(1_000), MessageId::new(0));
        assert_eq!(selected.len(), PURGE_BATCH_LIMIT);
        assert_eq!(selected[0], MessageId::new(1));
    }

    #[test]
    fn record_round_trips_retention() {
        let record = PersistedPurgeRecord::new(ChannelId::new(42), Duration::from_secs(60));
        assert_eq!(record.purge_duration_seconds, 60);
        assert_eq!(record.retention(), Duration::from_secs(60));
    }

    #[test]
    fn negative_stored_duration_reads_as_zero() {
        let record = PersistedPurgeRecord {
            channel_id: ChannelId::new(1),
            purge_duration_seconds: -5,
        };
        assert_eq!(record.retention(), Duration::ZERO);
    }

    #[test]
    fn notice_texts_use_formatted_bounds() {
        assert_eq!(
            clamp_notice_text(ClampNotice::TooShort, Duration::from_secs(3)),
            "minimum duration to kms is 3 seconds."
        );
        assert_eq!(
            marker_text(Duration::from_secs(86_400)),
            "messages older than 1 day will be deleted on a rolling basis in this channel."
        );
    }
}
