//! PurgeScheduler - チャンネルごとの繰り返し purge ジョブの管理
//!
//! # 状態
//! - registry: ChannelId → ActiveJob（稼働中プロセスの正本）
//! - TaskStore: 再起動用の写し（ベストエフォート）
//!
//! # 不変条件
//! - 1 チャンネルにつき稼働中ジョブは高々 1 つ
//! - registry の変更と対応するストア書き込みは同じクリティカルセクション内で行う
//! - 置き換えられた旧ジョブは、新ジョブの 1 回目の pass より前に終わっている
//! - 置き換え時の旧ジョブは告知メッセージを送る前に止める
//!
//! # purge pass の失敗時
//! - MissingAccess: ジョブ停止 + レコード削除（通知なし）
//! - MissingPermissions: ジョブ停止 + レコード削除 + チャンネルに通知（失敗は無視）
//! - それ以外: ログだけ出して次の tick で再試行

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ticker::{TickFlow, Ticker};
use crate::domain::purge::{MISSING_PERMISSIONS_TEXT, clamp_notice_text, marker_text};
use crate::domain::{
    ChannelId, ClampNotice, DurationPolicy, HistoryQuery, JobId, MessageId, PURGE_BATCH_LIMIT,
    PersistedPurgeRecord, PlatformError, PurgeSchedule, ScheduleOutcome, SchedulerError,
    format_duration, select_purgeable,
};
use crate::ports::{ChannelGateway, Clock, TaskStore};

struct ActiveJob {
    schedule: PurgeSchedule,
    ticker: Ticker,
}

pub(crate) struct SchedulerInner {
    pub(crate) policy: DurationPolicy,
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) channels: Arc<dyn ChannelGateway>,
    pub(crate) clock: Arc<dyn Clock>,
    registry: Mutex<HashMap<ChannelId, ActiveJob>>,
}

/// Owns every active per-channel purge job.
///
/// Clone は同じレジストリを共有する（`Arc` の薄いラッパー）。
#[derive(Clone)]
pub struct PurgeScheduler {
    inner: Arc<SchedulerInner>,
}

impl PurgeScheduler {
    pub(crate) fn new(
        policy: DurationPolicy,
        store: Arc<dyn TaskStore>,
        channels: Arc<dyn ChannelGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                policy,
                store,
                channels,
                clock,
                registry: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn policy(&self) -> &DurationPolicy {
        &self.inner.policy
    }

    pub(crate) fn store(&self) -> &Arc<dyn TaskStore> {
        &self.inner.store
    }

    pub(crate) fn channels(&self) -> &Arc<dyn ChannelGateway> {
        &self.inner.channels
    }

    /// (Re)arms the rolling purge for `channel`.
    ///
    /// 1. 要求された保持期間をクランプ
    /// 2. 旧ジョブを止める（実行中の pass は新ジョブの開始前に終わる）
    /// 3. クランプしたらチャンネルに通知し、マーカーメッセージを投稿
    /// 4. 新ジョブを起動して registry に登録
    /// 5. レコードを upsert（失敗はログのみ）
    ///
    /// 2〜5 は registry のロックを持ったまま行うので、同時の呼び出しは直列になる。
    /// マーカーを投稿できなかった場合はレコードも消して `SchedulerError::Announce` を返す。
    pub async fn set_schedule(
        &self,
        channel: ChannelId,
        requested: Duration,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        let policy = self.inner.policy;
        let clamped = policy.clamp(requested);
        let effective = clamped.effective;
        let tick = policy.tick_interval(effective);

        let mut registry = self.inner.registry.lock().await;
        let predecessor = registry.remove(&channel).map(|old| {
            debug!(%channel, job_id = %old.schedule.job_id, "replacing purge job");
            old.ticker.cancel_into_handle()
        });

        if let Some(notice) = clamped.notice {
            let bound = match notice {
                ClampNotice::TooShort => policy.min_retention,
                ClampNotice::TooLong => policy.max_retention,
            };
            if let Err(err) = self
                .inner
                .channels
                .send_message(channel, &clamp_notice_text(notice, bound))
                .await
            {
                warn!(%channel, error = %err, "failed to post clamp notice");
            }
        }

        let marker = match self
            .inner
            .channels
            .send_message(channel, &marker_text(effective))
            .await
        {
            Ok(marker) => marker,
            Err(source) => {
                self.inner.forget(channel).await;
                return Err(SchedulerError::Announce {
                    channel_id: channel,
                    source,
                });
            }
        };

        let schedule = PurgeSchedule {
            channel_id: channel,
            job_id: JobId::generate(),
            retention: effective,
            tick,
            marker,
        };

        let inner = Arc::clone(&self.inner);
        let ticker = Ticker::start(tick, predecessor, move || {
            let inner = Arc::clone(&inner);
            async move { inner.on_tick(schedule).await }
        });
        registry.insert(channel, ActiveJob { schedule, ticker });
        self.inner
            .persist(PersistedPurgeRecord::new(channel, effective))
            .await;
        drop(registry);

        info!(
            %channel,
            job_id = %schedule.job_id,
            retention = %format_duration(effective),
            tick_secs = tick.as_secs(),
            "purge job started"
        );

        Ok(ScheduleOutcome {
            effective,
            tick,
            notice: clamped.notice,
            job_id: schedule.job_id,
        })
    }

    /// Stops the purge for `channel`. Returns whether a job was active.
    ///
    /// 実行中の pass は最後まで走るが、次の tick は来ない。
    pub async fn stop_schedule(&self, channel: ChannelId) -> bool {
        let mut registry = self.inner.registry.lock().await;
        let Some(active) = registry.remove(&channel) else {
            return false;
        };
        active.ticker.cancel();
        self.inner.forget(channel).await;
        drop(registry);

        info!(%channel, job_id = %active.schedule.job_id, "purge job stopped");
        true
    }

    pub async fn is_active(&self, channel: ChannelId) -> bool {
        self.inner.registry.lock().await.contains_key(&channel)
    }

    pub async fn schedule_of(&self, channel: ChannelId) -> Option<PurgeSchedule> {
        self.inner
            .registry
            .lock()
            .await
            .get(&channel)
            .map(|active| active.schedule)
    }

    pub async fn active_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<_> = self.inner.registry.lock().await.keys().copied().collect();
        channels.sort();
        channels
    }

    /// Cancels every job and waits for in-flight passes. Records are kept.
    pub async fn shutdown(&self) {
        let jobs: Vec<ActiveJob> = self
            .inner
            .registry
            .lock()
            .await
            .drain()
            .map(|(_, job)| job)
            .collect();

        let count = jobs.len();
        for job in jobs {
            job.ticker.cancel_and_join().await;
        }
        info!(jobs = count, "purge scheduler shut down");
    }
}

impl SchedulerInner {
    async fn on_tick(&self, schedule: PurgeSchedule) -> TickFlow {
        let channel = schedule.channel_id;
        let cutoff = cutoff_for(self.clock.now(), schedule.retention);

        match self.purge_pass(channel, cutoff, schedule.marker).await {
            Ok(0) => TickFlow::Continue,
            Ok(deleted) => {
                debug!(%channel, deleted, "purge pass done");
                TickFlow::Continue
            }
            Err(PlatformError::MissingAccess) => {
                warn!(%channel, "missing access; dropping purge job");
                if self.retire(channel, schedule.job_id).await {
                    info!(%channel, "deleted purge task");
                }
                TickFlow::Stop
            }
            Err(PlatformError::MissingPermissions) => {
                warn!(%channel, "missing permissions; dropping purge job");
                if self.retire(channel, schedule.job_id).await
                    && let Err(err) = self
                        .channels
                        .send_message(channel, MISSING_PERMISSIONS_TEXT)
                        .await
                {
                    debug!(%channel, error = %err, "could not report missing permissions");
                }
                TickFlow::Stop
            }
            Err(err) => {
                warn!(%channel, error = %err, "purge pass failed; retrying next tick");
                TickFlow::Continue
            }
        }
    }

    /// One fetch + delete round.
    async fn purge_pass(
        &self,
        channel: ChannelId,
        cutoff: DateTime<Utc>,
        marker: MessageId,
    ) -> Result<usize, PlatformError> {
        let query = HistoryQuery {
            before: cutoff,
            limit: PURGE_BATCH_LIMIT,
        };
        let messages = self.channels.fetch_history(channel, query).await?;
        let doomed = select_purgeable(&messages, cutoff, marker);
        if doomed.is_empty() {
            return Ok(0);
        }
        self.channels.delete_messages(channel, &doomed).await?;
        Ok(doomed.len())
    }

    /// Removes `job_id` from the registry (and its record) if it is still current.
    ///
    /// 既に新しいジョブに置き換えられていたら何もしない（後任を壊さない）。
    async fn retire(&self, channel: ChannelId, job_id: JobId) -> bool {
        let mut registry = self.registry.lock().await;
        let is_current = registry
            .get(&channel)
            .is_some_and(|active| active.schedule.job_id == job_id);
        if !is_current {
            debug!(%channel, %job_id, "superseded purge job exits without teardown");
            return false;
        }

        if let Some(active) = registry.remove(&channel) {
            active.ticker.cancel();
        }
        self.forget(channel).await;
        true
    }

    async fn persist(&self, record: PersistedPurgeRecord) {
        if let Err(err) = self.store.upsert(record).await {
            warn!(
                channel = %record.channel_id,
                error = %err,
                "failed to persist purge task; continuing in memory"
            );
        }
    }

    async fn forget(&self, channel: ChannelId) {
        if let Err(err) = self.store.delete(channel).await {
            warn!(%channel, error = %err, "failed to delete persisted purge task");
        }
    }
}

fn cutoff_for(now: DateTime<Utc>, retention: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(retention)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
