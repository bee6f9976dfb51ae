//! Reconciler - 起動時に保存済みスケジュールを復元する
//!
//! # フロー
//! 1. TaskStore から全レコードを読む（失敗したら何もしない）
//! 2. レコードごとにチャンネルを解決
//!    - 見つからない / 解決に失敗 / テキストチャンネルでない → レコード削除
//! 3. `set_schedule` で再開（失敗したらレコード削除）
//!
//! 1 件の失敗が他のレコードの復元を妨げることはない。

use tracing::{info, warn};

use crate::domain::{ChannelId, PersistedPurgeRecord};
use crate::ports::ChannelInfo;

use super::scheduler::PurgeScheduler;

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: Vec<ChannelId>,
    pub pruned: Vec<ChannelId>,
}

pub struct Reconciler {
    scheduler: PurgeScheduler,
}

impl Reconciler {
    pub fn new(scheduler: PurgeScheduler) -> Self {
        Self { scheduler }
    }

    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let records = match self.scheduler.store().list_all().await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "could not load purge tasks; nothing restored");
                return report;
            }
        };

        for record in records {
            let channel = record.channel_id;
            if self.restore(record).await {
                report.started.push(channel);
            } else {
                if let Err(err) = self.scheduler.store().delete(channel).await {
                    warn!(%channel, error = %err, "failed to prune purge task");
                }
                report.pruned.push(channel);
            }
        }

        info!(
            started = report.started.len(),
            pruned = report.pruned.len(),
            "purge tasks reconciled"
        );
        report
    }

    async fn restore(&self, record: PersistedPurgeRecord) -> bool {
        let channel = record.channel_id;
        let info = match self.scheduler.channels().resolve_channel(channel).await {
            Ok(Some(info)) if info.is_text() => info,
            Ok(Some(ChannelInfo { name, kind, .. })) => {
                warn!(%channel, %name, ?kind, "persisted channel is not a text channel");
                return false;
            }
            Ok(None) => {
                warn!(%channel, "persisted channel no longer exists");
                return false;
            }
            Err(err) => {
                warn!(%channel, error = %err, "could not resolve persisted channel");
                return false;
            }
        };

        match self
            .scheduler
            .set_schedule(channel, record.retention())
            .await
        {
            Ok(outcome) => {
                info!(
                    %channel,
                    name = %info.name,
                    guild = ?info.guild_id,
                    job_id = %outcome.job_id,
                    "restored purge task"
                );
                true
            }
            Err(err) => {
                warn!(%channel, error = %err, "could not restore purge task");
                false
            }
        }
    }
}
