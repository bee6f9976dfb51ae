//! SchedulerBuilder - PurgeScheduler の構築とワイヤリング
//!
//! # 検証（Fail-fast）
//! - TaskStore と ChannelGateway が設定されていること
//! - DurationPolicy が `0 < min <= max`、`max_tick > 0` を満たすこと
//!
//! Clock は省略時 SystemClock、policy は省略時 `DurationPolicy::default()`。

use std::sync::Arc;
use std::time::Duration;

use crate::domain::DurationPolicy;
use crate::ports::{ChannelGateway, Clock, SystemClock, TaskStore};

use super::scheduler::PurgeScheduler;

/// Builds a [`PurgeScheduler`].
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new()
///     .store(Arc::new(SqliteTaskStore::open("kms.db").await?))
///     .channels(Arc::new(gateway))
///     .build()?;
/// ```
#[derive(Default)]
pub struct SchedulerBuilder {
    policy: DurationPolicy,
    store: Option<Arc<dyn TaskStore>>,
    channels: Option<Arc<dyn ChannelGateway>>,
    clock: Option<Arc<dyn Clock>>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("no task store configured")]
    MissingStore,

    #[error("no channel gateway configured")]
    MissingChannels,

    #[error("invalid retention bounds: min {min:?}, max {max:?}")]
    InvalidRetention { min: Duration, max: Duration },

    #[error("tick cap must be positive")]
    ZeroTick,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(mut self, policy: DurationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn channels(mut self, channels: Arc<dyn ChannelGateway>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<PurgeScheduler, BuildError> {
        let policy = self.policy;
        if policy.min_retention.is_zero() || policy.min_retention > policy.max_retention {
            return Err(BuildError::InvalidRetention {
                min: policy.min_retention,
                max: policy.max_retention,
            });
        }
        // tick は秒単位で計算するので 1 秒未満は 0 扱い
        if policy.max_tick.as_secs() == 0 {
            return Err(BuildError::ZeroTick);
        }

        let store = self.store.ok_or(BuildError::MissingStore)?;
        let channels = self.channels.ok_or(BuildError::MissingChannels)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(PurgeScheduler::new(policy, store, channels, clock))
    }
}
