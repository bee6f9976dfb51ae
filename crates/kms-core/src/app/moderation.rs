//! ModerationService - ロール基準の一括キックとセルフタイムアウト

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use crate::domain::{GuildId, MemberPurgePlan, ModerationError, RoleId, UserId, plan_member_purge};
use crate::ports::{Clock, MemberGateway, SystemClock};

/// Longest timeout the platform accepts.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(28 * 24 * 60 * 60);

/// Result of [`ModerationService::purge_members`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPurgeReport {
    pub plan: MemberPurgePlan,
    pub dry_run: bool,
    pub kicked: usize,
    pub failed: usize,
}

pub struct ModerationService {
    members: Arc<dyn MemberGateway>,
    clock: Arc<dyn Clock>,
}

impl ModerationService {
    pub fn new(members: Arc<dyn MemberGateway>) -> Self {
        Self::with_clock(members, Arc::new(SystemClock))
    }

    pub fn with_clock(members: Arc<dyn MemberGateway>, clock: Arc<dyn Clock>) -> Self {
        Self { members, clock }
    }

    /// Kicks every member of `guild` without one of the `protected` roles.
    ///
    /// - `protected` が空ならエラー（全員キックは受け付けない）
    /// - `bot_user`（bot 自身）はロールに関係なく保護する
    /// - `dry_run` なら計画だけ返す
    /// - 個別のキック失敗はログに残して数えるだけで、残りは続行する
    pub async fn purge_members(
        &self,
        guild: GuildId,
        bot_user: UserId,
        protected: &HashSet<RoleId>,
        dry_run: bool,
    ) -> Result<MemberPurgeReport, ModerationError> {
        if protected.is_empty() {
            return Err(ModerationError::NoProtectedRoles);
        }

        let members = self.members.list_members(guild).await?;
        let (bot, members): (Vec<_>, Vec<_>) =
            members.into_iter().partition(|m| m.user_id == bot_user);
        let mut plan = plan_member_purge(members, protected);
        plan.protected.extend(bot);
        info!(
            %guild,
            protected = plan.protected.len(),
            to_kick = plan.to_kick.len(),
            dry_run,
            "member purge planned"
        );

        let mut report = MemberPurgeReport {
            plan,
            dry_run,
            ..MemberPurgeReport::default()
        };
        if dry_run {
            return Ok(report);
        }

        for member in &report.plan.to_kick {
            match self.members.kick(guild, member.user_id).await {
                Ok(()) => report.kicked += 1,
                Err(err) => {
                    warn!(%guild, user = %member.user_id, name = %member.name, error = %err, "kick failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Times `user` out for `duration`. Returns when the timeout ends.
    pub async fn self_timeout(
        &self,
        guild: GuildId,
        user: UserId,
        duration: Duration,
        reason: Option<&str>,
    ) -> Result<DateTime<Utc>, ModerationError> {
        if duration.is_zero() {
            return Err(ModerationError::ZeroTimeout);
        }
        if duration > MAX_TIMEOUT {
            return Err(ModerationError::TimeoutTooLong(duration));
        }

        let until = TimeDelta::from_std(duration)
            .ok()
            .and_then(|delta| self.clock.now().checked_add_signed(delta))
            .ok_or(ModerationError::TimeoutTooLong(duration))?;

        self.members.timeout(guild, user, until, reason).await?;
        info!(%guild, %user, %until, "member timed out");
        Ok(until)
    }
}
