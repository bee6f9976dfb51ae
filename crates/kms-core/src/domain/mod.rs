//! Domain model (IDs, duration policy, purge records, member plans, errors).

pub mod duration;
pub mod errors;
pub mod ids;
pub mod members;
pub mod purge;

pub use self::duration::{
    ClampNotice, Clamped, DurationParseError, DurationPolicy, MAX_RETENTION, MAX_TICK,
    MIN_RETENTION, format_duration, parse_duration,
};
pub use self::errors::{ModerationError, PlatformError, SchedulerError, StoreError};
pub use self::ids::{ChannelId, GuildId, JobId, MessageId, RoleId, Snowflake, UserId};
pub use self::members::{MemberPurgePlan, MemberSummary, plan_member_purge};
pub use self::purge::{
    HistoryQuery, MessageSummary, PURGE_BATCH_LIMIT, PersistedPurgeRecord, PurgeSchedule,
    ScheduleOutcome, select_purgeable,
};
