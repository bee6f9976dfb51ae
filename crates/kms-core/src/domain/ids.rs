//! Domain identifiers (strongly-typed IDs).
//!
//! チャットプラットフォーム側の ID はすべて 64-bit の snowflake です。
//! `Snowflake<T>` に Phantom type のマーカーを付けることで、
//! ChannelId と MessageId を取り違えるとコンパイルエラーになります。
//!
//! スケジューラ内部のジョブ ID (`JobId`) だけは ULID を使います。
//! 同じチャンネルで置き換えられた古いジョブを識別するためのものです。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for each snowflake kind.
pub trait SnowflakeMarker {
    /// ログ出力で使うラベル（例: "channel", "message"）
    fn label() -> &'static str;
}

/// Platform identifier tagged with its kind.
#[repr(transparent)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake<T: SnowflakeMarker> {
    raw: u64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: SnowflakeMarker> Snowflake<T> {
    pub const fn new(raw: u64) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn get(self) -> u64 {
        self.raw
    }

    /// SQLite の INTEGER は符号付きなので、保存時はビット列をそのまま i64 に詰める
    pub const fn to_i64(self) -> i64 {
        self.raw as i64
    }

    pub const fn from_i64(value: i64) -> Self {
        Self::new(value as u64)
    }
}

// derive だと `T: Clone` などの余計な境界が付くので手で実装する
impl<T: SnowflakeMarker> Clone for Snowflake<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: SnowflakeMarker> Copy for Snowflake<T> {}

impl<T: SnowflakeMarker> PartialEq for Snowflake<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: SnowflakeMarker> Eq for Snowflake<T> {}

impl<T: SnowflakeMarker> std::hash::Hash for Snowflake<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: SnowflakeMarker> PartialOrd for Snowflake<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: SnowflakeMarker> Ord for Snowflake<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T: SnowflakeMarker> From<u64> for Snowflake<T> {
    fn from(raw: u64) -> Self {
        Self::new(raw)
    }
}

impl<T: SnowflakeMarker> fmt::Debug for Snowflake<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", T::label(), self.raw)
    }
}

impl<T: SnowflakeMarker> fmt::Display for Snowflake<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! snowflake_marker {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {}

        impl SnowflakeMarker for $name {
            fn label() -> &'static str {
                $label
            }
        }
    };
}

snowflake_marker!(
    /// Channel のマーカー型
    Channel,
    "channel"
);
snowflake_marker!(
    /// Message のマーカー型
    Message,
    "message"
);
snowflake_marker!(
    /// Guild のマーカー型
    Guild,
    "guild"
);
snowflake_marker!(
    /// User のマーカー型
    User,
    "user"
);
snowflake_marker!(
    /// Role のマーカー型
    Role,
    "role"
);

pub type ChannelId = Snowflake<Channel>;
pub type MessageId = Snowflake<Message>;
pub type GuildId = Snowflake<Guild>;
pub type UserId = Snowflake<User>;
pub type RoleId = Snowflake<Role>;

/// Identifier of one spawned purge job.
///
/// チャンネルごとにジョブは作り直されるので、ChannelId だけでは
/// 「今レジストリにいるジョブが自分かどうか」を判定できない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Ulid);

impl JobId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}
