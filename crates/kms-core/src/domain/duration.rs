//! Duration policy - 保持期間のクランプ・tick 計算・表示・パース
//!
//! すべて純粋関数です。スケジューラ・コマンド層の両方から使います。

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Shortest retention age a channel may be scheduled with.
pub const MIN_RETENTION: Duration = Duration::from_secs(3);

/// Longest retention age a channel may be scheduled with (3333 days).
pub const MAX_RETENTION: Duration = Duration::from_secs(3333 * SECS_PER_DAY);

/// Upper bound on the wait between two purge passes.
pub const MAX_TICK: Duration = Duration::from_secs(33);

/// Which bound, if any, was applied by [`DurationPolicy::clamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampNotice {
    TooShort,
    TooLong,
}

/// Result of clamping a requested retention age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clamped {
    pub effective: Duration,
    pub notice: Option<ClampNotice>,
}

impl Clamped {
    pub fn was_clamped_low(&self) -> bool {
        self.notice == Some(ClampNotice::TooShort)
    }

    pub fn was_clamped_high(&self) -> bool {
        self.notice == Some(ClampNotice::TooLong)
    }
}

/// Retention bounds and tick cap.
///
/// # 不変条件
/// - `0 < min_retention <= max_retention`
/// - `max_tick > 0`
///
/// 検証は [`crate::app::SchedulerBuilder::build`] で行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPolicy {
    pub min_retention: Duration,
    pub max_retention: Duration,
    pub max_tick: Duration,
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self {
            min_retention: MIN_RETENTION,
            max_retention: MAX_RETENTION,
            max_tick: MAX_TICK,
        }
    }
}

impl DurationPolicy {
    pub fn clamp(&self, requested: Duration) -> Clamped {
        if requested < self.min_retention {
            Clamped {
                effective: self.min_retention,
                notice: Some(ClampNotice::TooShort),
            }
        } else if requested > self.max_retention {
            Clamped {
                effective: self.max_retention,
                notice: Some(ClampNotice::TooLong),
            }
        } else {
            Clamped {
                effective: requested,
                notice: None,
            }
        }
    }

    /// Wait between purge passes for a (clamped) retention age.
    ///
    /// 長い保持期間でも `max_tick` 以上は待たない。
    pub fn tick_interval(&self, effective: Duration) -> Duration {
        Duration::from_secs(effective.as_secs().min(self.max_tick.as_secs()))
    }
}

/// Renders a duration using the largest unit that divides it evenly.
///
/// ```
/// # use std::time::Duration;
/// # use kms_core::domain::format_duration;
/// assert_eq!(format_duration(Duration::from_secs(86_400)), "1 day");
/// assert_eq!(format_duration(Duration::from_secs(90)), "90 seconds");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds == 0 {
        return "0 seconds".to_string();
    }

    let (count, unit) = if seconds % SECS_PER_DAY == 0 {
        (seconds / SECS_PER_DAY, "day")
    } else if seconds % SECS_PER_HOUR == 0 {
        (seconds / SECS_PER_HOUR, "hour")
    } else if seconds % SECS_PER_MINUTE == 0 {
        (seconds / SECS_PER_MINUTE, "minute")
    } else {
        (seconds, "second")
    };

    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// DurationParseError はユーザー入力の期間文字列のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("no duration found in {0:?} (expected e.g. 24h, 30s, 2d, 5m)")]
    NoDuration(String),

    #[error("duration {0:?} is too large")]
    TooLarge(String),
}

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)([smhd])?").expect("duration pattern must compile"));

/// Parses the `<number><unit>` grammar used by the moderator commands.
///
/// - unit: `s` / `m` / `h` / `d`、省略時は時間（h）
/// - 入力中で最初にマッチした部分だけを使う
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let caps = DURATION_RE
        .captures(input)
        .ok_or_else(|| DurationParseError::NoDuration(input.to_string()))?;

    let too_large = || DurationParseError::TooLarge(input.to_string());
    let count: u64 = caps[1].parse().map_err(|_| too_large())?;
    let unit_secs = match caps.get(2).map(|m| m.as_str()) {
        Some("s") => 1,
        Some("m") => SECS_PER_MINUTE,
        Some("d") => SECS_PER_DAY,
        _ => SECS_PER_HOUR,
    };

    count
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(too_large)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[rstest]
    #[case::zero(secs(0))]
    #[case::one(secs(1))]
    #[case::just_below(Duration::from_millis(2_999))]
    fn clamp_raises_short_durations_to_minimum(#[case] requested: Duration) {
        let clamped = DurationPolicy::default().clamp(requested);
        assert_eq!(clamped.effective, MIN_RETENTION);
        assert!(clamped.was_clamped_low());
        assert!(!clamped.was_clamped_high());
    }

    #[rstest]
    #[case::one_day_over(MAX_RETENTION + secs(SECS_PER_DAY))]
    #[case::one_second_over(MAX_RETENTION + secs(1))]
    #[case::ten_thousand_days(secs(10_000 * SECS_PER_DAY))]
    fn clamp_lowers_long_durations_to_maximum(#[case] requested: Duration) {
        let clamped = DurationPolicy::default().clamp(requested);
        assert_eq!(clamped.effective, secs(3333 * SECS_PER_DAY));
        assert!(clamped.was_clamped_high());
    }

    #[rstest]
    #[case::minimum(MIN_RETENTION)]
    #[case::one_minute(secs(60))]
    #[case::one_day(secs(SECS_PER_DAY))]
    #[case::maximum(MAX_RETENTION)]
    fn clamp_keeps_durations_in_range(#[case] requested: Duration) {
        let clamped = DurationPolicy::default().clamp(requested);
        assert_eq!(clamped.effective, requested);
        assert_eq!(clamped.notice, None);
    }

    #[rstest]
    #[case(3, 3)]
    #[case(10, 10)]
    #[case(33, 33)]
    #[case(34, 33)]
    #[case(3600, 33)]
    fn tick_is_capped_at_33_seconds(#[case] effective: u64, #[case] expected: u64) {
        let policy = DurationPolicy::default();
        assert_eq!(policy.tick_interval(secs(effective)), secs(expected));
    }

    #[rstest]
    #[case(86_400, "1 day")]
    #[case(172_800, "2 days")]
    #[case(90, "90 seconds")]
    #[case(120, "2 minutes")]
    #[case(60, "1 minute")]
    #[case(7_200, "2 hours")]
    #[case(3_600, "1 hour")]
    #[case(1, "1 second")]
    #[case(3, "3 seconds")]
    #[case(0, "0 seconds")]
    fn format_uses_largest_even_unit(#[case] seconds: u64, #[case] expected: &str) {
        assert_eq!(format_duration(secs(seconds)), expected);
    }

    #[test]
    fn format_of_maximum_retention() {
        assert_eq!(format_duration(MAX_RETENTION), "3333 days");
    }

    #[rstest]
    #[case("30s", 30)]
    #[case("5m", 300)]
    #[case("24h", 86_400)]
    #[case("2d", 172_800)]
    #[case("7", 7 * 3_600)]
    #[case("about 3d or so", 3 * 86_400)]
    #[case("10m 5d", 600)]
    fn parse_reads_first_duration(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_duration(input), Ok(secs(expected)));
    }

    #[rstest]
    #[case("")]
    #[case("forever")]
    #[case("h")]
    fn parse_rejects_inputs_without_digits(#[case] input: &str) {
        assert!(matches!(
            parse_duration(input),
            Err(DurationParseError::NoDuration(_))
        ));
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(matches!(
            parse_duration("99999999999999999999d"),
            Err(DurationParseError::TooLarge(_))
        ));
        assert!(matches!(
            parse_duration("18446744073709551615d"),
            Err(DurationParseError::TooLarge(_))
        ));
    }
}
