use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelogError};

/// Upper bound on how many durations feed the automatic unit guess.
pub const AUTO_SAMPLE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnitHint {
    #[default]
    Auto,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl FromStr for DurationUnitHint {
    type Err = TracelogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "us" | "µs" | "micros" | "microseconds" => Ok(Self::Microseconds),
            "ms" | "millis" | "milliseconds" => Ok(Self::Milliseconds),
            "s" | "secs" | "seconds" => Ok(Self::Seconds),
            _ => Err(TracelogError::Parse(format!(
                "unknown duration unit: {s} (expected auto|microseconds|milliseconds|seconds)"
            ))),
        }
    }
}

impl fmt::Display for DurationUnitHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Microseconds => "microseconds",
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
        })
    }
}

/// The unit raw span times were recorded in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl DurationUnit {
    /// Factor that turns a raw value in this unit into microseconds.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Nanoseconds => 1e-3,
            Self::Microseconds => 1.0,
            Self::Milliseconds => 1e3,
            Self::Seconds => 1e6,
        }
    }

    pub fn to_micros(self, raw: f64) -> f64 {
        match self {
            Self::Nanoseconds => raw / 1e3,
            _ => raw * self.multiplier(),
        }
    }

    /// Magnitude buckets for a median duration. A guess, not a detection:
    /// short traces recorded in microseconds land in the millisecond bucket.
    pub fn classify_median(median: f64) -> Self {
        if median >= 1e9 {
            Self::Nanoseconds
        } else if median >= 1e6 {
            Self::Microseconds
        } else if median >= 1e3 {
            Self::Milliseconds
        } else {
            Self::Seconds
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "us",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
        }
    }
}

/// Samples the first positive durations, takes the upper median and buckets
/// it by magnitude. No usable sample means the values are taken as-is.
pub fn detect_duration_unit(durations: impl IntoIterator<Item = f64>) -> DurationUnit {
    let mut sample = durations
        .into_iter()
        .filter(|d| d.is_finite() && *d > 0.0)
        .take(AUTO_SAMPLE_SIZE)
        .collect::<Vec<_>>();
    if sample.is_empty() {
        return DurationUnit::Microseconds;
    }
    sample.sort_by(f64::total_cmp);
    DurationUnit::classify_median(sample[sample.len() / 2])
}

pub fn resolve_duration_unit(
    hint: DurationUnitHint,
    durations: impl IntoIterator<Item = f64>,
) -> DurationUnit {
    match hint {
        DurationUnitHint::Auto => detect_duration_unit(durations),
        DurationUnitHint::Microseconds => DurationUnit::Microseconds,
        DurationUnitHint::Milliseconds => DurationUnit::Milliseconds,
        DurationUnitHint::Seconds => DurationUnit::Seconds,
    }
}

/// Scales an integral epoch timestamp of unknown unit to nanoseconds.
pub fn epoch_int_to_nanos(raw: i64) -> i64 {
    match raw.unsigned_abs() {
        v if v >= 100_000_000_000_000_000 => raw,
        v if v >= 100_000_000_000_000 => raw.saturating_mul(1_000),
        v if v >= 100_000_000_000 => raw.saturating_mul(1_000_000),
        _ => raw.saturating_mul(1_000_000_000),
    }
}

pub fn epoch_float_to_nanos(raw: f64) -> Option<i64> {
    if !raw.is_finite() {
        return None;
    }
    let abs = raw.abs();
    let nanos = if abs >= 1e17 {
        raw
    } else if abs >= 1e14 {
        raw * 1e3
    } else if abs >= 1e11 {
        raw * 1e6
    } else {
        raw * 1e9
    };
    Some(nanos.round() as i64)
}

pub fn parse_rfc3339_nanos(input: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(input.trim())
        .ok()
        .and_then(|ts| ts.with_timezone(&Utc).timestamp_nanos_opt())
}

/// Microseconds to integer nanoseconds. The whole and fractional parts are
/// scaled separately so epoch-sized values keep their sub-microsecond digits.
pub fn micros_to_nanos(micros: f64) -> i128 {
    let whole = micros.trunc();
    whole as i128 * 1_000 + ((micros - whole) * 1_000.0).round() as i128
}

pub fn nanos_to_dt(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

pub fn micros_to_dt(micros: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros.round() as i64)
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| TracelogError::Parse(format!("invalid duration {input}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_buckets_pick_expected_multiplier() {
        assert_eq!(detect_duration_unit([5_000_000.0]).multiplier(), 1.0);
        assert_eq!(detect_duration_unit([1_500_000_000.0]).multiplier(), 1e-3);
        assert_eq!(detect_duration_unit([4_500.0]).multiplier(), 1000.0);
        assert_eq!(detect_duration_unit([3.0]).multiplier(), 1_000_000.0);
    }

    #[test]
    fn median_ignores_non_positive_and_uses_middle_value() {
        let unit = detect_duration_unit([0.0, -5.0, 10.0, 5_000_000.0, 6_000_000.0]);
        assert_eq!(unit, DurationUnit::Microseconds);
        assert_eq!(detect_duration_unit([0.0, -1.0]), DurationUnit::Microseconds);
    }

    #[test]
    fn sample_is_capped() {
        let mut durations = vec![2.0; AUTO_SAMPLE_SIZE];
        durations.extend(std::iter::repeat_n(5e9, 200));
        assert_eq!(detect_duration_unit(durations), DurationUnit::Seconds);
    }

    #[test]
    fn explicit_hint_skips_detection() {
        let unit = resolve_duration_unit(DurationUnitHint::Milliseconds, [5e9]);
        assert_eq!(unit, DurationUnit::Milliseconds);
        assert_eq!(
            resolve_duration_unit(DurationUnitHint::Seconds, std::iter::empty()).multiplier(),
            1e6
        );
    }

    #[test]
    fn nanoseconds_divide_exactly() {
        assert_eq!(DurationUnit::Nanoseconds.to_micros(1_500.0), 1.5);
        assert_eq!(DurationUnit::Milliseconds.to_micros(2.5), 2_500.0);
    }

    #[test]
    fn parses_unit_hints() {
        assert_eq!(
            DurationUnitHint::from_str("ms").unwrap(),
            DurationUnitHint::Milliseconds
        );
        assert_eq!(
            DurationUnitHint::from_str("AUTO").unwrap(),
            DurationUnitHint::Auto
        );
        assert!(DurationUnitHint::from_str("fortnights").is_err());
    }

    #[test]
    fn epoch_scaling() {
        assert_eq!(epoch_int_to_nanos(1_700_000_000), 1_700_000_000_000_000_000);
        assert_eq!(epoch_int_to_nanos(1_700_000_000_123), 1_700_000_000_123_000_000);
        assert_eq!(
            epoch_int_to_nanos(1_700_000_000_123_456),
            1_700_000_000_123_456_000
        );
        assert_eq!(
            epoch_int_to_nanos(1_700_000_000_123_456_789),
            1_700_000_000_123_456_789
        );
        assert_eq!(epoch_float_to_nanos(1.5), Some(1_500_000_000));
        assert_eq!(epoch_float_to_nanos(f64::NAN), None);
    }

    #[test]
    fn parses_rfc3339() {
        assert_eq!(
            parse_rfc3339_nanos("1970-01-01T00:00:01.000000002Z"),
            Some(1_000_000_002)
        );
        assert_eq!(parse_rfc3339_nanos("nope"), None);
    }

    #[test]
    fn micros_to_nanos_keeps_precision() {
        assert_eq!(
            micros_to_nanos(1_769_904_000_000_000.0),
            1_769_904_000_000_000_000
        );
        assert_eq!(
            micros_to_nanos(1_700_000_000_000_000.5),
            1_700_000_000_000_000_500
        );
        assert_eq!(micros_to_nanos(1_000.0), 1_000_000);
        assert_eq!(micros_to_nanos(0.001), 1);
        assert_eq!(micros_to_nanos(-1.5), -1_500);
    }

    #[test]
    fn parses_duration() {
        assert_eq!(parse_duration_str("1ms").unwrap(), Duration::from_millis(1));
        assert!(parse_duration_str("soon").is_err());
    }
}
