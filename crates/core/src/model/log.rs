use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelogError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Trace => 0,
            Self::Debug => 1,
            Self::Info => 2,
            Self::Warn => 3,
            Self::Error => 4,
        }
    }

    pub fn at_least(self, floor: LogLevel) -> bool {
        self.rank() >= floor.rank()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = TracelogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(TracelogError::Parse(format!("unknown log level: {s}"))),
        }
    }
}

/// Keyword classification in priority order; anything unrecognized is info.
pub fn parse_log_level(raw: Option<&str>) -> LogLevel {
    let Some(raw) = raw else {
        return LogLevel::Info;
    };
    let lowered = raw.to_ascii_lowercase();
    if ["err", "fatal", "critical"]
        .iter()
        .any(|k| lowered.contains(k))
    {
        LogLevel::Error
    } else if lowered.contains("warn") {
        LogLevel::Warn
    } else if lowered.contains("debug") {
        LogLevel::Debug
    } else if lowered.contains("trace") {
        LogLevel::Trace
    } else {
        LogLevel::Info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogLine {
    /// Epoch nanoseconds, as delivered; spans use microseconds.
    pub timestamp: i64,
    pub line: String,
    pub labels: BTreeMap<String, String>,
    pub level: LogLevel,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_keyword_priority() {
        assert_eq!(parse_log_level(Some("ERROR")), LogLevel::Error);
        assert_eq!(parse_log_level(Some("Fatal")), LogLevel::Error);
        assert_eq!(parse_log_level(Some("critical")), LogLevel::Error);
        assert_eq!(parse_log_level(Some("stderr")), LogLevel::Error);
        assert_eq!(parse_log_level(Some("WARNING")), LogLevel::Warn);
        assert_eq!(parse_log_level(Some("debug")), LogLevel::Debug);
        assert_eq!(parse_log_level(Some("TRACE")), LogLevel::Trace);
        assert_eq!(parse_log_level(Some("notice")), LogLevel::Info);
        assert_eq!(parse_log_level(None), LogLevel::Info);
    }

    #[test]
    fn error_keywords_outrank_later_ones() {
        assert_eq!(parse_log_level(Some("warn-or-error")), LogLevel::Error);
        assert_eq!(parse_log_level(Some("debug-warn")), LogLevel::Warn);
    }

    #[test]
    fn strict_parse_rejects_unknown() {
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert!(LogLevel::from_str("loud").is_err());
    }

    #[test]
    fn level_ordering() {
        assert!(LogLevel::Error.at_least(LogLevel::Warn));
        assert!(!LogLevel::Debug.at_least(LogLevel::Info));
    }
}
