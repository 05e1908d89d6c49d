use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::log::{LogLevel, LogLine};

/// Message fragments that mark a line as an error whatever its level says.
pub const ERROR_TEXT: &[&str] = &["error", "exception", "critical", "fatal", "crit"];
pub const WARN_TEXT: &[&str] = &["warn"];

/// Ordered so that `max` picks the most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanSeverity {
    #[default]
    None,
    Debug,
    Info,
    Warning,
    Error,
}

impl SpanSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SpanSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn text_contains_any(line: &str, needles: &[&str]) -> bool {
    let lowered = line.to_ascii_lowercase();
    needles.iter().any(|n| lowered.contains(n))
}

/// Single severity for a span's matched logs.
///
/// Error wins outright and message text counts as much as the level field.
/// Logs that fit no bucket still make the span `Info`; no logs is `None`.
pub fn log_severity<'a, I>(logs: I) -> SpanSeverity
where
    I: IntoIterator<Item = &'a LogLine>,
{
    let logs = logs.into_iter().collect::<Vec<_>>();
    if logs.is_empty() {
        return SpanSeverity::None;
    }

    if logs
        .iter()
        .any(|l| l.level == LogLevel::Error || text_contains_any(&l.line, ERROR_TEXT))
    {
        return SpanSeverity::Error;
    }
    if logs
        .iter()
        .any(|l| l.level == LogLevel::Warn || text_contains_any(&l.line, WARN_TEXT))
    {
        return SpanSeverity::Warning;
    }
    if logs.iter().any(|l| l.level == LogLevel::Info) {
        return SpanSeverity::Info;
    }
    if logs
        .iter()
        .any(|l| matches!(l.level, LogLevel::Debug | LogLevel::Trace))
    {
        return SpanSeverity::Debug;
    }
    SpanSeverity::Info
}
