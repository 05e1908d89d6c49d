//! Name-based column resolution for untyped frames.
//!
//! Upstream providers do not agree on column names, so every logical
//! attribute is resolved by scanning the frame's field names against an
//! ordered synonym list. The tables below are the only place those names live.

use std::collections::HashMap;

use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanAttr {
    TraceId,
    SpanId,
    ParentSpanId,
    StartTime,
    Duration,
    OperationName,
    ServiceName,
    Tags,
    ServiceTags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogAttr {
    Time,
    Message,
    Labels,
    Level,
    TraceId,
    SpanId,
}

#[derive(Debug, Clone, Copy)]
pub struct SpanFieldRule {
    pub attr: SpanAttr,
    pub synonyms: &'static [&'static str],
    /// Substrings that disqualify a candidate, e.g. `parentSpanID` for span id.
    pub exclude: &'static [&'static str],
    pub required: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct LogFieldRule {
    pub attr: LogAttr,
    pub names: &'static [&'static str],
}

pub const SPAN_SCHEMA: &[SpanFieldRule] = &[
    SpanFieldRule {
        attr: SpanAttr::TraceId,
        synonyms: &["traceid", "trace_id"],
        exclude: &["parent"],
        required: true,
    },
    SpanFieldRule {
        attr: SpanAttr::SpanId,
        synonyms: &["spanid", "span_id"],
        exclude: &["parent"],
        required: true,
    },
    SpanFieldRule {
        attr: SpanAttr::ParentSpanId,
        synonyms: &["parentspanid", "parent_span_id", "parentid", "parent_id"],
        exclude: &[],
        required: false,
    },
    SpanFieldRule {
        attr: SpanAttr::StartTime,
        synonyms: &["starttime", "start_time", "start", "timestamp"],
        exclude: &[],
        required: true,
    },
    SpanFieldRule {
        attr: SpanAttr::Duration,
        synonyms: &["duration", "elapsed"],
        exclude: &[],
        required: true,
    },
    SpanFieldRule {
        attr: SpanAttr::OperationName,
        synonyms: &["operationname", "operation_name", "spanname", "name"],
        exclude: &["service"],
        required: false,
    },
    SpanFieldRule {
        attr: SpanAttr::ServiceName,
        synonyms: &["servicename", "service_name", "service"],
        exclude: &["tag", "attribute"],
        required: false,
    },
    SpanFieldRule {
        attr: SpanAttr::Tags,
        synonyms: &["tags", "spanattributes", "attributes"],
        exclude: &["service", "resource"],
        required: false,
    },
    SpanFieldRule {
        attr: SpanAttr::ServiceTags,
        synonyms: &["servicetags", "resourceattributes"],
        exclude: &[],
        required: false,
    },
];

pub const LOG_SCHEMA: &[LogFieldRule] = &[
    LogFieldRule {
        attr: LogAttr::Time,
        names: &["tsns", "timestamp_ns", "timeunixnano", "timestamp", "time", "ts"],
    },
    LogFieldRule {
        attr: LogAttr::Message,
        names: &["line", "message", "body", "content", "log"],
    },
    LogFieldRule {
        attr: LogAttr::Labels,
        names: &["labels", "attributes"],
    },
    LogFieldRule {
        attr: LogAttr::Level,
        names: &[
            "level",
            "severity",
            "severity_text",
            "severitytext",
            "detected_level",
            "loglevel",
            "lvl",
        ],
    },
    LogFieldRule {
        attr: LogAttr::TraceId,
        names: &["traceid", "trace_id"],
    },
    LogFieldRule {
        attr: LogAttr::SpanId,
        names: &["spanid", "span_id"],
    },
];

/// Time columns whose values are already epoch nanoseconds.
pub const NANOSECOND_TIME_FIELDS: &[&str] = &["tsns", "timestamp_ns", "timeunixnano"];

/// Label key that carries the level when no level column exists.
pub const LEVEL_LABEL: &str = "level";

pub type SpanColumns = HashMap<SpanAttr, usize>;
pub type LogColumns = HashMap<LogAttr, usize>;

pub fn resolve_span_columns(frame: &Frame) -> SpanColumns {
    SPAN_SCHEMA
        .iter()
        .filter_map(|rule| {
            resolve_span_field(frame.field_names(), rule).map(|idx| (rule.attr, idx))
        })
        .collect()
}

pub fn resolve_log_columns(frame: &Frame) -> LogColumns {
    LOG_SCHEMA
        .iter()
        .filter_map(|rule| {
            resolve_exact(frame.field_names(), rule.names).map(|idx| (rule.attr, idx))
        })
        .collect()
}

/// Attributes a frame must resolve before any span can be read from it.
pub fn missing_required(columns: &SpanColumns) -> Vec<SpanAttr> {
    SPAN_SCHEMA
        .iter()
        .filter(|rule| rule.required && !columns.contains_key(&rule.attr))
        .map(|rule| rule.attr)
        .collect()
}

/// Exact (case-insensitive) matches win over substring matches; within a
/// pass, synonyms are tried in order and the first matching field is taken.
pub fn resolve_span_field<'a>(
    names: impl IntoIterator<Item = &'a str>,
    rule: &SpanFieldRule,
) -> Option<usize> {
    let lowered = names
        .into_iter()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>();
    let allowed = |name: &str| !rule.exclude.iter().any(|x| name.contains(x));

    for synonym in rule.synonyms {
        if let Some(idx) = lowered.iter().position(|n| n.as_str() == *synonym && allowed(n)) {
            return Some(idx);
        }
    }
    for synonym in rule.synonyms {
        if let Some(idx) = lowered.iter().position(|n| n.contains(synonym) && allowed(n)) {
            return Some(idx);
        }
    }
    None
}

pub fn resolve_exact<'a>(
    names: impl IntoIterator<Item = &'a str>,
    candidates: &[&str],
) -> Option<usize> {
    let lowered = names
        .into_iter()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>();
    candidates.iter().find_map(|c| {
        let c = c.to_ascii_lowercase();
        lowered.iter().position(|n| *n == c)
    })
}

/// A frame carries trace data only if both id columns can be found.
pub fn is_trace_frame(frame: &Frame) -> bool {
    let columns = resolve_span_columns(frame);
    columns.contains_key(&SpanAttr::TraceId) && columns.contains_key(&SpanAttr::SpanId)
}

pub fn is_nanosecond_field(name: &str) -> bool {
    NANOSECOND_TIME_FIELDS.contains(&name.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::frame::{Field, FieldKind};

    fn span_rule(attr: SpanAttr) -> &'static SpanFieldRule {
        SPAN_SCHEMA.iter().find(|r| r.attr == attr).unwrap()
    }

    fn log_rule(attr: LogAttr) -> &'static LogFieldRule {
        LOG_SCHEMA.iter().find(|r| r.attr == attr).unwrap()
    }

    fn resolve(names: &[&str], attr: SpanAttr) -> Option<usize> {
        resolve_span_field(names.iter().copied(), span_rule(attr))
    }

    #[test]
    fn every_attribute_has_a_rule() {
        for attr in [
            SpanAttr::TraceId,
            SpanAttr::SpanId,
            SpanAttr::ParentSpanId,
            SpanAttr::StartTime,
            SpanAttr::Duration,
            SpanAttr::OperationName,
            SpanAttr::ServiceName,
            SpanAttr::Tags,
            SpanAttr::ServiceTags,
        ] {
            assert!(!span_rule(attr).synonyms.is_empty());
        }
        assert_eq!(log_rule(LogAttr::Message).names[0], "line");
    }

    #[test]
    fn span_id_skips_parent_column() {
        let names = ["parentSpanID", "traceID", "spanID"];
        assert_eq!(resolve(&names, SpanAttr::SpanId), Some(2));
        assert_eq!(resolve(&names, SpanAttr::ParentSpanId), Some(0));
        assert_eq!(resolve(&names, SpanAttr::TraceId), Some(1));
    }

    #[test]
    fn exact_match_beats_earlier_substring_match() {
        let names = ["serviceName", "operationName"];
        assert_eq!(resolve(&names, SpanAttr::OperationName), Some(1));
        assert_eq!(resolve(&names, SpanAttr::ServiceName), Some(0));

        let names = ["spanStartTime", "startTime"];
        assert_eq!(resolve(&names, SpanAttr::StartTime), Some(1));
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let names = ["otel.TraceID.hex", "Span_ID"];
        assert_eq!(resolve(&names, SpanAttr::TraceId), Some(0));
        assert_eq!(resolve(&names, SpanAttr::SpanId), Some(1));
    }

    #[test]
    fn tags_and_service_tags_are_distinct() {
        let names = ["serviceTags", "tags"];
        assert_eq!(resolve(&names, SpanAttr::Tags), Some(1));
        assert_eq!(resolve(&names, SpanAttr::ServiceTags), Some(0));
        assert_eq!(resolve(&["serviceTags"], SpanAttr::ServiceName), None);
    }

    #[test]
    fn missing_attribute_resolves_to_none() {
        assert_eq!(resolve(&["a", "b"], SpanAttr::Duration), None);
    }

    #[test]
    fn exact_resolution_ignores_substrings() {
        let names = ["Time", "Line", "lineCount"];
        assert_eq!(resolve_exact(names, log_rule(LogAttr::Message).names), Some(1));
        assert_eq!(resolve_exact(names, log_rule(LogAttr::Time).names), Some(0));
        assert_eq!(resolve_exact(["messages"], &["message"]), None);
    }

    #[test]
    fn trace_frame_requires_both_ids() {
        let both = Frame::new(vec![
            Field::new("traceID", FieldKind::String, vec![json!("t")]),
            Field::new("spanID", FieldKind::String, vec![json!("s")]),
        ]);
        let only_trace = Frame::new(vec![Field::new(
            "traceID",
            FieldKind::String,
            vec![json!("t")],
        )]);
        assert!(is_trace_frame(&both));
        assert!(!is_trace_frame(&only_trace));
    }

    #[test]
    fn reports_missing_required_columns() {
        let frame = Frame::new(vec![
            Field::new("traceID", FieldKind::String, vec![]),
            Field::new("spanID", FieldKind::String, vec![]),
            Field::new("startTime", FieldKind::Time, vec![]),
        ]);
        let columns = resolve_span_columns(&frame);
        assert_eq!(missing_required(&columns), vec![SpanAttr::Duration]);
        assert!(!columns.contains_key(&SpanAttr::ParentSpanId));
    }

    #[test]
    fn log_columns_resolve_by_exact_name() {
        let frame = Frame::new(vec![
            Field::new("Time", FieldKind::Time, vec![]),
            Field::new("labels", FieldKind::Other, vec![]),
            Field::new("body", FieldKind::String, vec![]),
        ]);
        let columns = resolve_log_columns(&frame);
        assert_eq!(columns.get(&LogAttr::Time), Some(&0));
        assert_eq!(columns.get(&LogAttr::Labels), Some(&1));
        assert_eq!(columns.get(&LogAttr::Message), Some(&2));
        assert_eq!(columns.get(&LogAttr::Level), None);
    }

    #[test]
    fn nanosecond_fields() {
        assert!(is_nanosecond_field("tsNs"));
        assert!(!is_nanosecond_field("Time"));
    }
}
