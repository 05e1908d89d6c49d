use serde::Serialize;
use tracelog_core::model::log::LogLine;
use tracelog_core::model::span::Span;
use tracelog_core::model::trace::Trace;
use tracelog_core::severity::{SpanSeverity, log_severity};
use tracelog_core::time::micros_to_nanos;

/// Clock/collection skew tolerated around a span, in microseconds.
pub const MATCH_BUFFER_MICROS: f64 = 1_000.0;

/// A span together with the logs attributed to it. Borrows from the trace
/// and the log list; neither is modified.
#[derive(Debug, Clone, Serialize)]
pub struct SpanWithLogs<'a> {
    pub span: &'a Span,
    pub logs: Vec<&'a LogLine>,
}

impl SpanWithLogs<'_> {
    pub fn severity(&self) -> SpanSeverity {
        log_severity(self.logs.iter().copied())
    }
}

/// Exact span id first; otherwise a shared trace id plus the log's time
/// falling inside the span widened by `buffer_us` on both ends (inclusive).
/// The window is compared in integer nanoseconds.
pub fn log_matches_span(span: &Span, log: &LogLine, buffer_us: f64) -> bool {
    if log.span_id.as_deref() == Some(span.span_id.as_str()) {
        return true;
    }
    if log.trace_id.as_deref() != Some(span.trace_id.as_str()) {
        return false;
    }
    let buffer = micros_to_nanos(buffer_us);
    let start = micros_to_nanos(span.start_time);
    let end = start + micros_to_nanos(span.duration);
    let ts = i128::from(log.timestamp);
    ts >= start - buffer && ts <= end + buffer
}

pub fn correlate_logs<'a>(trace: &'a Trace, logs: &'a [LogLine]) -> Vec<SpanWithLogs<'a>> {
    correlate_logs_with_buffer(trace, logs, MATCH_BUFFER_MICROS)
}

/// Every span reachable from the root, in pre-order, with its matched logs.
/// The relation is many-to-many: overlapping spans of the same trace can all
/// claim one log line.
pub fn correlate_logs_with_buffer<'a>(
    trace: &'a Trace,
    logs: &'a [LogLine],
    buffer_us: f64,
) -> Vec<SpanWithLogs<'a>> {
    correlate_subtree(trace, trace.root, logs, buffer_us)
}

/// Same as [`correlate_logs_with_buffer`] for the subtree under `start`.
pub fn correlate_subtree<'a>(
    trace: &'a Trace,
    start: usize,
    logs: &'a [LogLine],
    buffer_us: f64,
) -> Vec<SpanWithLogs<'a>> {
    trace
        .preorder_from(start)
        .into_iter()
        .map(|idx| {
            let span = &trace.spans[idx];
            SpanWithLogs {
                span,
                logs: logs
                    .iter()
                    .filter(|log| log_matches_span(span, log, buffer_us))
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tracelog_core::model::log::LogLevel;

    use super::*;
    use crate::tree::build_trace;

    const START_US: i64 = 1_769_904_000_000_000;

    fn span(id: &str, parent: Option<&str>, start: i64, duration: i64) -> Span {
        Span {
            trace_id: "t1".into(),
            span_id: id.into(),
            parent_span_id: parent.map(str::to_string),
            operation_name: id.into(),
            service_name: "api".into(),
            start_time: start as f64,
            duration: duration as f64,
            tags: BTreeMap::new(),
            children: Vec::new(),
            depth: None,
        }
    }

    fn log(ts_us: i64, trace: Option<&str>, span: Option<&str>, line: &str) -> LogLine {
        LogLine {
            timestamp: ts_us * 1_000,
            line: line.into(),
            labels: BTreeMap::new(),
            level: LogLevel::Info,
            trace_id: trace.map(str::to_string),
            span_id: span.map(str::to_string),
        }
    }

    fn lines(entry: &SpanWithLogs<'_>) -> Vec<String> {
        let mut out = entry.logs.iter().map(|l| l.line.clone()).collect::<Vec<_>>();
        out.sort();
        out
    }

    #[test]
    fn span_id_match_ignores_time() {
        let s = span("s1", None, START_US, 100);
        let far = log(START_US + 10_000_000, None, Some("s1"), "late");
        assert!(log_matches_span(&s, &far, MATCH_BUFFER_MICROS));
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let s = span("s1", None, START_US, 500);
        let at_lower = log(START_US - 1_000, Some("t1"), None, "a");
        let past_lower = log(START_US - 1_001, Some("t1"), None, "b");
        let at_upper = log(START_US + 500 + 1_000, Some("t1"), None, "c");
        let past_upper = log(START_US + 500 + 1_001, Some("t1"), None, "d");
        assert!(log_matches_span(&s, &at_lower, MATCH_BUFFER_MICROS));
        assert!(!log_matches_span(&s, &past_lower, MATCH_BUFFER_MICROS));
        assert!(log_matches_span(&s, &at_upper, MATCH_BUFFER_MICROS));
        assert!(!log_matches_span(&s, &past_upper, MATCH_BUFFER_MICROS));
    }

    #[test]
    fn sub_microsecond_offsets_count() {
        let s = span("s1", None, START_US, 500);
        let mut before = log(START_US - 1_000, Some("t1"), None, "x");
        before.timestamp -= 1;
        assert!(!log_matches_span(&s, &before, MATCH_BUFFER_MICROS));

        let mut after = log(START_US + 500 + 1_000, Some("t1"), None, "y");
        after.timestamp += 1;
        assert!(!log_matches_span(&s, &after, MATCH_BUFFER_MICROS));

        let mut inside = log(START_US + 500 + 1_000, Some("t1"), None, "z");
        inside.timestamp -= 1;
        assert!(log_matches_span(&s, &inside, MATCH_BUFFER_MICROS));
    }

    #[test]
    fn window_requires_same_trace() {
        let s = span("s1", None, START_US, 500);
        let other_trace = log(START_US + 10, Some("t2"), None, "x");
        let no_ids = log(START_US + 10, None, None, "y");
        assert!(!log_matches_span(&s, &other_trace, MATCH_BUFFER_MICROS));
        assert!(!log_matches_span(&s, &no_ids, MATCH_BUFFER_MICROS));
    }

    #[test]
    fn other_span_id_can_still_match_by_window() {
        let s = span("s1", None, START_US, 500);
        let l = log(START_US + 10, Some("t1"), Some("s9"), "x");
        assert!(log_matches_span(&s, &l, MATCH_BUFFER_MICROS));
    }

    #[test]
    fn overlapping_spans_share_logs() {
        let trace = build_trace(vec![
            span("root", None, START_US, 10_000),
            span("a", Some("root"), START_US + 100, 2_000),
            span("b", Some("root"), START_US + 500, 2_000),
        ])
        .unwrap();
        let logs = vec![
            log(START_US + 1_000, Some("t1"), None, "shared"),
            log(START_US + 50_000, Some("t1"), Some("b"), "pinned"),
        ];

        let out = correlate_logs(&trace, &logs);
        let order = out.iter().map(|e| e.span.span_id.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["root", "a", "b"]);
        assert_eq!(lines(&out[0]), vec!["shared"]);
        assert_eq!(lines(&out[1]), vec!["shared"]);
        assert_eq!(lines(&out[2]), vec!["pinned", "shared"]);
    }

    #[test]
    fn unreachable_spans_are_not_reported() {
        let trace = build_trace(vec![
            span("root", None, START_US, 10_000),
            span("orphan", Some("ghost"), START_US, 10_000),
        ])
        .unwrap();
        let logs = vec![log(START_US, None, Some("orphan"), "for orphan")];
        let out = correlate_logs(&trace, &logs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].span.span_id, "root");
        assert!(out[0].logs.is_empty());
        assert_eq!(out[0].severity(), SpanSeverity::None);
    }

    #[test]
    fn custom_buffer_widens_window() {
        let trace = build_trace(vec![span("root", None, START_US, 100)]).unwrap();
        let logs = vec![log(START_US - 4_000, Some("t1"), None, "early")];
        assert!(correlate_logs(&trace, &logs)[0].logs.is_empty());
        assert_eq!(
            correlate_logs_with_buffer(&trace, &logs, 5_000.0)[0].logs.len(),
            1
        );
    }

    #[test]
    fn subtree_starts_at_given_span() {
        let trace = build_trace(vec![
            span("root", None, START_US, 10_000),
            span("a", Some("root"), START_US + 100, 2_000),
            span("a1", Some("a"), START_US + 200, 500),
            span("b", Some("root"), START_US + 5_000, 2_000),
        ])
        .unwrap();
        let out = correlate_subtree(&trace, 1, &[], MATCH_BUFFER_MICROS);
        let order = out.iter().map(|e| e.span.span_id.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["a", "a1"]);
    }

    #[test]
    fn severity_follows_matched_logs() {
        let trace = build_trace(vec![span("root", None, START_US, 100)]).unwrap();
        let logs = vec![log(START_US, Some("t1"), None, "unhandled exception")];
        assert_eq!(correlate_logs(&trace, &logs)[0].severity(), SpanSeverity::Error);
    }
}
