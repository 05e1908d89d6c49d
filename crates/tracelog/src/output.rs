use std::collections::{BTreeMap, HashMap};

use chrono::SecondsFormat;
use owo_colors::{AnsiColors, OwoColorize};
use serde::Serialize;
use tracelog_core::model::log::{LogLevel, LogLine};
use tracelog_core::model::span::{Span, TagValue};
use tracelog_core::model::trace::Trace;
use tracelog_core::severity::SpanSeverity;
use tracelog_core::time::{DurationUnit, micros_to_dt, nanos_to_dt};
use tracelog_reconcile::SpanWithLogs;

const PALETTE: [AnsiColors; 8] = [
    AnsiColors::Cyan,
    AnsiColors::Magenta,
    AnsiColors::Blue,
    AnsiColors::Yellow,
    AnsiColors::Green,
    AnsiColors::BrightCyan,
    AnsiColors::BrightMagenta,
    AnsiColors::BrightBlue,
];

const SERVICE_LABELS: [&str; 3] = ["service_name", "service", "app"];

/// Stable service → color assignment for one render session. First come,
/// first served through the palette; the same service always gets the same
/// color for the lifetime of the value.
#[derive(Debug, Default)]
pub struct ServiceColors {
    assigned: HashMap<String, AnsiColors>,
    enabled: bool,
}

impl ServiceColors {
    pub fn new(enabled: bool) -> Self {
        Self {
            assigned: HashMap::new(),
            enabled,
        }
    }

    pub fn color_for(&mut self, service: &str) -> AnsiColors {
        let next = PALETTE[self.assigned.len() % PALETTE.len()];
        *self.assigned.entry(service.to_string()).or_insert(next)
    }

    pub fn paint(&mut self, service: &str) -> String {
        if !self.enabled {
            return service.to_string();
        }
        let color = self.color_for(service);
        service.color(color).to_string()
    }
}

/// `empty_json` keeps the command's JSON shape when there is no trace.
pub fn print_empty_state(json: bool, empty_json: serde_json::Value) {
    if json {
        println!("{empty_json}");
    } else {
        println!("No trace data");
    }
}

pub fn print_trace_human(
    trace: &Trace,
    unit: Option<DurationUnit>,
    start: usize,
    entries: &[SpanWithLogs<'_>],
    colors: &mut ServiceColors,
) {
    println!(
        "TRACE {} duration={}ms spans={} reachable={} services={} unit={}",
        trace.trace_id,
        trace.duration / 1_000.0,
        trace.spans.len(),
        trace.reachable_count(),
        trace.services.join(","),
        unit.map(DurationUnit::as_str).unwrap_or("-"),
    );

    let depths = relative_depths(trace, start);
    for (idx, entry) in trace.preorder_from(start).into_iter().zip(entries) {
        let indent = "  ".repeat(depths.get(&idx).copied().unwrap_or(0));
        let span = entry.span;
        println!(
            "{}{} {} ({}ms) {}",
            indent,
            colors.paint(&span.service_name),
            span.operation_name,
            span.duration_ms(),
            severity_label(entry.severity(), colors.enabled)
        );
        for log in &entry.logs {
            println!(
                "{}  | {} {} {}",
                indent,
                format_log_ts(log),
                level_label(log.level, colors.enabled),
                log.line
            );
        }
    }

    if start == trace.root {
        let detached = trace
            .unreachable()
            .map(|s| s.span_id.as_str())
            .collect::<Vec<_>>();
        if !detached.is_empty() {
            println!("detached={}", detached.join(","));
        }
    }
}

pub fn print_spans_human(spans: &[&Span], colors: &mut ServiceColors) {
    for span in spans {
        println!(
            "{} {} {} ({}ms) span={} parent={} depth={}",
            format_span_ts(span),
            colors.paint(&span.service_name),
            span.operation_name,
            span.duration_ms(),
            span.span_id,
            span.parent_id().unwrap_or("-"),
            span.depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    println!("-- {} spans --", spans.len());
}

pub fn print_logs_human(logs: &[&LogLine], colors: &mut ServiceColors) {
    for log in logs {
        let service = log_service(log).unwrap_or("-");
        println!(
            "{} {} {} trace={} span={} | {}",
            format_log_ts(log),
            colors.paint(service),
            level_label(log.level, colors.enabled),
            log.trace_id.as_deref().unwrap_or("-"),
            log.span_id.as_deref().unwrap_or("-"),
            log.line
        );
    }
    println!("-- {} lines --", logs.len());
}

#[derive(Debug, Serialize)]
pub struct TraceView<'a> {
    pub trace_id: &'a str,
    pub duration_unit: Option<&'static str>,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub services: &'a [String],
    pub span_count: usize,
    pub reachable: usize,
    pub spans: Vec<SpanView<'a>>,
}

/// A span as rendered in JSON. Children are span ids: the output lists are
/// ordered and filtered, so arena indices would not line up with them.
#[derive(Debug, Serialize)]
pub struct SpanRow<'a> {
    pub trace_id: &'a str,
    pub span_id: &'a str,
    pub parent_span_id: Option<&'a str>,
    pub operation_name: &'a str,
    pub service_name: &'a str,
    pub start_time: f64,
    pub duration: f64,
    pub tags: &'a BTreeMap<String, TagValue>,
    pub depth: Option<usize>,
    pub children: Vec<&'a str>,
}

impl<'a> SpanRow<'a> {
    pub fn new(trace: &'a Trace, span: &'a Span) -> Self {
        Self {
            trace_id: &span.trace_id,
            span_id: &span.span_id,
            parent_span_id: span.parent_id(),
            operation_name: &span.operation_name,
            service_name: &span.service_name,
            start_time: span.start_time,
            duration: span.duration,
            tags: &span.tags,
            depth: span.depth,
            children: span
                .children
                .iter()
                .filter_map(|i| trace.spans.get(*i))
                .map(|c| c.span_id.as_str())
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpanView<'a> {
    #[serde(flatten)]
    pub span: SpanRow<'a>,
    pub severity: SpanSeverity,
    pub logs: Vec<&'a LogLine>,
}

pub fn trace_view<'a>(
    trace: &'a Trace,
    unit: Option<DurationUnit>,
    entries: &[SpanWithLogs<'a>],
) -> TraceView<'a> {
    TraceView {
        trace_id: &trace.trace_id,
        duration_unit: unit.map(DurationUnit::as_str),
        start_time: trace.start_time,
        end_time: trace.end_time,
        duration: trace.duration,
        services: &trace.services,
        span_count: trace.spans.len(),
        reachable: trace.reachable_count(),
        spans: entries
            .iter()
            .map(|e| SpanView {
                span: SpanRow::new(trace, e.span),
                severity: e.severity(),
                logs: e.logs.clone(),
            })
            .collect(),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Depths counted from `start`, so a detached subtree still indents.
fn relative_depths(trace: &Trace, start: usize) -> HashMap<usize, usize> {
    let mut depths = HashMap::new();
    depths.insert(start, 0);
    for idx in trace.preorder_from(start) {
        let depth = depths.get(&idx).copied().unwrap_or(0);
        for child in &trace.spans[idx].children {
            depths.entry(*child).or_insert(depth + 1);
        }
    }
    depths
}

fn log_service(log: &LogLine) -> Option<&str> {
    SERVICE_LABELS
        .iter()
        .find_map(|key| log.labels.get(*key))
        .map(String::as_str)
}

fn format_log_ts(log: &LogLine) -> String {
    nanos_to_dt(log.timestamp).to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_span_ts(span: &Span) -> String {
    micros_to_dt(span.start_time)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_else(|| span.start_time.to_string())
}

fn severity_label(severity: SpanSeverity, color: bool) -> String {
    let text = format!("[{severity}]");
    if !color {
        return text;
    }
    match severity {
        SpanSeverity::Error => text.red().to_string(),
        SpanSeverity::Warning => text.yellow().to_string(),
        SpanSeverity::Info => text.green().to_string(),
        SpanSeverity::Debug => text.bright_black().to_string(),
        SpanSeverity::None => text.dimmed().to_string(),
    }
}

fn level_label(level: LogLevel, color: bool) -> String {
    let text = level.as_str().to_ascii_uppercase();
    if !color {
        return text;
    }
    match level {
        LogLevel::Trace => text.blue().to_string(),
        LogLevel::Debug => text.bright_black().to_string(),
        LogLevel::Info => text.green().to_string(),
        LogLevel::Warn => text.yellow().to_string(),
        LogLevel::Error => text.red().to_string(),
    }
}
