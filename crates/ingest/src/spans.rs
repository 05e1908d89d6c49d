use std::collections::BTreeMap;

use serde_json::Value;
use tracelog_core::frame::{Field, Frame, decode_embedded_json};
use tracelog_core::model::span::{Span, TagValue};
use tracelog_core::schema::{
    SpanAttr, SpanColumns, is_trace_frame, missing_required, resolve_span_columns,
};
use tracelog_core::config::IngestOptions;
use tracelog_core::time::{DurationUnit, resolve_duration_unit};
use tracing::{debug, warn};

pub const UNKNOWN_NAME: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct IngestedSpans {
    pub spans: Vec<Span>,
    /// Unit the raw times were read as before conversion to microseconds.
    pub unit: DurationUnit,
    pub skipped_rows: usize,
}

/// Reads the first frame that looks like trace data into flat spans.
///
/// `None` means "no trace data": no qualifying frame, a qualifying frame
/// that lacks a required column, or no row that survived parsing.
pub fn ingest_spans(frames: &[Frame], opts: &IngestOptions) -> Option<IngestedSpans> {
    let Some(frame) = frames.iter().find(|f| is_trace_frame(f)) else {
        debug!(frames = frames.len(), "no frame has trace and span id columns");
        return None;
    };

    let columns = resolve_span_columns(frame);
    let missing = missing_required(&columns);
    if !missing.is_empty() {
        warn!(frame = frame.label(), ?missing, "trace frame lacks required columns");
        return None;
    }
    if frame.is_ragged() {
        warn!(
            frame = frame.label(),
            rows = frame.row_count(),
            "trace frame has columns of unequal length, extra rows ignored"
        );
    }

    let cols = SpanFields::new(frame, &columns)?;
    let rows = frame.row_count();
    let hint = opts.duration_unit;
    let unit = resolve_duration_unit(hint, (0..rows).filter_map(|r| cols.duration.f64_at(r)));
    debug!(frame = frame.label(), rows, ?hint, unit = unit.as_str(), "reading spans");

    let mut spans = Vec::with_capacity(rows);
    let mut skipped_rows = 0;
    for row in 0..rows {
        match cols.read_row(row, unit) {
            Some(span) => spans.push(span),
            None => skipped_rows += 1,
        }
    }

    if skipped_rows > 0 {
        warn!(frame = frame.label(), skipped_rows, "dropped span rows without ids or timing");
    }
    if spans.is_empty() {
        return None;
    }

    Some(IngestedSpans {
        spans,
        unit,
        skipped_rows,
    })
}

struct SpanFields<'a> {
    trace_id: &'a Field,
    span_id: &'a Field,
    start_time: &'a Field,
    duration: &'a Field,
    parent_span_id: Option<&'a Field>,
    operation_name: Option<&'a Field>,
    service_name: Option<&'a Field>,
    tags: Option<&'a Field>,
    service_tags: Option<&'a Field>,
}

impl<'a> SpanFields<'a> {
    fn new(frame: &'a Frame, columns: &SpanColumns) -> Option<Self> {
        let col = |attr: SpanAttr| columns.get(&attr).and_then(|idx| frame.fields.get(*idx));
        Some(Self {
            trace_id: col(SpanAttr::TraceId)?,
            span_id: col(SpanAttr::SpanId)?,
            start_time: col(SpanAttr::StartTime)?,
            duration: col(SpanAttr::Duration)?,
            parent_span_id: col(SpanAttr::ParentSpanId),
            operation_name: col(SpanAttr::OperationName),
            service_name: col(SpanAttr::ServiceName),
            tags: col(SpanAttr::Tags),
            service_tags: col(SpanAttr::ServiceTags),
        })
    }

    fn read_row(&self, row: usize, unit: DurationUnit) -> Option<Span> {
        let trace_id = non_empty(self.trace_id.str_at(row))?;
        let span_id = non_empty(self.span_id.str_at(row))?;
        let start = self.start_time.f64_at(row)?;
        let duration = self.duration.f64_at(row)?;

        let mut tags = BTreeMap::new();
        if let Some(field) = self.service_tags {
            merge_tags(field.value(row), &mut tags);
        }
        if let Some(field) = self.tags {
            merge_tags(field.value(row), &mut tags);
        }

        Some(Span {
            trace_id,
            span_id,
            parent_span_id: self
                .parent_span_id
                .and_then(|f| non_empty(f.str_at(row))),
            operation_name: self
                .operation_name
                .and_then(|f| non_empty(f.str_at(row)))
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            service_name: self
                .service_name
                .and_then(|f| non_empty(f.str_at(row)))
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            start_time: unit.to_micros(start),
            duration: unit.to_micros(duration),
            tags,
            children: Vec::new(),
            depth: None,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accepts `[{key, value}]` lists and flat objects. Within one value, flat
/// object entries are applied after the pairs and win on key collisions.
pub fn merge_tags(value: Option<&Value>, into: &mut BTreeMap<String, TagValue>) {
    let Some(value) = value.and_then(decode_embedded_json) else {
        return;
    };

    let mut objects = Vec::new();
    match &value {
        Value::Array(items) => {
            for item in items {
                let Some(obj) = item.as_object() else {
                    continue;
                };
                match (obj.get("key").and_then(Value::as_str), obj.get("value")) {
                    (Some(key), Some(v)) => {
                        if let Some(tag) = tag_value(v) {
                            into.insert(key.to_string(), tag);
                        }
                    }
                    _ => objects.push(obj),
                }
            }
        }
        Value::Object(obj) => objects.push(obj),
        _ => {}
    }

    for obj in objects {
        for (key, v) in obj {
            if let Some(tag) = tag_value(v) {
                into.insert(key.clone(), tag);
            }
        }
    }
}

fn tag_value(value: &Value) -> Option<TagValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(TagValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(TagValue::Number),
        Value::String(s) => Some(TagValue::String(s.clone())),
        other => Some(TagValue::String(other.to_string())),
    }
}
