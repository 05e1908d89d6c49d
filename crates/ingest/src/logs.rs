use std::collections::BTreeMap;

use serde_json::Value;
use tracelog_core::config::IngestOptions;
use tracelog_core::frame::{Field, FieldKind, Frame, decode_embedded_json, value_as_string};
use tracelog_core::model::log::{LogLine, parse_log_level};
use tracelog_core::schema::{
    LEVEL_LABEL, LOG_SCHEMA, LogAttr, LogColumns, is_nanosecond_field, resolve_exact,
    resolve_log_columns,
};
use tracelog_core::time::{epoch_float_to_nanos, epoch_int_to_nanos, parse_rfc3339_nanos};
use tracing::debug;

/// Reads every frame that has a time and a message column, then sorts the
/// combined result by timestamp. Frames without those columns are skipped.
pub fn ingest_logs(frames: &[Frame], opts: &IngestOptions) -> Vec<LogLine> {
    let mut out = Vec::new();
    for frame in frames {
        let before = out.len();
        if ingest_log_frame(frame, opts, &mut out) {
            debug!(frame = frame.label(), lines = out.len() - before, "read log frame");
        }
    }
    out.sort_by_key(|l| l.timestamp);
    out
}

fn ingest_log_frame(frame: &Frame, opts: &IngestOptions, out: &mut Vec<LogLine>) -> bool {
    let columns = resolve_log_columns(frame);
    let Some(cols) = LogFields::new(frame, &columns, opts) else {
        debug!(frame = frame.label(), "skipping frame without time and message columns");
        return false;
    };

    let trace_keys = label_keys(opts.trace_id_field.as_deref(), LogAttr::TraceId);
    let span_keys = label_keys(opts.span_id_field.as_deref(), LogAttr::SpanId);

    let mut skipped = 0usize;
    for row in 0..frame.row_count() {
        let Some(timestamp) = timestamp_nanos(cols.time, row) else {
            skipped += 1;
            continue;
        };
        let labels = cols
            .labels
            .map(|f| parse_labels(f.value(row)))
            .unwrap_or_default();

        let level_text = cols
            .level
            .and_then(|f| f.str_at(row))
            .or_else(|| label_lookup(&labels, &[LEVEL_LABEL]));

        let trace_id = cols
            .trace_id
            .and_then(|f| non_empty(f.str_at(row)))
            .or_else(|| label_lookup(&labels, &trace_keys));
        let span_id = cols
            .span_id
            .and_then(|f| non_empty(f.str_at(row)))
            .or_else(|| label_lookup(&labels, &span_keys));

        out.push(LogLine {
            timestamp,
            line: cols.message.str_at(row).unwrap_or_default(),
            level: parse_log_level(level_text.as_deref()),
            labels,
            trace_id,
            span_id,
        });
    }

    if skipped > 0 {
        debug!(frame = frame.label(), skipped, "dropped log rows without a usable timestamp");
    }
    true
}

struct LogFields<'a> {
    time: &'a Field,
    message: &'a Field,
    labels: Option<&'a Field>,
    level: Option<&'a Field>,
    trace_id: Option<&'a Field>,
    span_id: Option<&'a Field>,
}

impl<'a> LogFields<'a> {
    fn new(frame: &'a Frame, columns: &LogColumns, opts: &IngestOptions) -> Option<Self> {
        let col = |attr: LogAttr| columns.get(&attr).and_then(|idx| frame.fields.get(*idx));
        let by_override = |name: Option<&str>| {
            name.and_then(|n| resolve_exact(frame.field_names(), &[n]))
                .and_then(|idx| frame.fields.get(idx))
        };

        let time = col(LogAttr::Time)
            .or_else(|| frame.fields.iter().find(|f| f.kind == FieldKind::Time))?;
        Some(Self {
            time,
            message: col(LogAttr::Message)?,
            labels: col(LogAttr::Labels),
            level: col(LogAttr::Level),
            trace_id: by_override(opts.trace_id_field.as_deref()).or_else(|| col(LogAttr::TraceId)),
            span_id: by_override(opts.span_id_field.as_deref()).or_else(|| col(LogAttr::SpanId)),
        })
    }
}

/// Label keys tried for an id, the override first.
fn label_keys(override_name: Option<&str>, attr: LogAttr) -> Vec<String> {
    let synonyms = LOG_SCHEMA
        .iter()
        .filter(|r| r.attr == attr)
        .flat_map(|r| r.names.iter().map(|n| n.to_string()));
    override_name
        .map(str::to_string)
        .into_iter()
        .chain(synonyms)
        .collect()
}

fn label_lookup<S: AsRef<str>>(labels: &BTreeMap<String, String>, keys: &[S]) -> Option<String> {
    keys.iter().find_map(|key| {
        labels
            .iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(key.as_ref()) && !v.trim().is_empty())
            .map(|(_, v)| v.clone())
    })
}

fn parse_labels(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = value.and_then(decode_embedded_json) else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| value_as_string(v).map(|v| (k.clone(), v)))
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Nanosecond columns are taken verbatim; other numeric epochs are scaled by
/// magnitude and strings may also be RFC3339.
fn timestamp_nanos(field: &Field, row: usize) -> Option<i64> {
    let native = is_nanosecond_field(&field.name);
    let from_int = |v: i64| if native { v } else { epoch_int_to_nanos(v) };
    let from_float = |v: f64| {
        if native {
            v.is_finite().then(|| v.round() as i64)
        } else {
            epoch_float_to_nanos(v)
        }
    };

    match field.value(row)? {
        Value::Number(n) => match n.as_i64() {
            Some(v) => Some(from_int(v)),
            None => n.as_f64().and_then(from_float),
        },
        Value::String(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i64>() {
                Some(from_int(v))
            } else if let Ok(v) = s.parse::<f64>() {
                from_float(v)
            } else {
                parse_rfc3339_nanos(s)
            }
        }
        _ => None,
    }
}
