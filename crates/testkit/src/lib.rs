use serde_json::{Value, json};
use tracelog_core::frame::{Field, FieldKind, Frame};

/// 2026-02-01T00:00:00Z in epoch milliseconds.
pub const BASE_MS: i64 = 1_769_904_000_000;

pub fn ms_to_ns(ms: i64) -> i64 {
    ms * 1_000_000
}

pub fn string_field(name: &str, values: &[Option<&str>]) -> Field {
    Field::new(
        name,
        FieldKind::String,
        values
            .iter()
            .map(|v| v.map(|s| json!(s)).unwrap_or(Value::Null))
            .collect(),
    )
}

pub fn number_field(name: &str, values: &[f64]) -> Field {
    Field::new(
        name,
        FieldKind::Number,
        values.iter().map(|v| json!(v)).collect(),
    )
}

pub fn time_field(name: &str, values: &[i64]) -> Field {
    Field::new(
        name,
        FieldKind::Time,
        values.iter().map(|v| json!(v)).collect(),
    )
}

pub fn json_field(name: &str, values: Vec<Value>) -> Field {
    Field::new(name, FieldKind::Other, values)
}

/// Three spans recorded in milliseconds: a root with a cache child and a db
/// child, spread over two services.
pub fn sample_trace_frame(trace_id: &str) -> Frame {
    Frame::new(vec![
        string_field("traceID", &[Some(trace_id), Some(trace_id), Some(trace_id)]),
        string_field("spanID", &[Some("root"), Some("child"), Some("db")]),
        string_field("parentSpanID", &[None, Some("root"), Some("root")]),
        string_field(
            "operationName",
            &[Some("GET /v1/orders"), Some("cache.get redis"), Some("SELECT orders")],
        ),
        string_field("serviceName", &[Some("api"), Some("api"), Some("postgres")]),
        time_field("startTime", &[BASE_MS, BASE_MS + 900, BASE_MS + 100]),
        number_field("duration", &[2400.0, 1200.0, 1000.0]),
        json_field(
            "tags",
            vec![
                json!([{"key": "http.status_code", "value": 503}]),
                json!([{"key": "peer", "value": "redis:6379"}]),
                json!({"db.system": "postgresql"}),
            ],
        ),
    ])
    .with_name("traces")
}

/// Logs for [`sample_trace_frame`]: two pinned to the cache span by id, one
/// carrying only the trace id, and one unrelated line.
pub fn sample_log_frame(trace_id: &str) -> Frame {
    let ts = [BASE_MS + 950, BASE_MS + 1200, BASE_MS + 150, BASE_MS + 5000];
    Frame::new(vec![
        time_field("Time", &ts),
        Field::new(
            "tsNs",
            FieldKind::String,
            ts.iter().map(|ms| json!(ms_to_ns(*ms).to_string())).collect(),
        ),
        string_field(
            "line",
            &[
                Some("retrying attempt=2"),
                Some("context deadline exceeded"),
                Some("query planned"),
                Some("heartbeat"),
            ],
        ),
        json_field(
            "labels",
            vec![
                json!({"service_name": "api", "level": "warn"}),
                json!({"service_name": "api", "level": "error"}),
                json!({"service_name": "postgres"}),
                json!({"service_name": "agent", "level": "debug"}),
            ],
        ),
        string_field("traceID", &[Some(trace_id), Some(trace_id), Some(trace_id), None]),
        string_field("spanID", &[Some("child"), Some("child"), None, None]),
    ])
    .with_name("logs")
}
