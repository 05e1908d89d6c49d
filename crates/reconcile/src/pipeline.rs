use tracelog_core::config::Config;
use tracelog_core::frame::Frame;
use tracelog_core::model::log::LogLine;
use tracelog_core::model::trace::Trace;
use tracelog_core::time::DurationUnit;
use tracelog_ingest::{IngestedSpans, ingest_logs, ingest_spans};
use tracing::{debug, info};

use crate::correlate::{SpanWithLogs, correlate_subtree};
use crate::tree::build_trace;

/// Everything one refresh derives from a pair of frame sets.
///
/// `trace == None` is the "no trace data" state; logs are still ingested so
/// that a caller can show them on their own.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub trace: Option<Trace>,
    pub unit: Option<DurationUnit>,
    pub logs: Vec<LogLine>,
    pub match_buffer_us: f64,
}

impl Reconciled {
    pub fn spans_with_logs(&self) -> Vec<SpanWithLogs<'_>> {
        match &self.trace {
            Some(trace) => self.spans_with_logs_from(trace.root),
            None => Vec::new(),
        }
    }

    /// Correlation for the subtree under span index `start`.
    pub fn spans_with_logs_from(&self, start: usize) -> Vec<SpanWithLogs<'_>> {
        match &self.trace {
            Some(trace) => correlate_subtree(trace, start, &self.logs, self.match_buffer_us),
            None => Vec::new(),
        }
    }
}

pub fn reconcile(trace_frames: &[Frame], log_frames: &[Frame], cfg: &Config) -> Reconciled {
    let opts = cfg.ingest_options();
    let ingested = ingest_spans(trace_frames, &opts);
    let unit = ingested.as_ref().map(|i| i.unit);
    let trace = ingested.and_then(|IngestedSpans { spans, .. }| build_trace(spans));
    let logs = ingest_logs(log_frames, &opts);

    match &trace {
        Some(t) => info!(
            trace_id = %t.trace_id,
            spans = t.spans.len(),
            logs = logs.len(),
            "reconciled trace"
        ),
        None => debug!(logs = logs.len(), "no trace data"),
    }

    Reconciled {
        trace,
        unit,
        logs,
        match_buffer_us: cfg.match_buffer_micros(),
    }
}
