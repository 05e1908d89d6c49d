pub mod correlate;
pub mod pipeline;
pub mod tree;

pub use correlate::{
    SpanWithLogs, correlate_logs, correlate_logs_with_buffer, correlate_subtree, log_matches_span,
};
pub use pipeline::{Reconciled, reconcile};
pub use tree::build_trace;
