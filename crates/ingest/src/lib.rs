pub mod logs;
pub mod spans;

pub use logs::ingest_logs;
pub use spans::{IngestedSpans, ingest_spans};
