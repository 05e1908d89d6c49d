use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// One traced operation. Times are microseconds after ingestion.
///
/// `children` and `depth` belong to the tree builder: ingestion leaves them
/// empty/unset, and `children` holds indices into the owning trace's spans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Span {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub operation_name: String,
    pub service_name: String,
    pub start_time: f64,
    pub duration: f64,
    pub tags: BTreeMap<String, TagValue>,
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default)]
    pub depth: Option<usize>,
}

impl Span {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// A missing or empty parent id makes the span a root candidate.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_span_id.as_deref().filter(|p| !p.is_empty())
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration / 1_000.0
    }
}
