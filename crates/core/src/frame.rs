use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TracelogError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Time,
    Number,
    String,
    Boolean,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    pub fn value(&self, row: usize) -> Option<&Value> {
        self.values.get(row).filter(|v| !v.is_null())
    }

    pub fn str_at(&self, row: usize) -> Option<String> {
        self.value(row).and_then(value_as_string)
    }

    pub fn f64_at(&self, row: usize) -> Option<f64> {
        self.value(row).and_then(value_as_f64)
    }
}

/// A named, column-oriented table as handed over by an upstream query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Frame {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Frame {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { name: None, fields }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Rows available in every column. Ragged frames are cut to the shortest.
    pub fn row_count(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.values.len())
            .min()
            .unwrap_or(0)
    }

    pub fn is_ragged(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.values.len() != self.row_count())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FrameInput {
    Many(Vec<Frame>),
    One(Frame),
}

pub fn frames_from_json(raw: &str) -> Result<Vec<Frame>> {
    let parsed: FrameInput = serde_json::from_str(raw)
        .map_err(|e| TracelogError::Parse(format!("invalid frame json: {e}")))?;
    Ok(match parsed {
        FrameInput::Many(frames) => frames,
        FrameInput::One(frame) => vec![frame],
    })
}

pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Decodes strings that carry an embedded JSON object or array.
pub fn decode_embedded_json(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                serde_json::from_str(s).ok()
            } else {
                None
            }
        }
        Value::Object(_) | Value::Array(_) => Some(value.clone()),
        _ => None,
    }
}
