use serde::{Deserialize, Serialize};

use crate::model::span::Span;

/// A reconciled trace: the flat span arena plus the derived tree.
///
/// `root` indexes into `spans` and is always valid. Spans that the tree does
/// not reach keep `depth == None` but still count towards the time bounds
/// and the service list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trace {
    pub trace_id: String,
    pub spans: Vec<Span>,
    pub root: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub services: Vec<String>,
}

impl Trace {
    pub fn root_span(&self) -> &Span {
        &self.spans[self.root]
    }

    /// Last span carrying `span_id`, matching how the tree indexes duplicates.
    pub fn span_by_id(&self, span_id: &str) -> Option<usize> {
        self.spans.iter().rposition(|s| s.span_id == span_id)
    }

    pub fn preorder(&self) -> Vec<usize> {
        self.preorder_from(self.root)
    }

    /// Depth-first, parent before children, children in insertion order.
    pub fn preorder_from(&self, start: usize) -> Vec<usize> {
        let mut out = Vec::new();
        if start >= self.spans.len() {
            return out;
        }
        let mut visited = vec![false; self.spans.len()];
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut visited[idx], true) {
                continue;
            }
            out.push(idx);
            stack.extend(
                self.spans[idx]
                    .children
                    .iter()
                    .rev()
                    .copied()
                    .filter(|c| *c < self.spans.len() && !visited[*c]),
            );
        }
        out
    }

    pub fn descendants(&self, idx: usize) -> Vec<usize> {
        let mut out = self.preorder_from(idx);
        if !out.is_empty() {
            out.remove(0);
        }
        out
    }

    pub fn reachable_count(&self) -> usize {
        self.spans.iter().filter(|s| s.depth.is_some()).count()
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|s| s.depth.is_none())
    }
}
