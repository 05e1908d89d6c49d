use std::collections::{HashMap, HashSet};

use tracelog_core::model::span::Span;
use tracelog_core::model::trace::Trace;
use tracing::{debug, warn};

/// Links a flat span list into a rooted trace.
///
/// Root choice: the last span without a parent id; failing that, the first
/// orphan (declared parent not present); failing that, the first span.
/// Other parentless spans hang directly under the root. Orphans that did not
/// become root stay in `spans` with no depth. Returns `None` for no spans.
pub fn build_trace(mut spans: Vec<Span>) -> Option<Trace> {
    if spans.is_empty() {
        return None;
    }
    for span in &mut spans {
        span.children.clear();
        span.depth = None;
    }

    // Duplicate ids resolve to the last occurrence.
    let index = spans
        .iter()
        .enumerate()
        .map(|(i, s)| (s.span_id.clone(), i))
        .collect::<HashMap<_, _>>();
    let parent_of = |span: &Span| span.parent_id().map(|p| index.get(p).copied());

    let mut root = None;
    let mut orphans = 0usize;
    for (i, span) in spans.iter().enumerate() {
        match parent_of(span) {
            None => root = Some(i),
            Some(Some(_)) => {}
            Some(None) => {
                orphans += 1;
                if root.is_none() {
                    root = Some(i);
                }
            }
        }
    }
    let root = root.unwrap_or(0);

    let mut extra_roots = 0usize;
    for i in 0..spans.len() {
        if i == root {
            continue;
        }
        match parent_of(&spans[i]) {
            None => {
                extra_roots += 1;
                spans[root].children.push(i);
            }
            Some(Some(parent)) => spans[parent].children.push(i),
            Some(None) => {}
        }
    }

    let pruned = assign_depths(&mut spans, root);
    if pruned > 0 {
        warn!(pruned, "dropped parent links that formed a cycle");
    }

    let start_time = spans
        .iter()
        .map(|s| s.start_time)
        .fold(f64::INFINITY, f64::min);
    let end_time = spans
        .iter()
        .map(Span::end_time)
        .fold(f64::NEG_INFINITY, f64::max);

    let services = {
        let mut seen = HashSet::new();
        spans
            .iter()
            .filter(|s| seen.insert(s.service_name.as_str()))
            .map(|s| s.service_name.clone())
            .collect::<Vec<_>>()
    };

    let trace = Trace {
        trace_id: spans[root].trace_id.clone(),
        root,
        start_time,
        end_time,
        duration: end_time - start_time,
        services,
        spans,
    };
    debug!(
        trace_id = %trace.trace_id,
        root = %trace.root_span().span_id,
        spans = trace.spans.len(),
        reachable = trace.reachable_count(),
        orphans,
        extra_roots,
        "built span tree"
    );
    Some(trace)
}

/// Assigns depths from the root and strips links that would close a cycle.
/// Detached subtrees are walked too, without depths, so that the remaining
/// links always form a forest. Returns how many links were removed.
fn assign_depths(spans: &mut [Span], root: usize) -> usize {
    let mut visited = vec![false; spans.len()];
    let mut pruned = walk(spans, root, &mut visited, true);

    let mut attached = vec![false; spans.len()];
    for span in spans.iter() {
        for child in &span.children {
            attached[*child] = true;
        }
    }
    // Subtree heads first; whatever is left afterwards sits on a pure cycle.
    for i in 0..spans.len() {
        if !visited[i] && !attached[i] {
            pruned += walk(spans, i, &mut visited, false);
        }
    }
    for i in 0..spans.len() {
        if !visited[i] {
            pruned += walk(spans, i, &mut visited, false);
        }
    }
    pruned
}

fn walk(spans: &mut [Span], start: usize, visited: &mut [bool], with_depth: bool) -> usize {
    let mut pruned = 0;
    visited[start] = true;
    if with_depth {
        spans[start].depth = Some(0);
    }

    let mut stack = vec![start];
    while let Some(idx) = stack.pop() {
        let depth = spans[idx].depth;
        let children = std::mem::take(&mut spans[idx].children);
        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            if visited[child] {
                pruned += 1;
                continue;
            }
            visited[child] = true;
            if with_depth {
                spans[child].depth = depth.map(|d| d + 1);
            }
            kept.push(child);
            stack.push(child);
        }
        spans[idx].children = kept;
    }
    pruned
}
