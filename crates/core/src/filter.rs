use glob::Pattern;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelogError};
use crate::model::log::{LogLevel, LogLine};
use crate::model::span::Span;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttrFilter {
    pub key: String,
    pub value_glob: String,
}

impl AttrFilter {
    pub fn parse(input: &str) -> Result<Self> {
        let (key, value_glob) = input
            .split_once('=')
            .ok_or_else(|| TracelogError::Parse(format!("invalid where filter: {input}")))?;

        if key.trim().is_empty() || value_glob.trim().is_empty() {
            return Err(TracelogError::Parse(format!("invalid where filter: {input}")));
        }

        Ok(Self {
            key: key.trim().to_string(),
            value_glob: value_glob.trim().to_string(),
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        Pattern::new(&self.value_glob)
            .map(|p| p.matches(value))
            .unwrap_or(false)
    }

    /// `tags.` prefixes are optional; `service` and `name` address the span itself.
    pub fn matches_span(&self, span: &Span) -> bool {
        let key = self.key.trim_start_matches("tags.");
        match key {
            "service" => self.matches(&span.service_name),
            "name" | "operation" => self.matches(&span.operation_name),
            _ => span
                .tags
                .get(key)
                .is_some_and(|v| self.matches(&v.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SpanFilter {
    pub service: Option<String>,
    pub attr_filters: Vec<AttrFilter>,
}

impl SpanFilter {
    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.attr_filters.is_empty()
    }

    pub fn matches(&self, span: &Span) -> bool {
        if let Some(service) = &self.service
            && span.service_name != *service
        {
            return false;
        }
        self.attr_filters.iter().all(|f| f.matches_span(span))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LogSearch {
    pub pattern: Option<String>,
    pub fixed: bool,
    pub ignore_case: bool,
    pub min_level: Option<LogLevel>,
}

impl LogSearch {
    /// Keeps the lines at or above `min_level` whose text matches `pattern`,
    /// preserving input order.
    pub fn apply<'a>(&self, logs: &'a [LogLine]) -> Result<Vec<&'a LogLine>> {
        let mut rows = logs
            .iter()
            .filter(|l| self.min_level.is_none_or(|floor| l.level.at_least(floor)))
            .collect::<Vec<_>>();

        let Some(pattern) = &self.pattern else {
            return Ok(rows);
        };

        if self.fixed {
            let needle = if self.ignore_case {
                pattern.to_ascii_lowercase()
            } else {
                pattern.to_string()
            };
            rows.retain(|l| {
                if self.ignore_case {
                    l.line.to_ascii_lowercase().contains(&needle)
                } else {
                    l.line.contains(&needle)
                }
            });
            return Ok(rows);
        }

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .map_err(|e| TracelogError::Parse(format!("invalid regex pattern: {e}")))?;
        rows.retain(|l| regex.is_match(&l.line));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::span::TagValue;

    fn log(line: &str, level: LogLevel) -> LogLine {
        LogLine {
            timestamp: 0,
            line: line.into(),
            labels: BTreeMap::new(),
            level,
            trace_id: None,
            span_id: None,
        }
    }

    fn span() -> Span {
        let mut tags = BTreeMap::new();
        tags.insert("http.status_code".to_string(), TagValue::Number(503.0));
        tags.insert("peer".to_string(), TagValue::String("redis:6379".into()));
        Span {
            trace_id: "t1".into(),
            span_id: "s1".into(),
            parent_span_id: None,
            operation_name: "GET /orders".into(),
            service_name: "api".into(),
            start_time: 0.0,
            duration: 10.0,
            tags,
            children: Vec::new(),
            depth: None,
        }
    }

    #[test]
    fn attr_filter_parse_and_match() {
        let f = AttrFilter::parse("tags.peer=redis:*").unwrap();
        assert_eq!(f.key, "tags.peer");
        assert!(f.matches("redis:6379"));
        assert!(!f.matches("postgres:5432"));
        assert!(AttrFilter::parse("peer").is_err());
        assert!(AttrFilter::parse("=x").is_err());
    }

    #[test]
    fn span_filter_checks_service_and_tags() {
        let s = span();
        let f = SpanFilter {
            service: Some("api".into()),
            attr_filters: vec![AttrFilter::parse("http.status_code=5*").unwrap()],
        };
        assert!(f.matches(&s));

        let other = SpanFilter {
            service: Some("worker".into()),
            attr_filters: Vec::new(),
        };
        assert!(!other.matches(&s));
        assert!(SpanFilter::default().is_empty());
        assert!(SpanFilter::default().matches(&s));
    }

    #[test]
    fn name_key_addresses_operation() {
        let f = AttrFilter::parse("name=GET *").unwrap();
        assert!(f.matches_span(&span()));
        let missing = AttrFilter::parse("tags.absent=*").unwrap();
        assert!(!missing.matches_span(&span()));
    }

    #[test]
    fn log_search_modes() {
        let logs = vec![
            log("Timeout talking to redis", LogLevel::Warn),
            log("request ok", LogLevel::Info),
            log("db error: timeout", LogLevel::Error),
        ];
        let lines = |found: Vec<&LogLine>| found.iter().map(|l| l.line.clone()).collect::<Vec<_>>();

        let regex = LogSearch {
            pattern: Some("timeout|ok$".into()),
            ..LogSearch::default()
        };
        assert_eq!(
            lines(regex.apply(&logs).unwrap()),
            vec!["request ok", "db error: timeout"]
        );

        let fixed = LogSearch {
            pattern: Some("TIMEOUT".into()),
            fixed: true,
            ignore_case: true,
            ..LogSearch::default()
        };
        assert_eq!(fixed.apply(&logs).unwrap().len(), 2);

        let leveled = LogSearch {
            min_level: Some(LogLevel::Warn),
            ..LogSearch::default()
        };
        assert_eq!(
            lines(leveled.apply(&logs).unwrap()),
            vec!["Timeout talking to redis", "db error: timeout"]
        );

        let bad = LogSearch {
            pattern: Some("(".into()),
            ..LogSearch::default()
        };
        assert!(bad.apply(&logs).is_err());
    }
}
