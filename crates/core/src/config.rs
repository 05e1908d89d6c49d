use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelogError};
use crate::time::DurationUnitHint;

/// Slack applied on both sides of a span when matching logs by time.
pub const DEFAULT_MATCH_BUFFER: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub duration_unit: DurationUnitHint,
    pub trace_id_field: Option<String>,
    pub span_id_field: Option<String>,
    pub match_buffer: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration_unit: DurationUnitHint::Auto,
            trace_id_field: None,
            span_id_field: None,
            match_buffer: DEFAULT_MATCH_BUFFER,
        }
    }
}

/// The scalar knobs the ingest and correlation stages read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct IngestOptions {
    pub duration_unit: DurationUnitHint,
    pub trace_id_field: Option<String>,
    pub span_id_field: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path(), |key| env::var(key).ok())
    }

    /// Defaults, then the config file if present, then the environment.
    pub fn load_from<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(file_overrides) = load_file_overrides(path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides(lookup);
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            duration_unit: self.duration_unit,
            trace_id_field: self.trace_id_field.clone(),
            span_id_field: self.span_id_field.clone(),
        }
    }

    pub fn match_buffer_micros(&self) -> f64 {
        self.match_buffer.as_micros() as f64
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    duration_unit: Option<String>,
    trace_id_field: Option<String>,
    span_id_field: Option<String>,
    match_buffer: Option<String>,
}

pub fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACELOG_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tracelog/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| TracelogError::Io(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| TracelogError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides<F>(lookup: F) -> ConfigOverrides
where
    F: Fn(&str) -> Option<String>,
{
    ConfigOverrides {
        duration_unit: lookup("TRACELOG_DURATION_UNIT"),
        trace_id_field: lookup("TRACELOG_TRACE_ID_FIELD"),
        span_id_field: lookup("TRACELOG_SPAN_ID_FIELD"),
        match_buffer: lookup("TRACELOG_MATCH_BUFFER"),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.duration_unit {
        cfg.duration_unit = DurationUnitHint::from_str(&v).map_err(|e| {
            TracelogError::Config(format!("bad duration_unit in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.trace_id_field {
        cfg.trace_id_field = non_empty(v);
    }
    if let Some(v) = overrides.span_id_field {
        cfg.span_id_field = non_empty(v);
    }
    if let Some(v) = overrides.match_buffer {
        cfg.match_buffer = humantime::parse_duration(&v).map_err(|e| {
            TracelogError::Config(format!("bad match_buffer in {source}: {e} (value={v})"))
        })?;
    }
    Ok(())
}

fn non_empty(v: String) -> Option<String> {
    let trimmed = v.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
