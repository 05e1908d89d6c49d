mod input;
mod output;
mod telemetry;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracelog_core::config::Config;
use tracelog_core::filter::{AttrFilter, LogSearch, SpanFilter};
use tracelog_core::model::log::{LogLevel, LogLine};
use tracelog_core::time::{DurationUnitHint, parse_duration_str};
use tracelog_ingest::ingest_logs;
use tracelog_reconcile::reconcile;

use crate::input::read_frames;
use crate::output::{
    ServiceColors, SpanRow, print_empty_state, print_json, print_logs_human, print_spans_human,
    print_trace_human, trace_view,
};
use crate::telemetry::init_cli_tracing;

#[derive(Parser, Debug)]
#[command(name = "tracelog")]
#[command(about = "Reconcile trace spans with log lines from exported query frames")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, help = "auto, microseconds, milliseconds or seconds")]
    duration_unit: Option<String>,

    #[arg(long, global = true)]
    trace_id_field: Option<String>,

    #[arg(long, global = true)]
    span_id_field: Option<String>,

    #[arg(long, global = true, help = "Time-window slack, e.g. 1ms or 500us")]
    match_buffer: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Build the span tree and attach logs to each span")]
    Trace {
        #[arg(long, help = "Trace frames JSON file, or - for stdin")]
        spans: PathBuf,
        #[arg(long, help = "Log frames JSON file")]
        logs: Option<PathBuf>,
        #[arg(long, help = "Only show the subtree under this span id")]
        root: Option<String>,
    },
    #[command(about = "List spans in tree order")]
    Spans {
        #[arg(long)]
        spans: PathBuf,
        #[arg(long)]
        service: Option<String>,
        #[arg(long = "where")]
        where_filters: Vec<String>,
    },
    #[command(about = "Search ingested log lines")]
    Logs {
        #[arg(long)]
        logs: PathBuf,
        pattern: Option<String>,
        #[arg(long)]
        fixed: bool,
        #[arg(short = 'i', long)]
        ignore_case: bool,
        #[arg(long, help = "Minimum level: trace, debug, info, warn or error")]
        level: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing();

    let cfg = resolve_config(&cli)?;
    let mut colors = ServiceColors::new(!cli.json && std::io::stdout().is_terminal());

    match cli.command {
        Commands::Trace { spans, logs, root } => {
            let trace_frames = read_frames(&spans)?;
            let log_frames = match logs {
                Some(path) => read_frames(&path)?,
                None => Vec::new(),
            };

            let out = reconcile(&trace_frames, &log_frames, &cfg);
            let Some(trace) = &out.trace else {
                print_empty_state(cli.json, json!({ "trace": null, "spans": [] }));
                return Ok(());
            };

            let start = match root {
                Some(id) => trace.span_by_id(&id).with_context(|| {
                    format!("span {id} not found in trace {}", trace.trace_id)
                })?,
                None => trace.root,
            };
            let entries = out.spans_with_logs_from(start);

            if cli.json {
                print_json(&trace_view(trace, out.unit, &entries))?;
            } else {
                print_trace_human(trace, out.unit, start, &entries, &mut colors);
            }
            Ok(())
        }
        Commands::Spans {
            spans,
            service,
            where_filters,
        } => {
            let filter = SpanFilter {
                service,
                attr_filters: where_filters
                    .iter()
                    .map(|f| AttrFilter::parse(f))
                    .collect::<tracelog_core::Result<Vec<_>>>()?,
            };

            let trace_frames = read_frames(&spans)?;
            let out = reconcile(&trace_frames, &[], &cfg);
            let Some(trace) = &out.trace else {
                print_empty_state(cli.json, json!([]));
                return Ok(());
            };

            // Tree order first, then whatever the tree could not reach.
            let listed = trace
                .preorder()
                .into_iter()
                .map(|idx| &trace.spans[idx])
                .chain(trace.unreachable())
                .filter(|span| filter.matches(span))
                .collect::<Vec<_>>();

            if cli.json {
                let rows = listed
                    .iter()
                    .map(|span| SpanRow::new(trace, span))
                    .collect::<Vec<_>>();
                print_json(&rows)?;
            } else {
                print_spans_human(&listed, &mut colors);
            }
            Ok(())
        }
        Commands::Logs {
            logs,
            pattern,
            fixed,
            ignore_case,
            level,
        } => {
            let search = LogSearch {
                pattern,
                fixed,
                ignore_case,
                min_level: level.map(|l| LogLevel::from_str(&l)).transpose()?,
            };

            let frames = read_frames(&logs)?;
            let lines = ingest_logs(&frames, &cfg.ingest_options());
            let found = search.apply(&lines)?;

            if cli.json {
                print_json(&LogsView {
                    total: lines.len(),
                    matches: found.len(),
                    logs: found,
                })?;
            } else {
                print_logs_human(&found, &mut colors);
            }
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct LogsView<'a> {
    total: usize,
    matches: usize,
    logs: Vec<&'a LogLine>,
}

/// File and environment layers, then command-line flags on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = Config::load().context("failed loading configuration")?;
    if let Some(unit) = &cli.duration_unit {
        cfg.duration_unit = DurationUnitHint::from_str(unit)?;
    }
    if let Some(field) = &cli.trace_id_field {
        cfg.trace_id_field = Some(field.clone());
    }
    if let Some(field) = &cli.span_id_field {
        cfg.span_id_field = Some(field.clone());
    }
    if let Some(buffer) = &cli.match_buffer {
        cfg.match_buffer = parse_duration_str(buffer)?;
    }
    Ok(cfg)
}
