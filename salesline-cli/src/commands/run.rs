//! Run command - process the extracts and publish the output

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use uuid::Uuid;

use salesline_core::adapters::JsonLinesSink;
use salesline_core::config::Config;
use salesline_core::ports::{ProgressReporter, TableSink};
use salesline_core::services::logging::{PUBLISH_COMPLETED, RUN_COMPLETED, RUN_STARTED};
use salesline_core::services::{
    LogEvent, PipelineService, PublishService, PublishSummary, RunLogService,
};
use salesline_core::{
    InputBundle, OperationResult, OutputTable, PipelineOutput, ProgressEvent, RunStats,
    SaleslineContext, DATABASE_FILE,
};

use super::{ensure_data_dir, get_logger, log_event};
use crate::output;

/// Where the output goes
pub enum Destination {
    None,
    JsonLines(PathBuf),
    Database,
}

/// Mirrors progress events onto a terminal bar, when there is one
struct BarReporter {
    bar: Option<ProgressBar>,
}

impl BarReporter {
    fn new(visible: bool) -> Self {
        let bar = visible.then(|| {
            let bar = ProgressBar::new(100);
            let style = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        Self { bar }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, event: ProgressEvent) {
        tracing::debug!(label = %event.label, percentage = event.percentage, "progress");
        if let Some(bar) = &self.bar {
            bar.set_position(event.percentage as u64);
            bar.set_message(event.label);
        }
    }
}

#[derive(Serialize)]
struct RunReport {
    run_id: String,
    fingerprint: String,
    rows: Vec<TableRows>,
    stats: RunStats,
    destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    publish: Option<PublishSummary>,
}

#[derive(Serialize)]
struct TableRows {
    table: OutputTable,
    rows: usize,
}

pub fn run(inputs: InputBundle, destination: Destination, yes: bool, json: bool) -> Result<()> {
    let data_dir = ensure_data_dir()?;
    let config = Config::load(&data_dir)?;
    let logger = get_logger();
    let run_id = Uuid::new_v4();

    log_event(
        &logger,
        LogEvent::new(RUN_STARTED).with_run(run_id).with_command("run"),
    );

    let reporter = BarReporter::new(!json && atty::is(atty::Stream::Stderr));
    let options = RunOptions { run_id, yes };
    let result = tokio::runtime::Runtime::new()?.block_on(execute(
        &inputs,
        &destination,
        &config,
        &data_dir,
        &reporter,
        &logger,
        options,
    ));
    reporter.finish();

    match result {
        Ok(Some(report)) => {
            log_event(&logger, LogEvent::new(RUN_COMPLETED).with_run(run_id));
            print_report(&report, json)
        }
        Ok(None) => {
            println!("Cancelled.");
            Ok(())
        }
        Err(failure) => {
            if let Some(l) = &logger {
                let _ = l.log_failure(
                    run_id,
                    failure.stage,
                    &format!("{:#}", failure.error),
                    failure.trace.as_deref(),
                );
            }
            Err(failure.error)
        }
    }
}

struct Failure {
    stage: &'static str,
    error: anyhow::Error,
    trace: Option<String>,
}

impl Failure {
    fn at(stage: &'static str, err: salesline_core::Error) -> Self {
        let trace = err.diagnostic_trace();
        Self {
            stage,
            error: err.into(),
            trace,
        }
    }

    fn setup(error: anyhow::Error) -> Self {
        Self {
            stage: "setup",
            error,
            trace: None,
        }
    }
}

struct RunOptions {
    run_id: Uuid,
    yes: bool,
}

/// What happens before stored tables are replaced
///
/// Only `--yes` skips the question; `--json` does not.
#[derive(Debug, PartialEq, Eq)]
enum ReplaceGuard {
    Proceed,
    Ask,
    Refuse,
}

impl ReplaceGuard {
    fn decide(yes: bool, interactive: bool) -> Self {
        match (yes, interactive) {
            (true, _) => ReplaceGuard::Proceed,
            (false, true) => ReplaceGuard::Ask,
            (false, false) => ReplaceGuard::Refuse,
        }
    }
}

async fn execute(
    inputs: &InputBundle,
    destination: &Destination,
    config: &Config,
    data_dir: &Path,
    reporter: &BarReporter,
    logger: &Option<RunLogService>,
    options: RunOptions,
) -> std::result::Result<Option<RunReport>, Failure> {
    let RunOptions { run_id, yes } = options;
    let pipeline = PipelineService::from_config(config);
    let output = pipeline
        .run(inputs, reporter)
        .await
        .map_err(|e| Failure::at("process", e))?;

    let (sink, label): (Option<Arc<dyn TableSink>>, String) = match destination {
        Destination::None => (None, "none (dry run)".to_string()),
        Destination::JsonLines(dir) => (
            Some(Arc::new(JsonLinesSink::new(dir.clone())) as Arc<dyn TableSink>),
            dir.display().to_string(),
        ),
        Destination::Database => {
            let ctx = SaleslineContext::new(data_dir).map_err(Failure::setup)?;
            (
                Some(ctx.repository.clone() as Arc<dyn TableSink>),
                data_dir.join(DATABASE_FILE).display().to_string(),
            )
        }
    };

    let mut publish = None;
    if let Some(sink) = sink {
        let interactive = atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stderr);
        match ReplaceGuard::decide(yes, interactive) {
            ReplaceGuard::Proceed => {}
            ReplaceGuard::Ask => {
                if !confirm_replace(&output, &label, reporter).map_err(Failure::setup)? {
                    return Ok(None);
                }
            }
            ReplaceGuard::Refuse => {
                return Err(Failure::setup(anyhow::anyhow!(
                    "Refusing to replace tables in {} without confirmation; pass --yes",
                    label
                )));
            }
        }
        let service = PublishService::new(sink, config.batch_size);
        let summary = service
            .publish(&output, reporter)
            .await
            .map_err(|e| Failure::at("publish", e))?;
        log_event(logger, LogEvent::new(PUBLISH_COMPLETED).with_run(run_id));
        publish = Some(summary);
    }

    Ok(Some(RunReport {
        run_id: run_id.to_string(),
        fingerprint: output.fingerprint(),
        rows: OutputTable::ALL
            .into_iter()
            .map(|table| TableRows {
                table,
                rows: output.len_of(table),
            })
            .collect(),
        stats: output.stats.clone(),
        destination: label,
        publish,
    }))
}

fn confirm_replace(output: &PipelineOutput, target: &str, reporter: &BarReporter) -> Result<bool> {
    let tables: Vec<&str> = OutputTable::ALL
        .into_iter()
        .filter(|t| output.len_of(*t) > 0)
        .map(|t| t.table_name())
        .collect();
    if tables.is_empty() {
        return Ok(true);
    }

    let prompt = format!("Replace {} in {}?", tables.join(", "), target);
    let confirmed = match &reporter.bar {
        Some(bar) => bar.suspend(|| Confirm::new().with_prompt(prompt).default(false).interact()),
        None => Confirm::new().with_prompt(prompt).default(false).interact(),
    }?;
    Ok(confirmed)
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&OperationResult::ok(report))?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Table", "Rows", "Batches"]);
    for entry in &report.rows {
        let batches = report
            .publish
            .as_ref()
            .and_then(|p| p.tables.iter().find(|t| t.table == entry.table))
            .map(|t| t.batches.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            entry.table.table_name().to_string(),
            entry.rows.to_string(),
            batches,
        ]);
    }
    println!("{}", table);

    if !report.stats.rule_hits.is_empty() {
        let mut hits = output::create_table();
        hits.set_header(vec!["Resolution", "Rows"]);
        for (kind, count) in &report.stats.rule_hits {
            hits.add_row(vec![kind.clone(), count.to_string()]);
        }
        println!("{}", hits);
    }

    println!(
        "Branch overrides: {}  Seller corrections: {}",
        report.stats.branch_overrides, report.stats.seller_branch_corrections
    );
    println!("Fingerprint: {}", report.fingerprint.dimmed());

    match &report.publish {
        None => output::warning("DRY RUN - nothing was published"),
        Some(summary) => {
            output::success(&format!(
                "Published {} rows to {}",
                summary.total_rows(),
                report.destination
            ));
            if !summary.cache_refreshed {
                output::warning("Cache refresh failed; dashboards may show stale filters");
            }
        }
    }
    Ok(())
}
