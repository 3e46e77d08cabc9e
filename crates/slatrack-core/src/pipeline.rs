use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use slatrack_parser::{load_requests, ParserError, RequestLog};
use tracing::{info, warn};
use uuid::Uuid;

use crate::charts;
use crate::config::PipelineConfig;
use crate::enrichment::{self, EnrichedLog, EnrichmentOptions, EnrichmentReport};
use crate::error::{PipelineError, Result};
use crate::metrics::{self, MetricTables, SlaSummary};
use crate::outputs::{self, RunManifest, WrittenTable};
use crate::sql;

/// Enriched snapshot plus every aggregate derived from it.
#[derive(Debug, Clone)]
pub struct ComputedReport {
    pub enriched: EnrichedLog,
    pub tables: MetricTables,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub run_id: Uuid,
    pub as_of: NaiveDate,
    pub input_path: PathBuf,
    pub input_blake3: String,
    pub sla_summary: SlaSummary,
    pub enrichment: EnrichmentReport,
    pub tables: Vec<WrittenTable>,
    pub charts: Vec<PathBuf>,
    pub sql_script: Option<PathBuf>,
    pub manifest: PathBuf,
}

/// Enrich and aggregate without touching the filesystem.
pub fn compute(
    log: &RequestLog,
    as_of: NaiveDate,
    options: EnrichmentOptions,
) -> Result<ComputedReport> {
    let enriched = enrichment::enrich_requests(log, as_of, options)?;
    let tables = metrics::compute_all(&enriched);
    Ok(ComputedReport { enriched, tables })
}

pub fn run(config: &PipelineConfig) -> Result<PipelineSummary> {
    run_at(config, Utc::now())
}

/// Runs the whole pipeline with `now` as the wall clock. All-or-nothing: the first
/// failure aborts the run.
pub fn run_at(config: &PipelineConfig, now: DateTime<Utc>) -> Result<PipelineSummary> {
    let as_of = config.resolve_as_of(now)?;
    let input_path = config.paths.input.clone();

    info!(input = %input_path.display(), %as_of, "loading request log");
    let loaded = load_requests(&input_path).map_err(|err| match err {
        ParserError::Io { path, source } => PipelineError::Io { path, source },
        other => PipelineError::MalformedInput(other),
    })?;
    info!(rows = loaded.log.len(), blake3 = %loaded.content_hash, "request log loaded");

    let options = EnrichmentOptions {
        validate_due_dates: config.run.validate_due_dates,
    };
    let report = compute(&loaded.log, as_of, options)?;
    let enrichment_report = report.enriched.report.clone();
    if enrichment_report.data_issues > 0 {
        warn!(
            excluded = enrichment_report.data_issues,
            "requests with inconsistent status/completion data were left out of the aggregates"
        );
    }
    info!(
        closed = report.tables.sla_summary.closed_requests,
        open = report.tables.sla_summary.open_requests,
        breached = report.tables.sla_summary.breached_requests,
        breach_rate_pct = report.tables.sla_summary.breach_rate_pct,
        "aggregates computed"
    );

    let output_dir = &config.paths.output_dir;
    let tables = outputs::write_tables(&report.enriched, &report.tables, output_dir)?;

    let charts = if config.run.charts {
        charts::write_charts(&report.tables, &config.paths.chart_dir)?
    } else {
        info!("chart rendering disabled");
        Vec::new()
    };

    let sql_script = if config.run.sql_export {
        let path = output_dir.join(sql::LOAD_SCRIPT_FILE_NAME);
        fs::write(&path, sql::render_load_script(&report.enriched))
            .map_err(|err| PipelineError::io(&path, err))?;
        info!(path = %path.display(), "wrote SQL load script");
        Some(path)
    } else {
        None
    };

    let run_id = Uuid::new_v4();
    let manifest = RunManifest {
        run_id,
        generated_at: now,
        as_of,
        input_path: input_path.clone(),
        input_blake3: loaded.content_hash.clone(),
        tables: tables.clone(),
        charts: charts.clone(),
        sql_script: sql_script.clone(),
        enrichment: enrichment_report.clone(),
    };
    let manifest_path = outputs::write_manifest(&manifest, output_dir)?;
    info!(%run_id, manifest = %manifest_path.display(), "pipeline run complete");

    Ok(PipelineSummary {
        run_id,
        as_of,
        input_path,
        input_blake3: loaded.content_hash,
        sla_summary: report.tables.sla_summary,
        enrichment: enrichment_report,
        tables,
        charts,
        sql_script,
        manifest: manifest_path,
    })
}
