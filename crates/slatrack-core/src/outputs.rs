use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use polars::prelude::*;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::enrichment::{EnrichedLog, EnrichmentReport};
use crate::error::{PipelineError, Result};
use crate::metrics::MetricTables;

#[derive(Debug, Clone)]
pub struct OutputTableDescriptor {
    pub name: &'static str,
    pub file_name: &'static str,
    pub description: &'static str,
}

static OUTPUT_TABLES: Lazy<Vec<OutputTableDescriptor>> = Lazy::new(|| {
    vec![
        OutputTableDescriptor {
            name: "requests_enriched",
            file_name: "requests_enriched.csv",
            description: "Every request with its derived SLA, turnaround and aging fields",
        },
        OutputTableDescriptor {
            name: "sla_summary",
            file_name: "sla_summary.csv",
            description: "Overall open/closed/breached counts and breach rate",
        },
        OutputTableDescriptor {
            name: "team_sla_metrics",
            file_name: "team_sla_metrics.csv",
            description: "Closed-request breach rate and turnaround per requester team",
        },
        OutputTableDescriptor {
            name: "backlog_age_buckets",
            file_name: "backlog_age_buckets.csv",
            description: "Open requests per team and age bucket",
        },
        OutputTableDescriptor {
            name: "monthly_breach_rate",
            file_name: "monthly_breach_rate.csv",
            description: "Breach rate per completion month",
        },
        OutputTableDescriptor {
            name: "priority_turnaround",
            file_name: "priority_turnaround.csv",
            description: "Average turnaround per priority",
        },
    ]
});

pub fn all_output_tables() -> &'static [OutputTableDescriptor] {
    OUTPUT_TABLES.as_slice()
}

pub const MANIFEST_FILE_NAME: &str = "run_manifest.json";

#[derive(Debug, Clone, Serialize)]
pub struct WrittenTable {
    pub name: &'static str,
    pub path: PathBuf,
    pub rows: usize,
}

/// Run log written next to the tables. Unlike the tables it differs between runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub input_path: PathBuf,
    pub input_blake3: String,
    pub tables: Vec<WrittenTable>,
    pub charts: Vec<PathBuf>,
    pub sql_script: Option<PathBuf>,
    pub enrichment: EnrichmentReport,
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn format_month(month: NaiveDate) -> String {
    month.format("%Y-%m").to_string()
}

fn count(value: usize) -> i64 {
    value as i64
}

pub fn requests_enriched_frame(log: &EnrichedLog) -> PolarsResult<DataFrame> {
    let rows = &log.rows;
    let str_col = |name: &str, values: Vec<String>| -> Column {
        Series::new(name.into(), values).into()
    };
    let opt_str_col = |name: &str, values: Vec<Option<String>>| -> Column {
        Series::new(name.into(), values).into()
    };

    let columns: Vec<Column> = vec![
        str_col(
            "request_id",
            rows.iter().map(|r| r.request.request_id.clone()).collect(),
        ),
        str_col(
            "request_date",
            rows.iter().map(|r| format_date(r.request.request_date)).collect(),
        ),
        str_col(
            "requester_team",
            rows.iter().map(|r| r.request.requester_team.clone()).collect(),
        ),
        str_col(
            "request_type",
            rows.iter().map(|r| r.request.request_type.clone()).collect(),
        ),
        str_col(
            "priority",
            rows.iter().map(|r| r.request.priority.clone()).collect(),
        ),
        str_col(
            "channel",
            rows.iter().map(|r| r.request.channel.clone()).collect(),
        ),
        str_col(
            "due_date",
            rows.iter().map(|r| format_date(r.due_date)).collect(),
        ),
        str_col(
            "status",
            rows.iter().map(|r| r.request.status.clone()).collect(),
        ),
        opt_str_col(
            "completed_date",
            rows.iter()
                .map(|r| r.request.completed_date.map(format_date))
                .collect(),
        ),
        Series::new(
            "estimated_hours".into(),
            rows.iter()
                .map(|r| r.request.estimated_hours)
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "actual_hours".into(),
            rows.iter().map(|r| r.request.actual_hours).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "is_closed".into(),
            rows.iter().map(|r| r.is_closed).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "sla_target_bdays".into(),
            rows.iter()
                .map(|r| r.sla_target_bdays.map(i64::from))
                .collect::<Vec<_>>(),
        )
        .into(),
        opt_str_col(
            "policy_due_date",
            rows.iter().map(|r| r.policy_due_date.map(format_date)).collect(),
        ),
        str_col(
            "due_date_source",
            rows.iter()
                .map(|r| r.due_date_source.as_str().to_string())
                .collect(),
        ),
        Series::new(
            "due_date_matches_policy".into(),
            rows.iter()
                .map(|r| r.due_date_matches_policy)
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "turnaround_days".into(),
            rows.iter().map(|r| r.turnaround_days).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "turnaround_business_days".into(),
            rows.iter()
                .map(|r| r.turnaround_business_days)
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "age_days".into(),
            rows.iter().map(|r| r.age_days).collect::<Vec<_>>(),
        )
        .into(),
        opt_str_col(
            "age_bucket",
            rows.iter()
                .map(|r| r.age_bucket.map(|b| b.label().to_string()))
                .collect(),
        ),
        Series::new(
            "is_breached".into(),
            rows.iter().map(|r| r.is_breached).collect::<Vec<_>>(),
        )
        .into(),
        opt_str_col(
            "completion_month",
            rows.iter().map(|r| r.completion_month.map(format_month)).collect(),
        ),
        opt_str_col(
            "data_issue",
            rows.iter()
                .map(|r| r.data_issue.map(|issue| issue.as_str().to_string()))
                .collect(),
        ),
    ];

    DataFrame::new(columns)
}

pub fn sla_summary_frame(tables: &MetricTables) -> PolarsResult<DataFrame> {
    let summary = &tables.sla_summary;
    DataFrame::new(vec![
        Series::new("total_requests".into(), [count(summary.total_requests)]).into(),
        Series::new("closed_requests".into(), [count(summary.closed_requests)]).into(),
        Series::new("open_requests".into(), [count(summary.open_requests)]).into(),
        Series::new("breached_requests".into(), [count(summary.breached_requests)]).into(),
        Series::new("breach_rate_pct".into(), [summary.breach_rate_pct]).into(),
        Series::new("avg_turnaround_days".into(), [summary.avg_turnaround_days]).into(),
        Series::new("malformed_requests".into(), [count(summary.malformed_requests)]).into(),
        Series::new(
            "due_date_mismatches".into(),
            [count(summary.due_date_mismatches)],
        )
        .into(),
    ])
}

pub fn team_sla_metrics_frame(tables: &MetricTables) -> PolarsResult<DataFrame> {
    let rows = &tables.team_sla_metrics;
    DataFrame::new(vec![
        Series::new(
            "requester_team".into(),
            rows.iter()
                .map(|r| r.requester_team.as_str())
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "closed_requests".into(),
            rows.iter().map(|r| count(r.closed_requests)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "breached_requests".into(),
            rows.iter()
                .map(|r| count(r.breached_requests))
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "breach_rate_pct".into(),
            rows.iter().map(|r| r.breach_rate_pct).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "avg_turnaround_days".into(),
            rows.iter().map(|r| r.avg_turnaround_days).collect::<Vec<_>>(),
        )
        .into(),
    ])
}

pub fn backlog_age_buckets_frame(tables: &MetricTables) -> PolarsResult<DataFrame> {
    let rows = &tables.backlog_age_buckets;
    DataFrame::new(vec![
        Series::new(
            "requester_team".into(),
            rows.iter()
                .map(|r| r.requester_team.as_str())
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "age_bucket".into(),
            rows.iter().map(|r| r.age_bucket.label()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "open_requests".into(),
            rows.iter().map(|r| count(r.open_requests)).collect::<Vec<_>>(),
        )
        .into(),
    ])
}

pub fn monthly_breach_rate_frame(tables: &MetricTables) -> PolarsResult<DataFrame> {
    let rows = &tables.monthly_breach_rate;
    DataFrame::new(vec![
        Series::new(
            "completion_month".into(),
            rows.iter()
                .map(|r| format_month(r.completion_month))
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "closed_requests".into(),
            rows.iter().map(|r| count(r.closed_requests)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "breached_requests".into(),
            rows.iter()
                .map(|r| count(r.breached_requests))
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "breach_rate_pct".into(),
            rows.iter().map(|r| r.breach_rate_pct).collect::<Vec<_>>(),
        )
        .into(),
    ])
}

pub fn priority_turnaround_frame(tables: &MetricTables) -> PolarsResult<DataFrame> {
    let rows = &tables.priority_turnaround;
    DataFrame::new(vec![
        Series::new(
            "priority".into(),
            rows.iter().map(|r| r.priority.as_str()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "closed_requests".into(),
            rows.iter().map(|r| count(r.closed_requests)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "avg_turnaround_days".into(),
            rows.iter().map(|r| r.avg_turnaround_days).collect::<Vec<_>>(),
        )
        .into(),
    ])
}

/// Builds every output table, keyed by its registry name.
pub fn build_frames(
    log: &EnrichedLog,
    tables: &MetricTables,
) -> PolarsResult<Vec<(&'static OutputTableDescriptor, DataFrame)>> {
    let mut frames = Vec::with_capacity(all_output_tables().len());
    for descriptor in all_output_tables() {
        let frame = match descriptor.name {
            "requests_enriched" => requests_enriched_frame(log)?,
            "sla_summary" => sla_summary_frame(tables)?,
            "team_sla_metrics" => team_sla_metrics_frame(tables)?,
            "backlog_age_buckets" => backlog_age_buckets_frame(tables)?,
            "monthly_breach_rate" => monthly_breach_rate_frame(tables)?,
            "priority_turnaround" => priority_turnaround_frame(tables)?,
            other => {
                return Err(PolarsError::ComputeError(
                    format!("no frame builder registered for output table '{other}'").into(),
                ))
            }
        };
        frames.push((descriptor, frame));
    }
    Ok(frames)
}

/// Writes one DataFrame as CSV, replacing any previous file.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).map_err(|err| PipelineError::io(path, err))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)?;
    Ok(())
}

/// Materializes every output table under `output_dir`.
pub fn write_tables(
    log: &EnrichedLog,
    tables: &MetricTables,
    output_dir: &Path,
) -> Result<Vec<WrittenTable>> {
    fs::create_dir_all(output_dir).map_err(|err| PipelineError::io(output_dir, err))?;

    let mut written = Vec::new();
    for (descriptor, mut frame) in build_frames(log, tables)? {
        let path = output_dir.join(descriptor.file_name);
        write_csv(&mut frame, &path)?;
        info!(table = descriptor.name, rows = frame.height(), path = %path.display(), "wrote output table");
        written.push(WrittenTable {
            name: descriptor.name,
            path,
            rows: frame.height(),
        });
    }
    Ok(written)
}

pub fn write_manifest(manifest: &RunManifest, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(MANIFEST_FILE_NAME);
    let bytes = serde_json::to_vec_pretty(manifest)?;
    fs::write(&path, bytes).map_err(|err| PipelineError::io(&path, err))?;
    Ok(path)
}
