use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use slatrack_core::config::{LogFormat, PipelineConfig};
use slatrack_core::pipeline::{self, PipelineSummary};
use slatrack_core::{generator, sql};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "SLA and backlog reporting for stakeholder data requests", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./slatrack.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Enrich the request log and write the SLA tables and charts (default)
    Run,
    /// Write a synthetic request log to the configured input path
    Generate,
    /// Print the SQL schema and reference queries
    Sql,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config =
        PipelineConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    config
        .apply_env_overrides()
        .context("invalid SLATRACK_* environment override")?;

    init_tracing(config.run.log_format);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => handle_run(&config),
        Command::Generate => handle_generate(&config),
        Command::Sql => {
            handle_sql();
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn handle_run(config: &PipelineConfig) -> Result<()> {
    if !config.paths.input.exists() {
        anyhow::bail!(
            "input file {} not found; run `slatrack generate` to create a synthetic request log",
            config.paths.input.display()
        );
    }

    let summary = pipeline::run(config).context("pipeline run failed")?;
    print_summary(&summary);
    Ok(())
}

fn handle_generate(config: &PipelineConfig) -> Result<()> {
    let log = generator::generate_requests(&config.generator)
        .context("failed to generate synthetic requests")?;
    generator::write_requests(&log, &config.paths.input)
        .with_context(|| format!("failed to write {}", config.paths.input.display()))?;
    info!(
        rows = log.len(),
        seed = config.generator.seed,
        "synthetic request log ready"
    );
    println!(
        "Wrote {} synthetic requests to {}",
        log.len(),
        config.paths.input.display()
    );
    Ok(())
}

fn handle_sql() {
    println!("{}", sql::SCHEMA.trim_end());
    for query in sql::named_queries() {
        println!();
        println!("-- {}", query.name);
        println!("{}", query.sql);
    }
}

fn print_summary(summary: &PipelineSummary) {
    let sla = &summary.sla_summary;

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["As of".to_string(), summary.as_of.to_string()]);
    table.add_row(vec![
        "Total requests".to_string(),
        sla.total_requests.to_string(),
    ]);
    table.add_row(vec![
        "Closed requests".to_string(),
        sla.closed_requests.to_string(),
    ]);
    table.add_row(vec!["Open requests".to_string(), sla.open_requests.to_string()]);
    table.add_row(vec![
        "Breached requests".to_string(),
        sla.breached_requests.to_string(),
    ]);
    table.add_row(vec![
        "Breach rate (%)".to_string(),
        format!("{:.2}", sla.breach_rate_pct),
    ]);
    table.add_row(vec![
        "Avg turnaround (days)".to_string(),
        format!("{:.2}", sla.avg_turnaround_days),
    ]);
    if sla.malformed_requests > 0 {
        table.add_row(vec![
            "Excluded (data issues)".to_string(),
            sla.malformed_requests.to_string(),
        ]);
    }
    if sla.due_date_mismatches > 0 {
        table.add_row(vec![
            "Due dates off SLA policy".to_string(),
            sla.due_date_mismatches.to_string(),
        ]);
    }
    println!("{table}");

    println!("Outputs:");
    for written in &summary.tables {
        println!("  {} ({} rows)", written.path.display(), written.rows);
    }
    for chart in &summary.charts {
        println!("  {}", chart.display());
    }
    if let Some(script) = &summary.sql_script {
        println!("  {}", script.display());
    }
    println!("  {}", summary.manifest.display());
}
