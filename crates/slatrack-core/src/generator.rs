//! Deterministic synthetic request log.
//!
//! All randomness comes from a single PCG stream seeded from the configured seed, so the
//! same configuration always yields a byte-identical file.

use std::f64::consts::PI;
use std::fs::{self, File};
use std::path::Path;

use chrono::Days;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use slatrack_parser::{Priority, Request, RequestLog, DONE_STATUS, REQUEST_COLUMNS};
use tracing::info;

use crate::calendar;
use crate::config::GeneratorConfig;
use crate::error::{PipelineError, Result};

const TEAMS: [(&str, u32); 7] = [
    ("Operations", 18),
    ("Finance", 14),
    ("Marketing", 16),
    ("Sales", 12),
    ("HR", 8),
    ("Customer Support", 18),
    ("Training", 14),
];

/// Request types with their draw weight and mean estimated hours.
const REQUEST_TYPES: [(&str, u32, f64); 7] = [
    ("KPI Report", 20, 3.0),
    ("Data Extract", 18, 1.5),
    ("Dashboard Update", 16, 4.0),
    ("Data Quality Issue", 14, 2.5),
    ("One-off Analysis", 12, 5.0),
    ("Automation Request", 10, 6.0),
    ("Access/Permissions", 10, 1.0),
];

const PRIORITIES: [(Priority, u32); 4] = [
    (Priority::Low, 30),
    (Priority::Medium, 45),
    (Priority::High, 18),
    (Priority::Urgent, 7),
];

const CHANNELS: [&str; 4] = ["Email", "Teams", "Jira", "In person"];
const OPEN_STATUSES: [&str; 2] = ["Open", "In Progress"];

/// Mean business days to completion by priority; deliberately a little slower than the SLA.
fn completion_base_days(priority: Priority) -> f64 {
    match priority {
        Priority::Urgent => 3.0,
        Priority::High => 7.0,
        Priority::Medium => 12.0,
        Priority::Low => 18.0,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn request_id(index: usize) -> String {
    format!("REQ-{index:05}")
}

struct RequestSampler {
    rng: Pcg64Mcg,
    teams: WeightedIndex<u32>,
    request_types: WeightedIndex<u32>,
    priorities: WeightedIndex<u32>,
}

impl RequestSampler {
    fn new(seed: u64) -> Result<Self> {
        let weights_error =
            |err: rand::distributions::WeightedError| PipelineError::Config(err.to_string());
        Ok(Self {
            rng: Pcg64Mcg::seed_from_u64(seed),
            teams: WeightedIndex::new(TEAMS.iter().map(|(_, w)| *w)).map_err(weights_error)?,
            request_types: WeightedIndex::new(REQUEST_TYPES.iter().map(|(_, w, _)| *w))
                .map_err(weights_error)?,
            priorities: WeightedIndex::new(PRIORITIES.iter().map(|(_, w)| *w))
                .map_err(weights_error)?,
        })
    }

    fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }

    /// Box-Muller draw from N(mean, std_dev).
    fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = 1.0 - self.rng.gen::<f64>();
        let u2 = self.rng.gen::<f64>();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn sample(&mut self, index: usize, config: &GeneratorConfig) -> Request {
        let range_days = (config.end - config.start).num_days().max(0) as u64;
        let offset = self.rng.gen_range(0..=range_days);
        let request_date = config
            .start
            .checked_add_days(Days::new(offset))
            .unwrap_or(config.end);

        let team = TEAMS[self.teams.sample(&mut self.rng)].0;
        let (request_type, _, mean_hours) = REQUEST_TYPES[self.request_types.sample(&mut self.rng)];
        let priority = PRIORITIES[self.priorities.sample(&mut self.rng)].0;

        let due_date = calendar::policy_due_date(request_date, priority);

        let age_days = (config.end - request_date).num_days() as f64;
        let close_probability = (0.25 + age_days / 500.0).min(0.95);

        let (status, completed_date) = if self.chance(close_probability) {
            let drawn = self.normal(completion_base_days(priority), 3.0);
            // truncate toward zero, then at least one business day
            let business_days = (drawn.trunc() as i64).max(1);
            let completed = calendar::add_business_days(request_date, business_days);
            (DONE_STATUS, Some(completed.min(config.end)))
        } else {
            (self.pick(&OPEN_STATUSES), None)
        };

        let estimated_hours = round1(self.normal(mean_hours, 1.2)).max(0.5);
        let actual_hours = completed_date
            .map(|_| round1(estimated_hours * self.normal(1.05, 0.25)).max(0.25));

        let channel = self.pick(&CHANNELS);

        Request {
            request_id: request_id(index),
            request_date,
            requester_team: team.to_string(),
            request_type: request_type.to_string(),
            priority: priority.as_str().to_string(),
            channel: channel.to_string(),
            due_date: Some(due_date),
            status: status.to_string(),
            completed_date,
            estimated_hours: Some(estimated_hours),
            actual_hours,
        }
    }
}

/// Builds `config.count` synthetic requests dated within `[config.start, config.end]`.
pub fn generate_requests(config: &GeneratorConfig) -> Result<RequestLog> {
    if config.end < config.start {
        return Err(PipelineError::Config(format!(
            "generator end date {} is before start date {}",
            config.end, config.start
        )));
    }

    let mut sampler = RequestSampler::new(config.seed)?;
    let requests = (1..=config.count)
        .map(|index| sampler.sample(index, config))
        .collect();
    Ok(RequestLog::new(requests))
}

/// Writes a request log in the input column contract, replacing any existing file.
pub fn write_requests(log: &RequestLog, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
    }
    let file = File::create(path).map_err(|err| PipelineError::io(path, err))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(REQUEST_COLUMNS)?;
    for request in log.iter() {
        writer.serialize(request)?;
    }
    writer.flush().map_err(|err| PipelineError::io(path, err))?;
    info!(rows = log.len(), path = %path.display(), "wrote synthetic request log");
    Ok(())
}
