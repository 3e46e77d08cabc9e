use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use slatrack_parser::Priority;

use crate::enrichment::{AgeBucket, EnrichedLog, EnrichedRequest};

/// Percentage of `numerator` over `denominator`, rounded to 2 decimals. Zero when the
/// denominator is zero.
pub fn rate_pct(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round2(numerator as f64 / denominator as f64 * 100.0)
}

/// Mean rounded to 2 decimals; zero for an empty set.
pub fn mean(sum: i64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round2(sum as f64 / count as f64)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaSummary {
    pub total_requests: usize,
    pub closed_requests: usize,
    pub open_requests: usize,
    pub breached_requests: usize,
    pub breach_rate_pct: f64,
    pub avg_turnaround_days: f64,
    pub malformed_requests: usize,
    pub due_date_mismatches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSlaMetric {
    pub requester_team: String,
    pub closed_requests: usize,
    pub breached_requests: usize,
    pub breach_rate_pct: f64,
    pub avg_turnaround_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacklogBucket {
    pub requester_team: String,
    pub age_bucket: AgeBucket,
    pub open_requests: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBreachRate {
    /// First day of the completion month.
    pub completion_month: NaiveDate,
    pub closed_requests: usize,
    pub breached_requests: usize,
    pub breach_rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityTurnaround {
    pub priority: String,
    pub closed_requests: usize,
    pub avg_turnaround_days: f64,
}

/// All aggregate views for one run, computed from a single enriched snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricTables {
    pub sla_summary: SlaSummary,
    pub team_sla_metrics: Vec<TeamSlaMetric>,
    pub backlog_age_buckets: Vec<BacklogBucket>,
    pub monthly_breach_rate: Vec<MonthlyBreachRate>,
    pub priority_turnaround: Vec<PriorityTurnaround>,
}

pub fn compute_all(log: &EnrichedLog) -> MetricTables {
    MetricTables {
        sla_summary: sla_summary(log),
        team_sla_metrics: team_sla_metrics(log),
        backlog_age_buckets: backlog_age_buckets(log),
        monthly_breach_rate: monthly_breach_rate(log),
        priority_turnaround: priority_turnaround(log),
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ClosedAccumulator {
    closed: usize,
    breached: usize,
    turnaround_sum: i64,
}

impl ClosedAccumulator {
    fn push(&mut self, row: &EnrichedRequest) {
        self.closed += 1;
        if row.is_breached {
            self.breached += 1;
        }
        self.turnaround_sum += row.turnaround_days.unwrap_or(0);
    }

    fn breach_rate_pct(&self) -> f64 {
        rate_pct(self.breached, self.closed)
    }

    fn avg_turnaround_days(&self) -> f64 {
        mean(self.turnaround_sum, self.closed)
    }
}

pub fn sla_summary(log: &EnrichedLog) -> SlaSummary {
    let mut closed = ClosedAccumulator::default();
    let mut open_requests = 0usize;

    for row in log.countable() {
        if row.is_closed {
            closed.push(row);
        } else {
            open_requests += 1;
        }
    }

    SlaSummary {
        total_requests: log.rows.len(),
        closed_requests: closed.closed,
        open_requests,
        breached_requests: closed.breached,
        breach_rate_pct: closed.breach_rate_pct(),
        avg_turnaround_days: closed.avg_turnaround_days(),
        malformed_requests: log.report.data_issues,
        due_date_mismatches: log.report.due_date_mismatches,
    }
}

/// Per-team closure metrics, busiest team first.
pub fn team_sla_metrics(log: &EnrichedLog) -> Vec<TeamSlaMetric> {
    let mut per_team: BTreeMap<&str, ClosedAccumulator> = BTreeMap::new();
    for row in log.countable().filter(|row| row.is_closed) {
        per_team
            .entry(row.request.requester_team.as_str())
            .or_default()
            .push(row);
    }

    let mut metrics: Vec<TeamSlaMetric> = per_team
        .into_iter()
        .map(|(team, acc)| TeamSlaMetric {
            requester_team: team.to_string(),
            closed_requests: acc.closed,
            breached_requests: acc.breached,
            breach_rate_pct: acc.breach_rate_pct(),
            avg_turnaround_days: acc.avg_turnaround_days(),
        })
        .collect();

    // stable sort keeps the alphabetical order for ties
    metrics.sort_by(|a, b| b.closed_requests.cmp(&a.closed_requests));
    metrics
}

/// Open-request counts per team and age bucket, zero-filled across all buckets.
pub fn backlog_age_buckets(log: &EnrichedLog) -> Vec<BacklogBucket> {
    let mut per_team: BTreeMap<&str, [usize; AgeBucket::ALL.len()]> = BTreeMap::new();
    for row in log.countable().filter(|row| !row.is_closed) {
        let Some(bucket) = row.age_bucket else {
            continue;
        };
        per_team
            .entry(row.request.requester_team.as_str())
            .or_default()[bucket.index()] += 1;
    }

    per_team
        .into_iter()
        .flat_map(|(team, counts)| {
            AgeBucket::ALL.into_iter().map(move |bucket| BacklogBucket {
                requester_team: team.to_string(),
                age_bucket: bucket,
                open_requests: counts[bucket.index()],
            })
        })
        .collect()
}

/// Breach rate per completion month, oldest month first.
pub fn monthly_breach_rate(log: &EnrichedLog) -> Vec<MonthlyBreachRate> {
    let mut per_month: BTreeMap<NaiveDate, ClosedAccumulator> = BTreeMap::new();
    for row in log.countable().filter(|row| row.is_closed) {
        if let Some(month) = row.completion_month {
            per_month.entry(month).or_default().push(row);
        }
    }

    per_month
        .into_iter()
        .map(|(month, acc)| MonthlyBreachRate {
            completion_month: month,
            closed_requests: acc.closed,
            breached_requests: acc.breached,
            breach_rate_pct: acc.breach_rate_pct(),
        })
        .collect()
}

/// Average turnaround per priority: known tiers in SLA order, then any other labels alphabetically.
pub fn priority_turnaround(log: &EnrichedLog) -> Vec<PriorityTurnaround> {
    let mut known: HashMap<Priority, ClosedAccumulator> = HashMap::new();
    let mut other: BTreeMap<&str, ClosedAccumulator> = BTreeMap::new();

    for row in log.countable().filter(|row| row.is_closed) {
        match row.request.priority_level() {
            Some(priority) => known.entry(priority).or_default().push(row),
            None => other
                .entry(row.request.priority.as_str())
                .or_default()
                .push(row),
        }
    }

    let known_rows = Priority::ALL.iter().filter_map(|priority| {
        known.get(priority).map(|acc| PriorityTurnaround {
            priority: priority.as_str().to_string(),
            closed_requests: acc.closed,
            avg_turnaround_days: acc.avg_turnaround_days(),
        })
    });
    let other_rows = other.into_iter().map(|(label, acc)| PriorityTurnaround {
        priority: label.to_string(),
        closed_requests: acc.closed,
        avg_turnaround_days: acc.avg_turnaround_days(),
    });

    known_rows.chain(other_rows).collect()
}
