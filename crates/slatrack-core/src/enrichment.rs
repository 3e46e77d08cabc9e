use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use slatrack_parser::{Request, RequestLog};
use tracing::{debug, warn};

use crate::calendar;
use crate::error::{PipelineError, Result};

/// Fixed-boundary classification of an open request's age in calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AgeBucket {
    UpToOneWeek,
    UpToTwoWeeks,
    UpToThirtyDays,
    UpToSixtyDays,
    OverSixtyDays,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 5] = [
        AgeBucket::UpToOneWeek,
        AgeBucket::UpToTwoWeeks,
        AgeBucket::UpToThirtyDays,
        AgeBucket::UpToSixtyDays,
        AgeBucket::OverSixtyDays,
    ];

    /// Negative ages (requests dated after the reporting date) have no bucket.
    pub fn classify(age_days: i64) -> Option<Self> {
        match age_days {
            i64::MIN..=-1 => None,
            0..=7 => Some(AgeBucket::UpToOneWeek),
            8..=14 => Some(AgeBucket::UpToTwoWeeks),
            15..=30 => Some(AgeBucket::UpToThirtyDays),
            31..=60 => Some(AgeBucket::UpToSixtyDays),
            _ => Some(AgeBucket::OverSixtyDays),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeBucket::UpToOneWeek => "0-7 days",
            AgeBucket::UpToTwoWeeks => "8-14 days",
            AgeBucket::UpToThirtyDays => "15-30 days",
            AgeBucket::UpToSixtyDays => "31-60 days",
            AgeBucket::OverSixtyDays => "60+ days",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DueDateSource {
    Input,
    Policy,
}

impl DueDateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DueDateSource::Input => "input",
            DueDateSource::Policy => "policy",
        }
    }
}

/// Row-level inconsistencies. Flagged rows stay in the enriched table but are
/// left out of every aggregate except the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataIssue {
    DoneWithoutCompletedDate,
    CompletedDateOnOpenRequest,
    CompletedBeforeRequest,
}

impl DataIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataIssue::DoneWithoutCompletedDate => "done_without_completed_date",
            DataIssue::CompletedDateOnOpenRequest => "completed_date_on_open_request",
            DataIssue::CompletedBeforeRequest => "completed_before_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRequest {
    pub request: Request,
    pub is_closed: bool,
    pub sla_target_bdays: Option<u32>,
    pub policy_due_date: Option<NaiveDate>,
    /// Input due date when supplied, otherwise the policy due date.
    pub due_date: NaiveDate,
    pub due_date_source: DueDateSource,
    pub due_date_matches_policy: Option<bool>,
    pub turnaround_days: Option<i64>,
    pub turnaround_business_days: Option<i64>,
    pub age_days: Option<i64>,
    pub age_bucket: Option<AgeBucket>,
    pub is_breached: bool,
    /// First day of the completion month.
    pub completion_month: Option<NaiveDate>,
    pub data_issue: Option<DataIssue>,
}

impl EnrichedRequest {
    pub fn counts_toward_metrics(&self) -> bool {
        self.data_issue.is_none()
    }

    pub fn is_countable_closed(&self) -> bool {
        self.is_closed && self.counts_toward_metrics()
    }

    pub fn is_countable_open(&self) -> bool {
        !self.is_closed && self.counts_toward_metrics()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnrichmentOptions {
    /// Compare supplied due dates against the SLA table. Mismatches are reported, never corrected.
    pub validate_due_dates: bool,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            validate_due_dates: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub total_rows: usize,
    pub due_date_mismatches: usize,
    pub policy_due_dates: usize,
    pub data_issues: usize,
    pub unbucketed_open_requests: usize,
}

/// The enriched snapshot every aggregate is computed from.
#[derive(Debug, Clone)]
pub struct EnrichedLog {
    pub as_of: NaiveDate,
    pub rows: Vec<EnrichedRequest>,
    pub report: EnrichmentReport,
}

impl EnrichedLog {
    pub fn countable(&self) -> impl Iterator<Item = &EnrichedRequest> {
        self.rows.iter().filter(|row| row.counts_toward_metrics())
    }
}

/// Derives every computed field for a single request as of `as_of`.
pub fn enrich_request(
    request: &Request,
    as_of: NaiveDate,
    options: EnrichmentOptions,
) -> Result<EnrichedRequest> {
    let priority = request.priority_level();
    let sla_target_bdays = priority.map(|p| p.sla_business_days());
    let policy_due_date = priority.map(|p| calendar::policy_due_date(request.request_date, p));

    let (due_date, due_date_source) = match (request.due_date, policy_due_date) {
        (Some(input), _) => (input, DueDateSource::Input),
        (None, Some(policy)) => (policy, DueDateSource::Policy),
        (None, None) => {
            return Err(PipelineError::MissingDueDate {
                request_id: request.request_id.clone(),
                priority: request.priority.clone(),
            })
        }
    };

    let due_date_matches_policy = if options.validate_due_dates {
        policy_due_date.map(|policy| policy == due_date)
    } else {
        None
    };

    let is_closed = request.is_done();
    let completed = if is_closed { request.completed_date } else { None };

    let data_issue = match (is_closed, request.completed_date) {
        (true, None) => Some(DataIssue::DoneWithoutCompletedDate),
        (false, Some(_)) => Some(DataIssue::CompletedDateOnOpenRequest),
        (true, Some(done)) if done < request.request_date => {
            Some(DataIssue::CompletedBeforeRequest)
        }
        _ => None,
    };

    let turnaround_days = completed.map(|done| (done - request.request_date).num_days());
    let turnaround_business_days =
        completed.map(|done| calendar::business_days_between(request.request_date, done));

    let age_days = if is_closed {
        None
    } else {
        Some((as_of - request.request_date).num_days())
    };
    let age_bucket = age_days.and_then(AgeBucket::classify);

    let is_breached = completed.is_some_and(|done| done > due_date);
    let completion_month = completed.and_then(|done| done.with_day(1));

    Ok(EnrichedRequest {
        request: request.clone(),
        is_closed,
        sla_target_bdays,
        policy_due_date,
        due_date,
        due_date_source,
        due_date_matches_policy,
        turnaround_days,
        turnaround_business_days,
        age_days,
        age_bucket,
        is_breached,
        completion_month,
        data_issue,
    })
}

/// Enriches the whole log. The result is held immutable for the rest of the run.
pub fn enrich_requests(
    log: &RequestLog,
    as_of: NaiveDate,
    options: EnrichmentOptions,
) -> Result<EnrichedLog> {
    let mut rows = Vec::with_capacity(log.len());
    let mut report = EnrichmentReport {
        total_rows: log.len(),
        ..EnrichmentReport::default()
    };

    for request in log.iter() {
        let enriched = enrich_request(request, as_of, options)?;

        if enriched.due_date_matches_policy == Some(false) {
            report.due_date_mismatches += 1;
            warn!(
                request_id = %request.request_id,
                priority = %request.priority,
                due_date = %enriched.due_date,
                policy_due_date = ?enriched.policy_due_date,
                "due date does not match SLA policy; keeping input value"
            );
        }
        if enriched.due_date_source == DueDateSource::Policy {
            report.policy_due_dates += 1;
            debug!(request_id = %request.request_id, "due date derived from SLA policy");
        }
        if let Some(issue) = enriched.data_issue {
            report.data_issues += 1;
            warn!(
                request_id = %request.request_id,
                issue = issue.as_str(),
                "request excluded from aggregates"
            );
        }
        if enriched.is_countable_open() && enriched.age_bucket.is_none() {
            report.unbucketed_open_requests += 1;
            warn!(
                request_id = %request.request_id,
                request_date = %request.request_date,
                %as_of,
                "open request dated after the reporting date has no age bucket"
            );
        }

        rows.push(enriched);
    }

    Ok(EnrichedLog {
        as_of,
        rows,
        report,
    })
}
