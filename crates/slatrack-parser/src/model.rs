use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// SLA priority tiers. The raw priority string on [`Request`] is kept verbatim;
/// this enum only exists for the SLA lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Reporting order, least to most urgent.
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }

    /// SLA target in business days (Mon-Fri).
    pub fn sla_business_days(&self) -> u32 {
        match self {
            Priority::Urgent => 2,
            Priority::High => 5,
            Priority::Medium => 10,
            Priority::Low => 15,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Priority {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Status value that marks a request as closed.
pub const DONE_STATUS: &str = "Done";

/// One row of the request log, exactly as supplied by the input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: String,
    pub request_date: NaiveDate,
    pub requester_team: String,
    pub request_type: String,
    pub priority: String,
    pub channel: String,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub completed_date: Option<NaiveDate>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
}

impl Request {
    pub fn priority_level(&self) -> Option<Priority> {
        Priority::try_from(self.priority.as_str()).ok()
    }

    pub fn is_done(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(DONE_STATUS)
    }
}

/// An ordered, immutable snapshot of the request table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestLog {
    pub requests: Vec<Request>,
}

impl RequestLog {
    pub fn new(requests: Vec<Request>) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.requests.iter()
    }
}

/// A log read from disk together with the BLAKE3 hash of the raw bytes.
#[derive(Debug, Clone)]
pub struct LoadedRequestLog {
    pub log: RequestLog,
    pub content_hash: String,
}
