use csv::StringRecord;

use crate::errors::ParserError;

pub const REQUEST_ID: &str = "request_id";
pub const REQUEST_DATE: &str = "request_date";
pub const REQUESTER_TEAM: &str = "requester_team";
pub const REQUEST_TYPE: &str = "request_type";
pub const PRIORITY: &str = "priority";
pub const CHANNEL: &str = "channel";
pub const DUE_DATE: &str = "due_date";
pub const STATUS: &str = "status";
pub const COMPLETED_DATE: &str = "completed_date";
pub const ESTIMATED_HOURS: &str = "estimated_hours";
pub const ACTUAL_HOURS: &str = "actual_hours";

/// Column contract of the `requests` table, in canonical order.
pub const REQUEST_COLUMNS: [&str; 11] = [
    REQUEST_ID,
    REQUEST_DATE,
    REQUESTER_TEAM,
    REQUEST_TYPE,
    PRIORITY,
    CHANNEL,
    DUE_DATE,
    STATUS,
    COMPLETED_DATE,
    ESTIMATED_HOURS,
    ACTUAL_HOURS,
];

/// Position of each contract column inside a particular file's header.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnIndex {
    pub request_id: usize,
    pub request_date: usize,
    pub requester_team: usize,
    pub request_type: usize,
    pub priority: usize,
    pub channel: usize,
    pub due_date: usize,
    pub status: usize,
    pub completed_date: usize,
    pub estimated_hours: usize,
    pub actual_hours: usize,
}

impl ColumnIndex {
    /// Header names are matched trimmed and case-insensitively; extra columns are ignored.
    pub fn resolve(header: &StringRecord) -> Result<Self, ParserError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(name))
        };

        let mut positions = [0usize; REQUEST_COLUMNS.len()];
        let mut missing = Vec::new();
        for (slot, name) in REQUEST_COLUMNS.iter().enumerate() {
            match find(name) {
                Some(position) => positions[slot] = position,
                None => missing.push(*name),
            }
        }

        if !missing.is_empty() {
            return Err(ParserError::MissingColumns { missing });
        }

        Ok(Self {
            request_id: positions[0],
            request_date: positions[1],
            requester_team: positions[2],
            request_type: positions[3],
            priority: positions[4],
            channel: positions[5],
            due_date: positions[6],
            status: positions[7],
            completed_date: positions[8],
            estimated_hours: positions[9],
            actual_hours: positions[10],
        })
    }
}
