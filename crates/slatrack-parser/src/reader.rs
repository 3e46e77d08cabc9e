use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::errors::ParserError;
use crate::model::{LoadedRequestLog, Request, RequestLog};
use crate::schema::{self, ColumnIndex};

/// Reads and parses a request log from disk, hashing the raw bytes for provenance.
pub fn load_requests(path: &Path) -> Result<LoadedRequestLog, ParserError> {
    let bytes = fs::read(path).map_err(|source| ParserError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let content_hash = blake3::hash(&bytes).to_hex().to_string();
    let content = std::str::from_utf8(&bytes).map_err(|err| {
        let valid = &bytes[..err.valid_up_to()];
        ParserError::InvalidEncoding {
            line_index: valid.iter().filter(|&&b| b == b'\n').count() + 1,
        }
    })?;
    let log = parse_requests(content)?;
    Ok(LoadedRequestLog { log, content_hash })
}

/// Parses CSV text holding the `requests` table.
pub fn parse_requests(content: &str) -> Result<RequestLog, ParserError> {
    let mut reader = reader_builder().from_reader(content.as_bytes());
    let mut records = reader.records();

    let header = records
        .next()
        .ok_or(ParserError::MissingHeader)?
        .map_err(|source| ParserError::Csv { source })?;
    let columns = ColumnIndex::resolve(&header)?;

    let mut requests = Vec::new();
    let mut seen_ids: HashMap<String, usize> = HashMap::new();

    for (row_idx, record) in records.enumerate() {
        let record = record.map_err(|source| ParserError::Csv { source })?;
        // physical line where the record starts; csv skips blank lines silently
        let line_index = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(row_idx + 2);

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let request = parse_row(&record, &columns, line_index)?;

        if let Some(&first_line) = seen_ids.get(&request.request_id) {
            return Err(ParserError::DuplicateRequestId {
                line_index,
                first_line,
                request_id: request.request_id,
            });
        }
        seen_ids.insert(request.request_id.clone(), line_index);
        requests.push(request);
    }

    Ok(RequestLog::new(requests))
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(false).flexible(true);
    builder
}

fn parse_row(
    record: &StringRecord,
    columns: &ColumnIndex,
    line_index: usize,
) -> Result<Request, ParserError> {
    let field = |idx: usize| record.get(idx).unwrap_or("").trim();

    let request_id = field(columns.request_id);
    if request_id.is_empty() {
        return Err(ParserError::MissingValue {
            line_index,
            column: schema::REQUEST_ID,
        });
    }

    let request_date =
        parse_optional_date(field(columns.request_date), line_index, schema::REQUEST_DATE)?
            .ok_or(ParserError::MissingValue {
                line_index,
                column: schema::REQUEST_DATE,
            })?;

    Ok(Request {
        request_id: request_id.to_string(),
        request_date,
        requester_team: field(columns.requester_team).to_string(),
        request_type: field(columns.request_type).to_string(),
        priority: field(columns.priority).to_string(),
        channel: field(columns.channel).to_string(),
        due_date: parse_optional_date(field(columns.due_date), line_index, schema::DUE_DATE)?,
        status: field(columns.status).to_string(),
        completed_date: parse_optional_date(
            field(columns.completed_date),
            line_index,
            schema::COMPLETED_DATE,
        )?,
        estimated_hours: parse_optional_f64(
            field(columns.estimated_hours),
            line_index,
            schema::ESTIMATED_HOURS,
        )?,
        actual_hours: parse_optional_f64(
            field(columns.actual_hours),
            line_index,
            schema::ACTUAL_HOURS,
        )?,
    })
}

fn is_null(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("nat")
}

pub(crate) fn parse_optional_date(
    value: &str,
    line_index: usize,
    column: &'static str,
) -> Result<Option<NaiveDate>, ParserError> {
    static DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    if is_null(value) {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(Some(dt.date()));
        }
    }

    Err(ParserError::InvalidDate {
        line_index,
        column,
        value: value.to_string(),
    })
}

pub(crate) fn parse_optional_f64(
    value: &str,
    line_index: usize,
    column: &'static str,
) -> Result<Option<f64>, ParserError> {
    if is_null(value) {
        return Ok(None);
    }

    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(Some(parsed)),
        _ => Err(ParserError::InvalidNumber {
            line_index,
            column,
            value: value.to_string(),
        }),
    }
}
