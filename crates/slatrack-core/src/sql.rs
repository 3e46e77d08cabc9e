//! SQL rendition of the request table: schema, the reference aggregate queries, and a
//! load script so the same data can be queried from a database.

use chrono::NaiveDate;

use crate::enrichment::EnrichedLog;

pub const SCHEMA: &str = include_str!("../../../sql/schema.sql");
pub const QUERIES: &str = include_str!("../../../sql/queries.sql");

pub const LOAD_SCRIPT_FILE_NAME: &str = "requests_load.sql";

const NAME_MARKER: &str = "-- name:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    pub name: String,
    pub sql: String,
}

/// Splits `queries.sql` on its `-- name: <id>` markers.
pub fn named_queries() -> Vec<NamedQuery> {
    parse_named_queries(QUERIES)
}

pub fn parse_named_queries(source: &str) -> Vec<NamedQuery> {
    let mut queries = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in source.lines() {
        if let Some(name) = line.trim().strip_prefix(NAME_MARKER) {
            if let Some((name, body)) = current.take() {
                queries.push(finish_query(name, &body));
            }
            current = Some((name.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((name, body)) = current {
        queries.push(finish_query(name, &body));
    }

    queries
}

fn finish_query(name: String, body: &[&str]) -> NamedQuery {
    NamedQuery {
        name,
        sql: body.join("\n").trim().to_string(),
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn date_literal(date: Option<NaiveDate>) -> String {
    date.map(|d| format!("DATE '{}'", d.format("%Y-%m-%d")))
        .unwrap_or_else(|| "NULL".to_string())
}

fn number_literal(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "NULL".to_string())
}

/// Schema plus one INSERT per request inside a single transaction. Due dates are the
/// effective ones, so rows whose input lacked a due date carry the SLA policy date.
pub fn render_load_script(log: &EnrichedLog) -> String {
    let mut script = String::new();
    script.push_str("BEGIN;\n\n");
    script.push_str(SCHEMA.trim_end());
    script.push_str("\n\n");

    for row in &log.rows {
        let request = &row.request;
        script.push_str(&format!(
            "INSERT INTO requests (request_id, request_date, requester_team, request_type, priority, channel, due_date, status, completed_date, estimated_hours, actual_hours) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});\n",
            quote(&request.request_id),
            date_literal(Some(request.request_date)),
            quote(&request.requester_team),
            quote(&request.request_type),
            quote(&request.priority),
            quote(&request.channel),
            date_literal(Some(row.due_date)),
            quote(&request.status),
            date_literal(request.completed_date),
            number_literal(request.estimated_hours),
            number_literal(request.actual_hours),
        ));
    }

    script.push_str("\nCOMMIT;\n");
    script
}
