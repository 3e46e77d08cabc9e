use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::errors::ParserError;
use crate::model::Priority;
use crate::{load_requests, parse_requests, REQUEST_COLUMNS};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn fixture(name: &str) -> String {
    let full_path = fixture_path(name);
    fs::read_to_string(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

const HEADER: &str = "request_id,request_date,requester_team,request_type,priority,channel,due_date,status,completed_date,estimated_hours,actual_hours";

#[test]
fn parses_small_request_log() {
    let log = parse_requests(&fixture("requests_small.csv")).expect("fixture parse failed");

    assert_eq!(log.len(), 8);

    let first = &log.requests[0];
    assert_eq!(first.request_id, "REQ-00001");
    assert_eq!(first.request_date, date(2024, 1, 1));
    assert_eq!(first.due_date, Some(date(2024, 1, 3)));
    assert_eq!(first.completed_date, Some(date(2024, 1, 5)));
    assert_eq!(first.priority_level(), Some(Priority::Urgent));
    assert_eq!(first.estimated_hours, Some(3.0));
    assert_eq!(first.actual_hours, Some(3.5));
    assert!(first.is_done());

    let open = &log.requests[3];
    assert_eq!(open.status, "Open");
    assert!(!open.is_done());
    assert_eq!(open.completed_date, None);
    assert_eq!(open.actual_hours, None);
}

#[test]
fn load_requests_hashes_input_bytes() {
    let path = fixture_path("requests_small.csv");
    let loaded = load_requests(&path).expect("load failed");
    let expected = blake3::hash(&fs::read(&path).expect("read fixture"))
        .to_hex()
        .to_string();

    assert_eq!(loaded.content_hash, expected);
    assert_eq!(loaded.log.len(), 8);
}

#[test]
fn load_requests_reports_missing_file() {
    let err = load_requests(&fixture_path("does_not_exist.csv")).unwrap_err();
    assert!(matches!(err, ParserError::Io { .. }));
}

#[test]
fn columns_are_matched_by_name_in_any_order() {
    let content = "\
Status, REQUEST_ID ,priority,request_date,due_date,completed_date,requester_team,request_type,channel,estimated_hours,actual_hours,notes
Done,REQ-1,High,2024-03-04,2024-03-11,2024-03-08,HR,Data Extract,Email,1.0,1.5,ignored
";
    let log = parse_requests(content).expect("reordered header should parse");
    let request = &log.requests[0];

    assert_eq!(request.request_id, "REQ-1");
    assert_eq!(request.requester_team, "HR");
    assert_eq!(request.completed_date, Some(date(2024, 3, 8)));
}

#[test]
fn missing_columns_are_all_reported() {
    let content = "request_id,request_date,status\nREQ-1,2024-01-01,Open\n";
    let err = parse_requests(content).unwrap_err();

    match err {
        ParserError::MissingColumns { missing } => {
            let expected: Vec<&str> = REQUEST_COLUMNS
                .iter()
                .copied()
                .filter(|col| !["request_id", "request_date", "status"].contains(col))
                .collect();
            assert_eq!(missing, expected);
        }
        other => panic!("expected MissingColumns, got {other:?}"),
    }
}

#[test]
fn empty_input_is_missing_header() {
    let err = parse_requests("").unwrap_err();
    assert!(matches!(err, ParserError::MissingHeader));
}

#[test]
fn header_only_is_an_empty_log() {
    let log = parse_requests(&format!("{HEADER}\n")).expect("header-only parse failed");
    assert!(log.is_empty());
}

#[test]
fn unparsable_date_reports_line_and_column() {
    let content = format!(
        "{HEADER}\nREQ-1,2024-01-01,HR,KPI Report,Low,Email,2024-01-22,Open,,1.0,\nREQ-2,2024-13-40,HR,KPI Report,Low,Email,2024-01-22,Open,,1.0,\n"
    );
    let err = parse_requests(&content).unwrap_err();

    match err {
        ParserError::InvalidDate {
            line_index,
            column,
            value,
        } => {
            assert_eq!(line_index, 3);
            assert_eq!(column, "request_date");
            assert_eq!(value, "2024-13-40");
        }
        other => panic!("expected InvalidDate, got {other:?}"),
    }
}

#[test]
fn datetime_values_keep_their_date_part() {
    let content = format!(
        "{HEADER}\nREQ-1,2024-01-01 00:00:00,HR,KPI Report,Urgent,Email,2024-01-03T00:00:00,Done,2024-01-02 14:30:00,nan,NaN\n"
    );
    let log = parse_requests(&content).expect("datetime parse failed");
    let request = &log.requests[0];

    assert_eq!(request.request_date, date(2024, 1, 1));
    assert_eq!(request.due_date, Some(date(2024, 1, 3)));
    assert_eq!(request.completed_date, Some(date(2024, 1, 2)));
    assert_eq!(request.estimated_hours, None);
    assert_eq!(request.actual_hours, None);
}

#[test]
fn empty_due_date_is_left_for_enrichment() {
    let content = format!("{HEADER}\nREQ-1,2024-01-01,HR,KPI Report,Urgent,Email,,Open,,,\n");
    let log = parse_requests(&content).expect("parse failed");
    assert_eq!(log.requests[0].due_date, None);
}

#[test]
fn empty_request_date_is_rejected() {
    let content = format!("{HEADER}\nREQ-1,,HR,KPI Report,Urgent,Email,2024-01-03,Open,,,\n");
    let err = parse_requests(&content).unwrap_err();
    assert!(matches!(
        err,
        ParserError::MissingValue {
            line_index: 2,
            column: "request_date"
        }
    ));
}

#[test]
fn bad_hours_are_rejected() {
    let content =
        format!("{HEADER}\nREQ-1,2024-01-01,HR,KPI Report,Urgent,Email,2024-01-03,Open,,two,\n");
    let err = parse_requests(&content).unwrap_err();
    assert!(matches!(
        err,
        ParserError::InvalidNumber {
            column: "estimated_hours",
            ..
        }
    ));
}

#[test]
fn duplicate_request_ids_are_rejected() {
    let content = format!(
        "{HEADER}\nREQ-1,2024-01-01,HR,KPI Report,Low,Email,2024-01-22,Open,,1.0,\nREQ-1,2024-01-02,HR,KPI Report,Low,Email,2024-01-23,Open,,1.0,\n"
    );
    let err = parse_requests(&content).unwrap_err();

    match err {
        ParserError::DuplicateRequestId {
            line_index,
            first_line,
            request_id,
        } => {
            assert_eq!(line_index, 3);
            assert_eq!(first_line, 2);
            assert_eq!(request_id, "REQ-1");
        }
        other => panic!("expected DuplicateRequestId, got {other:?}"),
    }
}

#[test]
fn blank_lines_are_skipped() {
    let content = format!(
        "{HEADER}\nREQ-1,2024-01-01,HR,KPI Report,Low,Email,2024-01-22,Open,,1.0,\n,,,,,,,,,,\n"
    );
    let log = parse_requests(&content).expect("parse failed");
    assert_eq!(log.len(), 1);
}

#[test]
fn priority_lookup_is_case_insensitive() {
    assert_eq!(Priority::try_from(" urgent "), Ok(Priority::Urgent));
    assert_eq!(Priority::try_from("LOW"), Ok(Priority::Low));
    assert!(Priority::try_from("Critical").is_err());
    assert_eq!(Priority::Medium.sla_business_days(), 10);
}

#[test]
fn error_lines_count_skipped_blank_lines() {
    let content = format!(
        "{HEADER}\nREQ-1,2024-01-01,HR,KPI Report,Low,Email,2024-01-22,Open,,1.0,\n\n\nREQ-2,2024-99-01,HR,KPI Report,Low,Email,2024-01-22,Open,,1.0,\n"
    );
    let err = parse_requests(&content).unwrap_err();

    match err {
        ParserError::InvalidDate {
            line_index, column, ..
        } => {
            assert_eq!(line_index, 5);
            assert_eq!(column, "request_date");
        }
        other => panic!("expected InvalidDate, got {other:?}"),
    }
}

#[test]
fn duplicate_ids_report_physical_lines() {
    let content = format!(
        "{HEADER}\nREQ-1,2024-01-01,HR,\"KPI\nReport\",Low,Email,2024-01-22,Open,,1.0,\n\nREQ-1,2024-01-02,HR,KPI Report,Low,Email,2024-01-23,Open,,1.0,\n"
    );
    let err = parse_requests(&content).unwrap_err();

    match err {
        ParserError::DuplicateRequestId {
            line_index,
            first_line,
            ..
        } => {
            assert_eq!(first_line, 2);
            assert_eq!(line_index, 5);
        }
        other => panic!("expected DuplicateRequestId, got {other:?}"),
    }
}

#[test]
fn invalid_utf8_aborts_the_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("requests.csv");
    let mut bytes = format!("{HEADER}\n").into_bytes();
    bytes.extend_from_slice(b"REQ-1,2024-01-01,HR,KPI Report,Low,Email,2024-01-22,Open,,1.0,\n");
    bytes.extend_from_slice(b"REQ-2,2024-01-02,Fin\xFFance,KPI Report,Low,Email,2024-01-23,Open,,1.0,\n");
    fs::write(&path, bytes).expect("write input");

    let err = load_requests(&path).unwrap_err();
    assert!(
        matches!(err, ParserError::InvalidEncoding { line_index: 3 }),
        "got {err:?}"
    );
}
