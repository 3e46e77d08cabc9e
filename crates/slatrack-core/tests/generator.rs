use std::collections::HashSet;
use std::fs;

use anyhow::Result;
use chrono::NaiveDate;
use slatrack_core::calendar::policy_due_date;
use slatrack_core::config::GeneratorConfig;
use slatrack_core::error::PipelineError;
use slatrack_core::generator::{generate_requests, request_id, write_requests};
use slatrack_parser::{load_requests, REQUEST_COLUMNS};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn request_ids_are_zero_padded() {
    assert_eq!(request_id(1), "REQ-00001");
    assert_eq!(request_id(240), "REQ-00240");
}

#[test]
fn same_seed_same_log() -> Result<()> {
    let config = GeneratorConfig::default();
    let first = generate_requests(&config)?;
    let second = generate_requests(&config)?;
    assert_eq!(first, second);

    let other = generate_requests(&GeneratorConfig {
        seed: config.seed + 1,
        ..config.clone()
    })?;
    assert_ne!(first, other);
    Ok(())
}

#[test]
fn generated_requests_honor_the_input_contract() -> Result<()> {
    let config = GeneratorConfig::default();
    let log = generate_requests(&config)?;
    assert_eq!(log.len(), config.count);

    let mut ids = HashSet::new();
    for request in log.iter() {
        assert!(ids.insert(request.request_id.clone()));
        assert!(request.request_date >= config.start && request.request_date <= config.end);

        let priority = request.priority_level().expect("generated priority is a known tier");
        assert_eq!(
            request.due_date,
            Some(policy_due_date(request.request_date, priority))
        );

        match request.completed_date {
            Some(done) => {
                assert!(request.is_done());
                assert!(done >= request.request_date);
                assert!(done <= config.end);
                assert!(request.actual_hours.is_some());
            }
            None => {
                assert!(!request.is_done());
                assert!(request.actual_hours.is_none());
            }
        }
        assert!(request.estimated_hours.is_some_and(|h| h >= 0.5));
    }

    let closed = log.iter().filter(|r| r.is_done()).count();
    assert!(closed > 0 && closed < log.len());
    Ok(())
}

#[test]
fn end_before_start_is_rejected() {
    let config = GeneratorConfig {
        start: date(2024, 6, 1),
        end: date(2024, 1, 1),
        ..GeneratorConfig::default()
    };
    assert!(matches!(
        generate_requests(&config),
        Err(PipelineError::Config(_))
    ));
}

#[test]
fn single_day_window_is_allowed() -> Result<()> {
    let config = GeneratorConfig {
        count: 5,
        start: date(2024, 3, 1),
        end: date(2024, 3, 1),
        ..GeneratorConfig::default()
    };
    let log = generate_requests(&config)?;
    assert_eq!(log.len(), 5);
    assert!(log.iter().all(|r| r.request_date == date(2024, 3, 1)));
    Ok(())
}

#[test]
fn written_log_loads_back_unchanged() -> Result<()> {
    let config = GeneratorConfig {
        count: 25,
        ..GeneratorConfig::default()
    };
    let log = generate_requests(&config)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("data/raw/requests.csv");
    write_requests(&log, &path)?;

    let content = fs::read_to_string(&path)?;
    assert_eq!(content.lines().next(), Some(REQUEST_COLUMNS.join(",").as_str()));

    let loaded = load_requests(&path)?;
    assert_eq!(loaded.log, log);
    Ok(())
}

#[test]
fn zero_count_writes_only_the_header() -> Result<()> {
    let config = GeneratorConfig {
        count: 0,
        ..GeneratorConfig::default()
    };
    let log = generate_requests(&config)?;
    assert!(log.is_empty());

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("requests.csv");
    write_requests(&log, &path)?;
    let content = fs::read_to_string(&path)?;
    assert_eq!(content.lines().count(), 1);
    Ok(())
}
