use std::fs;

use anyhow::Result;
use chrono::NaiveDate;
use slatrack_core::charts::{
    escape_xml, nice_ceiling, render_backlog_chart, render_breach_rate_chart,
    render_turnaround_chart, write_charts, BACKLOG_CHART, BREACH_RATE_CHART, TURNAROUND_CHART,
};
use slatrack_core::enrichment::AgeBucket;
use slatrack_core::metrics::{
    BacklogBucket, MetricTables, MonthlyBreachRate, PriorityTurnaround, SlaSummary,
};

fn month(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn empty_tables() -> MetricTables {
    MetricTables {
        sla_summary: SlaSummary {
            total_requests: 0,
            closed_requests: 0,
            open_requests: 0,
            breached_requests: 0,
            breach_rate_pct: 0.0,
            avg_turnaround_days: 0.0,
            malformed_requests: 0,
            due_date_mismatches: 0,
        },
        team_sla_metrics: Vec::new(),
        backlog_age_buckets: Vec::new(),
        monthly_breach_rate: Vec::new(),
        priority_turnaround: Vec::new(),
    }
}

fn assert_svg_document(svg: &str) {
    assert!(svg.starts_with("<?xml"));
    assert!(svg.contains("<svg"));
    assert!(svg.ends_with("</svg>\n"));
}

#[test]
fn nice_ceiling_rounds_to_readable_steps() {
    assert_eq!(nice_ceiling(0.0), 1.0);
    assert_eq!(nice_ceiling(-3.0), 1.0);
    assert_eq!(nice_ceiling(1.0), 1.0);
    assert_eq!(nice_ceiling(1.3), 2.0);
    assert_eq!(nice_ceiling(3.0), 5.0);
    assert_eq!(nice_ceiling(7.0), 10.0);
    assert_eq!(nice_ceiling(40.0), 50.0);
    assert_eq!(nice_ceiling(100.0), 100.0);
}

#[test]
fn labels_are_xml_escaped() {
    assert_eq!(
        escape_xml(r#"R&D <"ops">"#),
        "R&amp;D &lt;&quot;ops&quot;&gt;"
    );
}

#[test]
fn breach_rate_chart_plots_one_point_per_month() {
    let rows = vec![
        MonthlyBreachRate {
            completion_month: month(2024, 1),
            closed_requests: 2,
            breached_requests: 1,
            breach_rate_pct: 50.0,
        },
        MonthlyBreachRate {
            completion_month: month(2024, 2),
            closed_requests: 3,
            breached_requests: 1,
            breach_rate_pct: 33.33,
        },
    ];
    let svg = render_breach_rate_chart(&rows);

    assert_svg_document(&svg);
    assert!(svg.contains("<polyline"));
    assert_eq!(svg.matches("<circle").count(), 2);
    assert!(svg.contains("2024-01: 50.00%"));
    assert!(svg.contains("2024-02: 33.33%"));
}

#[test]
fn backlog_chart_stacks_non_empty_buckets() {
    let rows = vec![
        BacklogBucket {
            requester_team: "R&D".to_string(),
            age_bucket: AgeBucket::UpToOneWeek,
            open_requests: 2,
        },
        BacklogBucket {
            requester_team: "R&D".to_string(),
            age_bucket: AgeBucket::UpToTwoWeeks,
            open_requests: 0,
        },
        BacklogBucket {
            requester_team: "R&D".to_string(),
            age_bucket: AgeBucket::OverSixtyDays,
            open_requests: 1,
        },
    ];
    let svg = render_backlog_chart(&rows);

    assert_svg_document(&svg);
    assert!(svg.contains("<title>R&amp;D 0-7 days: 2</title>"));
    assert!(svg.contains("<title>R&amp;D 60+ days: 1</title>"));
    assert!(!svg.contains("8-14 days: 0"));
    assert!(!svg.contains("R&D"));
}

#[test]
fn turnaround_chart_draws_a_bar_per_priority() {
    let rows = vec![
        PriorityTurnaround {
            priority: "Low".to_string(),
            closed_requests: 1,
            avg_turnaround_days: 19.0,
        },
        PriorityTurnaround {
            priority: "Urgent".to_string(),
            closed_requests: 2,
            avg_turnaround_days: 3.5,
        },
    ];
    let svg = render_turnaround_chart(&rows);

    assert_svg_document(&svg);
    assert!(svg.contains("Low: 19.00 days"));
    assert!(svg.contains("Urgent: 3.50 days"));
}

#[test]
fn empty_tables_render_placeholders() {
    for svg in [
        render_breach_rate_chart(&[]),
        render_backlog_chart(&[]),
        render_turnaround_chart(&[]),
    ] {
        assert_svg_document(&svg);
        assert!(svg.contains("No data"));
    }
}

#[test]
fn write_charts_creates_all_three_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let chart_dir = dir.path().join("images");

    let written = write_charts(&empty_tables(), &chart_dir)?;
    assert_eq!(
        written,
        [
            chart_dir.join(BREACH_RATE_CHART),
            chart_dir.join(BACKLOG_CHART),
            chart_dir.join(TURNAROUND_CHART),
        ]
    );
    for path in &written {
        let svg = fs::read_to_string(path)?;
        assert_svg_document(&svg);
    }
    Ok(())
}
