//! SVG renderings of the summary tables. Presentation only: every value drawn here
//! comes straight from a [`MetricTables`] row.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::enrichment::AgeBucket;
use crate::error::{PipelineError, Result};
use crate::metrics::{BacklogBucket, MetricTables, MonthlyBreachRate, PriorityTurnaround};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 170.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 100.0;
const Y_TICKS: usize = 5;

const SERIES_COLOR: &str = "#1f77b4";
const BUCKET_COLORS: [&str; 5] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd"];

pub const BREACH_RATE_CHART: &str = "sla_breach_rate.svg";
pub const BACKLOG_CHART: &str = "backlog_by_team.svg";
pub const TURNAROUND_CHART: &str = "avg_turnaround_by_priority.svg";

struct PlotArea {
    y_max: f64,
}

impl PlotArea {
    fn new(max_value: f64) -> Self {
        Self {
            y_max: nice_ceiling(max_value),
        }
    }

    fn left(&self) -> f64 {
        MARGIN_LEFT
    }

    fn right(&self) -> f64 {
        WIDTH - MARGIN_RIGHT
    }

    fn top(&self) -> f64 {
        MARGIN_TOP
    }

    fn bottom(&self) -> f64 {
        HEIGHT - MARGIN_BOTTOM
    }

    fn width(&self) -> f64 {
        self.right() - self.left()
    }

    fn y(&self, value: f64) -> f64 {
        self.bottom() - (value / self.y_max) * (self.bottom() - self.top())
    }

    /// Center of the `idx`-th of `slots` equal-width categories.
    fn slot_center(&self, idx: usize, slots: usize) -> f64 {
        let slot_width = self.width() / slots.max(1) as f64;
        self.left() + slot_width * (idx as f64 + 0.5)
    }

    fn slot_width(&self, slots: usize) -> f64 {
        self.width() / slots.max(1) as f64
    }
}

/// Rounds up to 1, 2 or 5 times a power of ten.
pub fn nice_ceiling(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 1.0;
    }
    let base = 10f64.powf(value.log10().floor());
    for step in [1.0, 2.0, 5.0] {
        if value <= step * base {
            return step * base;
        }
    }
    10.0 * base
}

pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn open_document(title: &str) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">
"#
    ));
    svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);
    svg.push('\n');
    svg.push_str(&format!(
        r#"<text x="{:.1}" y="28" font-size="18" text-anchor="middle">{}</text>"#,
        (MARGIN_LEFT + WIDTH - MARGIN_RIGHT) / 2.0,
        escape_xml(title)
    ));
    svg.push('\n');
    svg
}

fn close_document(mut svg: String) -> String {
    svg.push_str("</svg>\n");
    svg
}

fn no_data(svg: &mut String) {
    svg.push_str(&format!(
        r##"<text x="{:.1}" y="{:.1}" font-size="16" text-anchor="middle" fill="#666666">No data</text>"##,
        WIDTH / 2.0,
        HEIGHT / 2.0
    ));
    svg.push('\n');
}

fn axes(svg: &mut String, area: &PlotArea, x_label: &str, y_label: &str) {
    svg.push_str(r##"<g class="grid" stroke="#e0e0e0" stroke-width="1">"##);
    for tick in 0..=Y_TICKS {
        let value = area.y_max * tick as f64 / Y_TICKS as f64;
        let y = area.y(value);
        svg.push_str(&format!(
            r#"<line x1="{:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}"/>"#,
            area.left(),
            area.right()
        ));
    }
    svg.push_str("</g>\n");

    for tick in 0..=Y_TICKS {
        let value = area.y_max * tick as f64 / Y_TICKS as f64;
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" font-size="11" text-anchor="end">{}</text>"#,
            area.left() - 6.0,
            area.y(value) + 4.0,
            format_tick(value)
        ));
        svg.push('\n');
    }

    svg.push_str(&format!(
        r##"<line x1="{l:.1}" y1="{t:.1}" x2="{l:.1}" y2="{b:.1}" stroke="#333333"/>
<line x1="{l:.1}" y1="{b:.1}" x2="{r:.1}" y2="{b:.1}" stroke="#333333"/>
"##,
        l = area.left(),
        r = area.right(),
        t = area.top(),
        b = area.bottom()
    ));

    svg.push_str(&format!(
        r#"<text x="{:.1}" y="{:.1}" font-size="13" text-anchor="middle">{}</text>"#,
        area.left() + area.width() / 2.0,
        HEIGHT - 12.0,
        escape_xml(x_label)
    ));
    svg.push('\n');
    let mid_y = (area.top() + area.bottom()) / 2.0;
    svg.push_str(&format!(
        r#"<text x="18" y="{mid_y:.1}" font-size="13" text-anchor="middle" transform="rotate(-90 18 {mid_y:.1})">{}</text>"#,
        escape_xml(y_label)
    ));
    svg.push('\n');
}

fn format_tick(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.1}")
    }
}

fn category_label(svg: &mut String, x: f64, y: f64, text: &str, rotate: bool) {
    if rotate {
        svg.push_str(&format!(
            r#"<text x="{x:.1}" y="{y:.1}" font-size="11" text-anchor="end" transform="rotate(-45 {x:.1} {y:.1})">{}</text>"#,
            escape_xml(text)
        ));
    } else {
        svg.push_str(&format!(
            r#"<text x="{x:.1}" y="{y:.1}" font-size="11" text-anchor="middle">{}</text>"#,
            escape_xml(text)
        ));
    }
    svg.push('\n');
}

/// Line chart of the monthly breach rate, oldest month on the left.
pub fn render_breach_rate_chart(rows: &[MonthlyBreachRate]) -> String {
    let mut svg = open_document("Monthly SLA Breach Rate (Closed Requests)");
    if rows.is_empty() {
        no_data(&mut svg);
        return close_document(svg);
    }

    let max_rate = rows
        .iter()
        .map(|row| row.breach_rate_pct)
        .fold(0.0_f64, f64::max);
    let area = PlotArea::new(max_rate);
    axes(&mut svg, &area, "Month", "Breach rate (%)");

    let points: Vec<(f64, f64)> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (area.slot_center(idx, rows.len()), area.y(row.breach_rate_pct)))
        .collect();

    let polyline = points
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ");
    svg.push_str(&format!(
        r#"<polyline points="{polyline}" fill="none" stroke="{SERIES_COLOR}" stroke-width="2"/>"#
    ));
    svg.push('\n');

    for ((x, y), row) in points.iter().zip(rows) {
        svg.push_str(&format!(
            r#"<circle cx="{x:.1}" cy="{y:.1}" r="3.5" fill="{SERIES_COLOR}"><title>{}: {:.2}%</title></circle>"#,
            row.completion_month.format("%Y-%m"),
            row.breach_rate_pct
        ));
        svg.push('\n');
        category_label(
            &mut svg,
            *x,
            area.bottom() + 14.0,
            &row.completion_month.format("%Y-%m").to_string(),
            true,
        );
    }

    close_document(svg)
}

/// Stacked bars of open requests per team, one segment per age bucket.
pub fn render_backlog_chart(rows: &[BacklogBucket]) -> String {
    let mut svg = open_document("Open Requests by Team (Aging Buckets)");

    let mut per_team: BTreeMap<&str, [usize; AgeBucket::ALL.len()]> = BTreeMap::new();
    for row in rows {
        per_team
            .entry(row.requester_team.as_str())
            .or_default()[row.age_bucket.index()] += row.open_requests;
    }

    if per_team.is_empty() {
        no_data(&mut svg);
        return close_document(svg);
    }

    let max_total = per_team
        .values()
        .map(|counts| counts.iter().sum::<usize>())
        .max()
        .unwrap_or(0);
    let area = PlotArea::new(max_total as f64);
    axes(&mut svg, &area, "Team", "Open requests");

    let bar_width = area.slot_width(per_team.len()) * 0.6;
    for (idx, (team, counts)) in per_team.iter().enumerate() {
        let center = area.slot_center(idx, per_team.len());
        let mut running = 0usize;
        for bucket in AgeBucket::ALL {
            let value = counts[bucket.index()];
            if value == 0 {
                continue;
            }
            let top = area.y((running + value) as f64);
            let bottom = area.y(running as f64);
            svg.push_str(&format!(
                r#"<rect x="{:.1}" y="{top:.1}" width="{bar_width:.1}" height="{:.1}" fill="{}"><title>{} {}: {value}</title></rect>"#,
                center - bar_width / 2.0,
                bottom - top,
                BUCKET_COLORS[bucket.index()],
                escape_xml(team),
                bucket.label()
            ));
            svg.push('\n');
            running += value;
        }
        category_label(&mut svg, center, area.bottom() + 14.0, team, true);
    }

    for (idx, bucket) in AgeBucket::ALL.iter().enumerate() {
        let y = area.top() + 20.0 * idx as f64;
        let x = area.right() + 20.0;
        svg.push_str(&format!(
            r#"<rect x="{x:.1}" y="{y:.1}" width="12" height="12" fill="{}"/><text x="{:.1}" y="{:.1}" font-size="12">{}</text>"#,
            BUCKET_COLORS[bucket.index()],
            x + 18.0,
            y + 10.0,
            bucket.label()
        ));
        svg.push('\n');
    }

    close_document(svg)
}

/// Bar chart of average calendar-day turnaround per priority.
pub fn render_turnaround_chart(rows: &[PriorityTurnaround]) -> String {
    let mut svg = open_document("Average Turnaround (Closed Requests)");
    if rows.is_empty() {
        no_data(&mut svg);
        return close_document(svg);
    }

    let max_days = rows
        .iter()
        .map(|row| row.avg_turnaround_days)
        .fold(0.0_f64, f64::max);
    let area = PlotArea::new(max_days);
    axes(&mut svg, &area, "Priority", "Days (calendar)");

    let bar_width = area.slot_width(rows.len()) * 0.6;
    for (idx, row) in rows.iter().enumerate() {
        let center = area.slot_center(idx, rows.len());
        let top = area.y(row.avg_turnaround_days.max(0.0));
        svg.push_str(&format!(
            r#"<rect x="{:.1}" y="{top:.1}" width="{bar_width:.1}" height="{:.1}" fill="{SERIES_COLOR}"><title>{}: {:.2} days</title></rect>"#,
            center - bar_width / 2.0,
            area.bottom() - top,
            escape_xml(&row.priority),
            row.avg_turnaround_days
        ));
        svg.push('\n');
        category_label(&mut svg, center, area.bottom() + 16.0, &row.priority, false);
    }

    close_document(svg)
}

/// Renders the three charts into `chart_dir`, replacing earlier renderings.
pub fn write_charts(tables: &MetricTables, chart_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(chart_dir).map_err(|err| PipelineError::io(chart_dir, err))?;

    let documents = [
        (
            BREACH_RATE_CHART,
            render_breach_rate_chart(&tables.monthly_breach_rate),
        ),
        (
            BACKLOG_CHART,
            render_backlog_chart(&tables.backlog_age_buckets),
        ),
        (
            TURNAROUND_CHART,
            render_turnaround_chart(&tables.priority_turnaround),
        ),
    ];

    let mut written = Vec::with_capacity(documents.len());
    for (file_name, document) in documents {
        let path = chart_dir.join(file_name);
        fs::write(&path, document).map_err(|err| PipelineError::io(&path, err))?;
        info!(path = %path.display(), "wrote chart");
        written.push(path);
    }
    Ok(written)
}
