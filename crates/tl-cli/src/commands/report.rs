//! Report command: time per project, service and day.

use std::io::{self, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use tl_core::{Granularity, PipelineConfig, Report, TimeRange, Timeline};

use super::util::{format_duration, format_range};

const NAME_WIDTH: usize = 24;

// ========== Progress Bar ==========

/// Generates a 10-character progress bar.
/// Values <5% of max get a single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: i64, max: i64) -> String {
    if max <= 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().clamp(0.0, 10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

// ========== Rendering ==========

const fn granularity_label(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Sessions => "sessions",
        Granularity::Blocks => "blocks",
    }
}

fn write_heading<W: Write>(writer: &mut W, title: &str) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{title}")?;
    writeln!(writer, "{}", "─".repeat(title.chars().count()))
}

/// Writes the human-readable report.
pub fn write_report<W: Write>(
    writer: &mut W,
    report: &Report,
    range: &TimeRange,
    granularity: Granularity,
) -> io::Result<()> {
    writeln!(writer, "TIME REPORT: {}", format_range(range))?;

    if report.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "No activity found in this period.")?;
        writeln!(writer, "Hint: Run 'tl status' to check which sources are available.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "Total: {} across {} {}",
        format_duration(report.total_ms),
        report.session_count,
        granularity_label(granularity)
    )?;

    write_heading(writer, "BY PROJECT")?;
    let max = report.by_project.first().map_or(0, |p| p.total_ms);
    for project in &report.by_project {
        let mut detail = project.services.join(", ");
        if project.max_supporting_commits > 0 {
            detail.push_str(&format!("; {} commits", project.max_supporting_commits));
        }
        writeln!(
            writer,
            "  {:<NAME_WIDTH$}{:>8}  {}  ({detail})",
            project.name,
            format_duration(project.total_ms),
            progress_bar(project.total_ms, max),
        )?;
    }

    write_heading(writer, "BY SERVICE")?;
    let max = report.by_service.first().map_or(0, |s| s.total_ms);
    for service in &report.by_service {
        writeln!(
            writer,
            "  {:<NAME_WIDTH$}{:>8}  {}  ({} {})",
            service.name,
            format_duration(service.total_ms),
            progress_bar(service.total_ms, max),
            service.session_count,
            granularity_label(granularity)
        )?;
    }

    write_heading(writer, "BY DAY")?;
    for day in &report.by_day {
        writeln!(
            writer,
            "  {}  {:>8}  ({} {})",
            day.date.format("%Y-%m-%d"),
            format_duration(day.total_ms),
            day.entries.len(),
            granularity_label(granularity)
        )?;
    }

    if !report.peak_hours.is_empty() {
        let hours: Vec<String> = report
            .peak_hours
            .iter()
            .map(|h| format!("{h:02}:00"))
            .collect();
        writeln!(writer)?;
        writeln!(writer, "Peak hours (UTC): {}", hours.join(", "))?;
    }

    Ok(())
}

// ========== JSON Output ==========

#[derive(Serialize)]
struct JsonPeriod {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    period: JsonPeriod,
    granularity: &'static str,
    #[serde(flatten)]
    report: &'a Report,
}

/// Formats a report as JSON.
pub fn format_report_json(
    report: &Report,
    range: &TimeRange,
    granularity: Granularity,
) -> Result<String> {
    let json = JsonReport {
        period: JsonPeriod {
            start: range.start,
            end: range.end,
        },
        granularity: granularity_label(granularity),
        report,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: Write>(
    writer: &mut W,
    timeline: &Timeline,
    config: &PipelineConfig,
    range: &TimeRange,
    granularity: Granularity,
    json: bool,
) -> Result<()> {
    let report = timeline.report(granularity, config);
    tracing::debug!(
        projects = report.by_project.len(),
        total_ms = report.total_ms,
        "report computed"
    );

    if json {
        writeln!(writer, "{}", format_report_json(&report, range, granularity)?)?;
    } else {
        write_report(writer, &report, range, granularity)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use insta::assert_snapshot;

    use tl_core::{
        Attribution, EventKind, Origin, RawEvent, ReportConfig, SessionBuilder, SessionConfig,
        aggregate,
    };

    fn range() -> TimeRange {
        TimeRange::new(
            Some(Utc.with_ymd_and_hms(2026, 1, 29, 0, 0, 0).unwrap()),
            Some(Utc.with_ymd_and_hms(2026, 1, 30, 0, 0, 0).unwrap()),
        )
    }

    fn attribution(service: &str, h: u32, m: u32, project: Option<&str>, commits: usize) -> Attribution {
        let ts = Utc.with_ymd_and_hms(2026, 1, 29, h, m, 0).unwrap();
        let sessions = SessionBuilder::new(SessionConfig::default())
            .unwrap()
            .build(service, vec![RawEvent::new(ts, Origin::Assistant, EventKind::Message)]);
        Attribution {
            session: sessions.into_iter().next().unwrap(),
            identified_project: project.map(String::from),
            supporting_commit_count: commits,
        }
    }

    fn sample_report() -> Report {
        aggregate(
            &[
                attribution("Claude", 9, 0, Some("ledger"), 3),
                attribution("Cursor", 9, 30, Some("ledger"), 1),
                attribution("Claude", 14, 0, None, 0),
            ],
            &ReportConfig::default(),
        )
    }

    // ========== Progress Bar Tests ==========

    #[test]
    fn test_progress_bar_full() {
        assert_eq!(progress_bar(100, 100), "██████████");
    }

    #[test]
    fn test_progress_bar_partial() {
        assert_eq!(progress_bar(50, 100), "█████░░░░░");
        assert_eq!(progress_bar(80, 100), "████████░░");
    }

    #[test]
    fn test_progress_bar_minimum() {
        // <5% still shows one block
        assert_eq!(progress_bar(1, 100), "█░░░░░░░░░");
    }

    #[test]
    fn test_progress_bar_zero_max() {
        assert_eq!(progress_bar(0, 0), "░░░░░░░░░░");
    }

    // ========== Rendering Tests ==========

    #[test]
    fn test_report_empty_period() {
        let mut output = Vec::new();
        write_report(&mut output, &Report::default(), &range(), Granularity::Sessions).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        TIME REPORT: 2026-01-29 00:00 to 2026-01-30 00:00

        No activity found in this period.
        Hint: Run 'tl status' to check which sources are available.
        ");
    }

    #[test]
    fn test_report_text() {
        let mut output = Vec::new();
        write_report(&mut output, &sample_report(), &range(), Granularity::Sessions).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        TIME REPORT: 2026-01-29 00:00 to 2026-01-30 00:00
        Total: 15m across 3 sessions

        BY PROJECT
        ──────────
          ledger                       10m  ██████████  (Claude, Cursor; 3 commits)
          Unknown                       5m  █████░░░░░  (Claude)

        BY SERVICE
        ──────────
          Claude                       10m  ██████████  (2 sessions)
          Cursor                        5m  █████░░░░░  (1 sessions)

        BY DAY
        ──────
          2026-01-29       15m  (3 sessions)

        Peak hours (UTC): 09:00, 14:00
        ");
    }

    #[test]
    fn test_report_json_output() {
        let json = format_report_json(&sample_report(), &range(), Granularity::Blocks).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["granularity"], "blocks");
        assert_eq!(value["period"]["start"], "2026-01-29T00:00:00Z");
        assert_eq!(value["total_ms"], 900_000);
        assert_eq!(value["by_project"][0]["name"], "ledger");
        assert_eq!(value["by_project"][0]["max_supporting_commits"], 3);
        assert_eq!(value["by_day"][0]["date"], "2026-01-29");
        assert_eq!(value["peak_hours"], serde_json::json!([9, 14]));
    }
}
