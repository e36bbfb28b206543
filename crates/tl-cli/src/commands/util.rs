//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;

use tl_core::{CommitSource, EventSource, PipelineConfig, TimeRange, Timeline, build_timeline};

use crate::{Config, PeriodArgs};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Period used when neither `--days` nor `--start`/`--end` is given.
pub const DEFAULT_DAYS: u32 = 7;

/// Which end of a period a date-only value is resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Parse a datetime string as ISO 8601, a calendar date, or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Date: "2026-01-15" (UTC midnight, or the next midnight for an end)
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
fn parse_bound(s: &str, now: DateTime<Utc>, bound: Bound) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // A date-only end covers that whole day
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let date = match bound {
            Bound::Start => date,
            Bound::End => date
                .succ_opt()
                .with_context(|| format!("date out of range: {s}"))?,
        };
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z), a date (2026-01-15) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Resolves the period flags into a range ending no later than `now`.
pub fn resolve_range(period: &PeriodArgs, now: DateTime<Utc>) -> anyhow::Result<TimeRange> {
    if let Some(days) = period.days {
        let days = i64::from(days);
        if days > MAX_RELATIVE_MINUTES / (60 * 24) {
            anyhow::bail!("--days value too large: {days}");
        }
        return Ok(TimeRange::new(
            Some(now - Duration::days(days)),
            Some(now),
        ));
    }

    if period.start.is_none() && period.end.is_none() {
        return Ok(TimeRange::new(
            Some(now - Duration::days(i64::from(DEFAULT_DAYS))),
            Some(now),
        ));
    }

    let start = period
        .start
        .as_deref()
        .map(|s| parse_bound(s, now, Bound::Start))
        .transpose()
        .context("invalid --start")?;
    let end = period
        .end
        .as_deref()
        .map(|s| parse_bound(s, now, Bound::End))
        .transpose()
        .context("invalid --end")?
        .unwrap_or(now);

    if let Some(start) = start.filter(|s| *s > end) {
        anyhow::bail!("--start ({start}) is after --end ({end})");
    }

    Ok(TimeRange::new(start, Some(end)))
}

/// Extracts every configured source over `range` and builds the timeline.
///
/// Fails when no source is available, since an empty report would hide a
/// misconfiguration.
pub fn load_timeline(
    config: &Config,
    range: &TimeRange,
) -> anyhow::Result<(Timeline, PipelineConfig)> {
    let pipeline = config.pipeline_config();
    let sources = config.sources();
    let events: [&dyn EventSource; 3] = [&sources.claude, &sources.cursor, &sources.git];
    let commits: [&dyn CommitSource; 1] = [&sources.git];

    let timeline =
        build_timeline(&events, &commits, range, &pipeline).context("invalid configuration")?;

    if timeline.services.is_empty() {
        anyhow::bail!("no activity source is available; run 'tl status' to check configuration");
    }
    tracing::debug!(services = ?timeline.services, "timeline loaded");

    Ok((timeline, pipeline))
}

/// Formats milliseconds as duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
pub fn format_duration(ms: i64) -> String {
    if ms < 0 {
        return "0m".to_string();
    }
    let total_minutes = ms / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Human-readable description of a range, e.g. "2026-02-03 12:00 to 2026-02-10 12:00".
pub fn format_range(range: &TimeRange) -> String {
    let fmt = |dt: Option<DateTime<Utc>>| {
        dt.map_or_else(
            || "open".to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
        )
    };
    format!("{} to {}", fmt(range.start), fmt(range.end))
}

/// "2026-02-10 09:00-10:15"; the end carries its month and day when it falls on a later date.
pub fn format_span(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    if start.date_naive() == end.date_naive() {
        format!("{}-{}", start.format("%Y-%m-%d %H:%M"), end.format("%H:%M"))
    } else {
        format!("{}-{}", start.format("%Y-%m-%d %H:%M"), end.format("%m-%d %H:%M"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap()
    }

    fn period(days: Option<u32>, start: Option<&str>, end: Option<&str>) -> PeriodArgs {
        PeriodArgs {
            days,
            start: start.map(String::from),
            end: end.map(String::from),
        }
    }

    #[test]
    fn test_parse_bound_iso8601() {
        let dt = parse_bound("2026-01-15T10:30:00+02:00", now(), Bound::End).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 1, 15, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_bound_relative() {
        let dt = parse_bound("2 hours ago", now(), Bound::Start).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 2, 10, 10, 0, 0).unwrap());

        let dt = parse_bound("1 week ago", now(), Bound::Start).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 2, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_bound_date_end_covers_whole_day() {
        let start = parse_bound("2026-02-01", now(), Bound::Start).unwrap();
        let end = parse_bound("2026-02-01", now(), Bound::End).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_bound_rejects_garbage() {
        assert!(parse_bound("yesterday-ish", now(), Bound::Start).is_err());
        assert!(parse_bound("99999999999 weeks ago", now(), Bound::Start).is_err());
    }

    #[test]
    fn test_resolve_range_days() {
        let range = resolve_range(&period(Some(2), None, None), now()).unwrap();
        assert_eq!(range.start, Some(Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap()));
        assert_eq!(range.end, Some(now()));
    }

    #[test]
    fn test_resolve_range_rejects_oversized_days() {
        let err = resolve_range(&period(Some(u32::MAX), None, None), now()).unwrap_err();
        assert!(err.to_string().contains("--days value too large"));
    }

    #[test]
    fn test_resolve_range_defaults_to_last_week() {
        let range = resolve_range(&PeriodArgs::default(), now()).unwrap();
        assert_eq!(range.start, Some(Utc.with_ymd_and_hms(2026, 2, 3, 12, 0, 0).unwrap()));
    }

    #[test]
    fn test_resolve_range_start_only_ends_now() {
        let range = resolve_range(&period(None, Some("2026-02-09"), None), now()).unwrap();
        assert_eq!(range.start, Some(Utc.with_ymd_and_hms(2026, 2, 9, 0, 0, 0).unwrap()));
        assert_eq!(range.end, Some(now()));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(9_000_000), "2h 30m");
        assert_eq!(format_duration(2_754_000), "45m");
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(-1), "0m");
    }

    #[test]
    fn test_format_span() {
        let start = Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap();
        assert_eq!(
            format_span(start, start + Duration::minutes(75)),
            "2026-02-10 09:00-10:15"
        );
        assert_eq!(
            format_span(start, start + Duration::hours(17)),
            "2026-02-10 09:00-02-11 02:00"
        );
    }

    #[test]
    fn test_format_range_open_start() {
        let range = TimeRange::new(None, Some(now()));
        assert_eq!(format_range(&range), "open to 2026-02-10 12:00");
    }

    #[test]
    fn test_resolve_range_rejects_inverted_period() {
        let result = resolve_range(&period(None, Some("2026-02-09"), Some("2026-02-01")), now());
        assert!(result.is_err());
    }
}
