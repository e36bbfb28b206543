//! Entries command: suggested time entries described from session content.

use std::io::{self, Write};

use anyhow::Result;

use tl_core::report::UNKNOWN_PROJECT;
use tl_core::{DeliverableExtractor, TimeEntry, TimeRange, Timeline, time_entries};

use super::util::{format_duration, format_range, format_span};

pub fn write_entries<W: Write>(
    writer: &mut W,
    entries: &[TimeEntry],
    range: &TimeRange,
) -> io::Result<()> {
    writeln!(writer, "TIME ENTRIES: {}", format_range(range))?;

    if entries.is_empty() {
        writeln!(writer, "No activity found in this period.")?;
        return Ok(());
    }

    for entry in entries {
        writeln!(
            writer,
            "  {}  {:>7}  {:<20}  {}",
            format_span(entry.start, entry.end),
            format_duration(entry.duration_ms),
            entry.project.as_deref().unwrap_or(UNKNOWN_PROJECT),
            entry.description,
        )?;
    }

    let total: i64 = entries.iter().map(|e| e.duration_ms).sum();
    writeln!(writer)?;
    writeln!(writer, "{} entries, {} total", entries.len(), format_duration(total))
}

pub fn run<W: Write>(
    writer: &mut W,
    timeline: &Timeline,
    range: &TimeRange,
    json: bool,
) -> Result<()> {
    let entries = time_entries(&timeline.blocks, &DeliverableExtractor);
    tracing::debug!(entries = entries.len(), "time entries suggested");

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
    } else {
        write_entries(writer, &entries, range)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, TimeZone, Utc};
    use insta::assert_snapshot;

    use tl_core::{
        EventKind, MergeConfig, Origin, RawEvent, SessionBuilder, SessionConfig, merge_sessions,
    };

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 29, h, m, 0).unwrap()
    }

    #[test]
    fn test_entries_split_blocks_into_parts() {
        let builder = SessionBuilder::new(SessionConfig::default()).unwrap();
        let mut sessions = builder.build(
            "Claude",
            vec![
                RawEvent::new(at(9, 0), Origin::Assistant, EventKind::Message)
                    .with_project_hint(Some("ledger".to_string()))
                    .with_content("I implemented the ledger export. Tests pass."),
            ],
        );
        sessions.extend(builder.build(
            "Cursor",
            vec![RawEvent::new(at(9, 10), Origin::Editor, EventKind::FileActivity)],
        ));
        sessions.extend(builder.build(
            "Claude",
            vec![
                RawEvent::new(at(15, 0), Origin::Assistant, EventKind::Message)
                    .with_content("Looked around the codebase."),
            ],
        ));
        let blocks = merge_sessions(sessions, &MergeConfig::default());
        let entries = time_entries(&blocks, &DeliverableExtractor);

        let mut output = Vec::new();
        write_entries(&mut output, &entries, &TimeRange::new(Some(at(0, 0)), Some(at(23, 0))))
            .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        TIME ENTRIES: 2026-01-29 00:00 to 2026-01-29 23:00
          2026-01-29 09:00-09:05       5m  ledger                Implemented the ledger export - Part 1
          2026-01-29 09:10-09:15       5m  ledger                Development work - Part 2
          2026-01-29 15:00-15:05       5m  Unknown               Development work

        3 entries, 15m total
        ");
    }

    #[test]
    fn test_entries_empty() {
        let mut output = Vec::new();
        write_entries(&mut output, &[], &TimeRange::unbounded()).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        TIME ENTRIES: open to open
        No activity found in this period.
        ");
    }
}
