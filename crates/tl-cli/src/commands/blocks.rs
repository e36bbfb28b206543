//! Blocks command: the merged timeline and the idle gaps between blocks.

use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;

use tl_core::report::UNKNOWN_PROJECT;
use tl_core::{Gap, TimeRange, Timeline, WorkBlock};

use super::util::{format_duration, format_range, format_span};

#[derive(Serialize)]
struct JsonBlocks<'a> {
    blocks: &'a [WorkBlock],
    gaps: &'a [Gap],
}

pub fn write_blocks<W: Write>(
    writer: &mut W,
    blocks: &[WorkBlock],
    gaps: &[Gap],
    range: &TimeRange,
    threshold_minutes: i64,
) -> io::Result<()> {
    writeln!(writer, "TIMELINE: {}", format_range(range))?;

    if blocks.is_empty() {
        writeln!(writer, "No activity found in this period.")?;
        return Ok(());
    }

    for block in blocks {
        let mut line = format!(
            "  {}  {:>7}  {:<20}  {}",
            format_span(block.start, block.end),
            format_duration(block.duration_ms()),
            block.project.as_deref().unwrap_or(UNKNOWN_PROJECT),
            block.services().join("+"),
        );
        if block.splittable {
            line.push_str(&format!("  [{} sessions]", block.sessions.len()));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    writeln!(writer)?;
    if gaps.is_empty() {
        writeln!(writer, "No gaps of {threshold_minutes}m or more.")?;
    } else {
        writeln!(writer, "GAPS (>= {threshold_minutes}m)")?;
        for gap in gaps {
            writeln!(
                writer,
                "  {}  {:>7}",
                format_span(gap.start, gap.end),
                format_duration(gap.duration_ms)
            )?;
        }
    }

    Ok(())
}

pub fn run<W: Write>(
    writer: &mut W,
    timeline: &Timeline,
    range: &TimeRange,
    gap_threshold_minutes: i64,
    json: bool,
) -> Result<()> {
    if gap_threshold_minutes < 0 {
        anyhow::bail!("--gap-threshold must not be negative");
    }
    let gaps = timeline.gaps(gap_threshold_minutes.saturating_mul(60_000));

    if json {
        let output = JsonBlocks {
            blocks: &timeline.blocks,
            gaps: &gaps,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
    } else {
        write_blocks(writer, &timeline.blocks, &gaps, range, gap_threshold_minutes)?;
    }
    Ok(())
}
