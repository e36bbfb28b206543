//! Status command for showing which sources are available.

use std::io::Write;

use anyhow::Result;

use tl_core::EventSource;

use crate::Sources;

fn availability(source: &dyn EventSource) -> &'static str {
    if source.is_available() {
        "available"
    } else {
        "not found"
    }
}

pub fn run<W: Write>(writer: &mut W, sources: &Sources) -> Result<()> {
    writeln!(writer, "Timeline sources")?;

    writeln!(
        writer,
        "- {}: {} ({})",
        sources.claude.name(),
        availability(&sources.claude),
        sources.claude.projects_dir().display()
    )?;
    writeln!(
        writer,
        "- {}: {} ({})",
        sources.cursor.name(),
        availability(&sources.cursor),
        sources.cursor.cursor_dir().display()
    )?;

    let git = &sources.git;
    let missing: Vec<&str> = git
        .local_repos()
        .iter()
        .filter(|r| !r.path.is_dir())
        .map(|r| r.name.as_str())
        .collect();
    writeln!(
        writer,
        "- {}: {} ({} local, {} GitHub)",
        git.name(),
        availability(git),
        git.local_repos().len(),
        git.github_repos().len()
    )?;
    if !missing.is_empty() {
        writeln!(writer, "  missing local repositories: {}", missing.join(", "))?;
    }

    Ok(())
}
