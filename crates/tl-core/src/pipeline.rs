//! End-to-end pipeline: extract, build sessions, merge, attribute.

use crate::attribution::{Attribution, AttributionConfig, Attributor};
use crate::commit::CommitIndex;
use crate::error::ConfigError;
use crate::event::{Origin, TimeRange};
use crate::merge::{Gap, MergeConfig, WorkBlock, consolidate_sessions, find_gaps, merge_sessions};
use crate::report::{Report, ReportConfig, aggregate};
use crate::session::{Session, SessionBuilder, SessionConfig};
use crate::source::{CommitSource, EventSource, Extraction, collect_commits, extract_all};

/// Configuration for every stage, with a session config per origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub assistant: SessionConfig,
    pub editor: SessionConfig,
    pub vcs: SessionConfig,
    pub merge: MergeConfig,
    pub attribution: AttributionConfig,
    pub report: ReportConfig,
}

impl PipelineConfig {
    pub const fn session_config(&self, origin: Origin) -> &SessionConfig {
        match origin {
            Origin::Assistant => &self.assistant,
            Origin::Editor => &self.editor,
            Origin::Vcs => &self.vcs,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.assistant.validate()?;
        self.editor.validate()?;
        self.vcs.validate()?;
        self.merge.validate()?;
        self.attribution.validate()
    }
}

/// What a report is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// Per-service sessions after same-project consolidation.
    #[default]
    Sessions,
    /// Cross-source work blocks, flattened to one session each.
    Blocks,
}

/// The reconstructed timeline for a period.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    /// Services that were available and extracted.
    pub services: Vec<String>,
    /// Consolidated sessions from every service, sorted by start.
    pub sessions: Vec<Session>,
    pub blocks: Vec<WorkBlock>,
    pub commits: CommitIndex,
}

impl Timeline {
    /// Attributes the chosen granularity against the commit index.
    pub fn attribute(&self, granularity: Granularity, config: &PipelineConfig) -> Vec<Attribution> {
        let sessions = match granularity {
            Granularity::Sessions => self.sessions.clone(),
            Granularity::Blocks => self.blocks.iter().map(WorkBlock::to_session).collect(),
        };
        Attributor::new(&self.commits, config.attribution).attribute_sessions(sessions)
    }

    pub fn report(&self, granularity: Granularity, config: &PipelineConfig) -> Report {
        aggregate(&self.attribute(granularity, config), &config.report)
    }

    pub fn gaps(&self, threshold_ms: i64) -> Vec<Gap> {
        find_gaps(&self.blocks, threshold_ms)
    }
}

/// Builds and consolidates sessions for each extraction.
pub fn build_sessions(
    extractions: Vec<Extraction>,
    config: &PipelineConfig,
) -> Result<Vec<Session>, ConfigError> {
    let mut sessions = Vec::new();

    for extraction in extractions {
        let builder = SessionBuilder::new(config.session_config(extraction.origin).clone())?;
        let built = builder.build(&extraction.service, extraction.events);
        let consolidated = consolidate_sessions(built, &config.merge);
        tracing::debug!(
            service = %extraction.service,
            sessions = consolidated.len(),
            "built sessions"
        );
        sessions.extend(consolidated);
    }

    sessions.sort_by_key(|s| s.start);
    Ok(sessions)
}

/// Runs extraction, session building and merging over `range`.
pub fn build_timeline(
    sources: &[&dyn EventSource],
    commit_sources: &[&dyn CommitSource],
    range: &TimeRange,
    config: &PipelineConfig,
) -> Result<Timeline, ConfigError> {
    config.validate()?;

    let extractions = extract_all(sources, range);
    let services = extractions.iter().map(|e| e.service.clone()).collect();
    let sessions = build_sessions(extractions, config)?;
    let blocks = merge_sessions(sessions.clone(), &config.merge);
    let commits = CommitIndex::new(collect_commits(commit_sources, range));

    tracing::info!(
        sessions = sessions.len(),
        blocks = blocks.len(),
        commits = commits.len(),
        "timeline built"
    );

    Ok(Timeline {
        services,
        sessions,
        blocks,
        commits,
    })
}
