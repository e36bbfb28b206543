//! Core of the developer timeline.
//!
//! This crate turns raw activity events into a timeline:
//! - Session building: grouping one source's events by idle gaps
//! - Merging: combining sessions from all sources into work blocks
//! - Attribution: matching sessions to repositories through nearby commits
//! - Reporting: per-project, per-service and per-day totals
//!
//! Adapters for concrete log formats live in `tl-sources`.

pub mod attribution;
pub mod commit;
pub mod enrich;
mod error;
pub mod event;
pub mod hint;
pub mod merge;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod source;

pub use attribution::{Attribution, AttributionConfig, Attributor, TieBreak};
pub use commit::{CommitIndex, CommitRecord};
pub use enrich::{Deliverable, DeliverableExtractor, DeliverableKind, Enricher, NoEnrichment};
pub use error::{ConfigError, SourceError};
pub use event::{
    EventKind, MetricValue, Metrics, Origin, Payload, RawEvent, TimeRange, parse_timestamp,
    timestamp_from_epoch,
};
pub use hint::{Chain, EncodedDirName, HintStrategy, KnownProjects, PathBasename};
pub use merge::{
    Gap, MergeConfig, WorkBlock, consolidate_sessions, find_gaps, merge_sessions, remerge_blocks,
};
pub use pipeline::{Granularity, PipelineConfig, Timeline, build_sessions, build_timeline};
pub use report::{Report, ReportConfig, TimeEntry, aggregate, peak_hours, time_entries};
pub use session::{Session, SessionBuilder, SessionConfig};
pub use source::{CommitSource, EventSource, Extraction, collect_commits, extract_all};
