//! Collaborator interfaces for activity and commit sources.

use rayon::prelude::*;

use crate::commit::CommitRecord;
use crate::error::SourceError;
use crate::event::{Origin, RawEvent, TimeRange};

/// A source of raw activity events (assistant logs, editor, VCS).
///
/// Implementations must skip malformed individual records rather than fail
/// the whole extraction.
pub trait EventSource: Send + Sync {
    /// Service label used on the sessions this source produces (e.g. "Claude").
    fn name(&self) -> &str;

    fn origin(&self) -> Origin;

    /// Returns `true` if the backing store exists and is non-empty.
    fn is_available(&self) -> bool;

    /// Reads every event within `range`, eagerly.
    fn extract_events(&self, range: &TimeRange) -> Result<Vec<RawEvent>, SourceError>;
}

/// A provider of commit history used for project attribution.
pub trait CommitSource: Send + Sync {
    fn get_commits(&self, range: &TimeRange) -> Result<Vec<CommitRecord>, SourceError>;
}

/// Events extracted from one source.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub service: String,
    pub origin: Origin,
    pub events: Vec<RawEvent>,
}

/// Runs every available source in parallel and collects their events.
///
/// Unavailable or failing sources are logged and contribute nothing. Output
/// order follows `sources`, regardless of completion order.
pub fn extract_all(sources: &[&dyn EventSource], range: &TimeRange) -> Vec<Extraction> {
    sources
        .par_iter()
        .filter_map(|source| {
            if !source.is_available() {
                tracing::info!(source = source.name(), "source unavailable, skipping");
                return None;
            }
            match source.extract_events(range) {
                Ok(events) => {
                    tracing::debug!(source = source.name(), count = events.len(), "extracted events");
                    Some(Extraction {
                        service: source.name().to_string(),
                        origin: source.origin(),
                        events,
                    })
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "extraction failed, skipping source");
                    None
                }
            }
        })
        .collect()
}

/// Collects commits from every provider; failing providers are skipped.
pub fn collect_commits(providers: &[&dyn CommitSource], range: &TimeRange) -> Vec<CommitRecord> {
    providers
        .par_iter()
        .flat_map(|provider| match provider.get_commits(range) {
            Ok(commits) => commits,
            Err(e) => {
                tracing::warn!(error = %e, "commit provider failed, skipping");
                Vec::new()
            }
        })
        .collect()
}
