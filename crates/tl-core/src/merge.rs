//! Cross-source merging of sessions into work blocks.
//!
//! Two passes share one adjacency rule: a session joins the current block when
//! `next.start - current.end <= merge_gap`. Overlapping sessions have a negative
//! gap and always join.
//!
//! - [`merge_sessions`] ignores projects and builds [`WorkBlock`]s across sources
//! - [`consolidate_sessions`] also requires equal service and project, and keeps
//!   the result as plain sessions

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::Metrics;
use crate::session::{MAX_DURATION_MS, MAX_EXCERPTS, Session};

/// Configuration for the merge passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeConfig {
    /// Largest idle time bridged by a merge. Default: 900000 (15 minutes).
    pub merge_gap_ms: i64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            merge_gap_ms: 900_000, // 15 minutes
        }
    }
}

impl MergeConfig {
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.merge_gap_ms < 0 {
            return Err(ConfigError::NegativeDuration {
                field: "merge_gap",
                value_ms: self.merge_gap_ms,
            });
        }
        if self.merge_gap_ms > MAX_DURATION_MS {
            return Err(ConfigError::TooLarge {
                field: "merge_gap",
                value_ms: self.merge_gap_ms,
                max_ms: MAX_DURATION_MS,
            });
        }
        Ok(())
    }

    fn joins(&self, current_end: DateTime<Utc>, next_start: DateTime<Utc>) -> bool {
        (next_start - current_end).num_milliseconds() <= self.merge_gap_ms
    }
}

/// A maximal run of adjacent or overlapping sessions from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Contributing sessions, ordered by start.
    pub sessions: Vec<Session>,
    pub metrics: Metrics,
    /// More than one session contributed; the block may be reported per part.
    pub splittable: bool,
}

impl WorkBlock {
    fn from_session(session: Session) -> Self {
        Self {
            start: session.start,
            end: session.end,
            project: session.project.clone(),
            metrics: session.metrics.clone(),
            sessions: vec![session],
            splittable: false,
        }
    }

    fn push(&mut self, session: Session) {
        self.end = self.end.max(session.end);
        self.metrics.absorb(&session.metrics);
        if self.project.is_none() {
            self.project.clone_from(&session.project);
        }
        self.sessions.push(session);
        self.splittable = true;
    }

    fn absorb_block(&mut self, other: Self) {
        self.end = self.end.max(other.end);
        self.metrics.absorb(&other.metrics);
        self.sessions.extend(other.sessions);
        self.sessions.sort_by_key(|s| s.start);
        self.project = self.sessions.iter().find_map(|s| s.project.clone());
        self.splittable = self.sessions.len() > 1;
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }

    /// Distinct contributing services, in order of first appearance.
    pub fn services(&self) -> Vec<&str> {
        let mut services: Vec<&str> = Vec::new();
        for session in &self.sessions {
            if !services.contains(&session.service.as_str()) {
                services.push(&session.service);
            }
        }
        services
    }

    /// Flattens the block into one session labelled with all its services
    /// (e.g. "Claude+Git").
    pub fn to_session(&self) -> Session {
        Session {
            start: self.start,
            end: self.end,
            service: self.services().join("+"),
            project: self.project.clone(),
            metrics: self.metrics.clone(),
            excerpts: self
                .sessions
                .iter()
                .flat_map(|s| s.excerpts.iter().cloned())
                .take(MAX_EXCERPTS)
                .collect(),
        }
    }
}

/// Merges sessions from all sources into work blocks, ignoring projects.
pub fn merge_sessions(mut sessions: Vec<Session>, config: &MergeConfig) -> Vec<WorkBlock> {
    sessions.sort_by_key(|s| s.start);

    let mut blocks = Vec::new();
    let mut current: Option<WorkBlock> = None;

    for session in sessions {
        if let Some(block) = current.as_mut() {
            if config.joins(block.end, session.start) {
                block.push(session);
                continue;
            }
        }
        if let Some(done) = current.replace(WorkBlock::from_session(session)) {
            blocks.push(done);
        }
    }
    blocks.extend(current);

    tracing::debug!(blocks = blocks.len(), "merged sessions into work blocks");
    blocks
}

/// Re-applies the merge rule to existing blocks.
///
/// A no-op on [`merge_sessions`] output; useful after combining block lists
/// from separate runs.
pub fn remerge_blocks(mut blocks: Vec<WorkBlock>, config: &MergeConfig) -> Vec<WorkBlock> {
    blocks.sort_by_key(|b| b.start);

    let mut merged: Vec<WorkBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        match merged.last_mut() {
            Some(last) if config.joins(last.end, block.start) => last.absorb_block(block),
            _ => merged.push(block),
        }
    }
    merged
}

/// Merges sessions of the same service and project that are within the gap.
pub fn consolidate_sessions(mut sessions: Vec<Session>, config: &MergeConfig) -> Vec<Session> {
    sessions.sort_by_key(|s| s.start);

    let mut merged: Vec<Session> = Vec::with_capacity(sessions.len());
    for session in sessions {
        match merged.last_mut() {
            Some(last)
                if last.service == session.service
                    && last.project == session.project
                    && config.joins(last.end, session.start) =>
            {
                last.end = last.end.max(session.end);
                last.metrics.absorb(&session.metrics);
                let room = MAX_EXCERPTS.saturating_sub(last.excerpts.len());
                last.excerpts.extend(session.excerpts.into_iter().take(room));
            }
            _ => merged.push(session),
        }
    }
    merged
}

/// An idle period between consecutive work blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Idle periods of at least `threshold_ms` between blocks.
pub fn find_gaps(blocks: &[WorkBlock], threshold_ms: i64) -> Vec<Gap> {
    let mut ordered: Vec<&WorkBlock> = blocks.iter().collect();
    ordered.sort_by_key(|b| b.start);

    let mut gaps = Vec::new();
    let mut covered_until: Option<DateTime<Utc>> = None;

    for block in ordered {
        if let Some(prev_end) = covered_until {
            let duration_ms = (block.start - prev_end).num_milliseconds();
            if duration_ms >= threshold_ms && duration_ms > 0 {
                gaps.push(Gap {
                    start: prev_end,
                    end: block.start,
                    duration_ms,
                });
            }
        }
        covered_until = Some(covered_until.map_or(block.end, |e| e.max(block.end)));
    }
    gaps
}
