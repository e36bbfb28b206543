//! Project attribution by correlating sessions with nearby commits.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::commit::CommitIndex;
use crate::error::ConfigError;
use crate::session::{MAX_DURATION_MS, Session};

const HOUR_MS: i64 = 3_600_000;

/// How to pick between repos with the same commit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Smallest repo name wins.
    #[default]
    Lexicographic,
    /// Repo with the earliest in-window commit wins; equal timestamps fall
    /// back to the smaller name.
    EarliestCommit,
}

/// Configuration for the attributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributionConfig {
    /// Window start before session start. Default: 2 hours.
    pub hours_before: i64,
    /// Window end after session start. Default: 1 hour.
    pub hours_after: i64,
    pub tie_break: TieBreak,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            hours_before: 2,
            hours_after: 1,
            tie_break: TieBreak::default(),
        }
    }
}

impl AttributionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, hours) in [
            ("hours_before", self.hours_before),
            ("hours_after", self.hours_after),
        ] {
            let value_ms = hours.saturating_mul(HOUR_MS);
            if hours < 0 {
                return Err(ConfigError::NegativeDuration { field, value_ms });
            }
            if value_ms > MAX_DURATION_MS {
                return Err(ConfigError::TooLarge {
                    field,
                    value_ms,
                    max_ms: MAX_DURATION_MS,
                });
            }
        }
        Ok(())
    }
}

/// A session paired with its commit-derived project, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub session: Session,
    pub identified_project: Option<String>,
    /// Commits of the winning repo inside the window.
    pub supporting_commit_count: usize,
}

/// Per-repo tally inside one window.
struct Tally<'a> {
    count: usize,
    first: DateTime<Utc>,
    repo: &'a str,
}

/// Attributes sessions to the repo with the most commits near their start.
#[derive(Debug, Clone, Copy)]
pub struct Attributor<'a> {
    index: &'a CommitIndex,
    config: AttributionConfig,
}

impl<'a> Attributor<'a> {
    pub const fn new(index: &'a CommitIndex, config: AttributionConfig) -> Self {
        Self { index, config }
    }

    /// Inclusive window around a session start, clamped to the representable range.
    pub fn window(&self, start: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = Duration::try_hours(self.config.hours_before)
            .and_then(|d| start.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let to = Duration::try_hours(self.config.hours_after)
            .and_then(|d| start.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (from, to)
    }

    /// Returns the winning repo and its in-window commit count.
    pub fn identify(&self, session: &Session) -> (Option<String>, usize) {
        let (from, to) = self.window(session.start);
        let commits = self.index.range(from, to);
        if commits.is_empty() {
            return (None, 0);
        }

        // Sorted by timestamp, so the first insert per repo is its earliest commit
        let mut tallies: BTreeMap<&str, Tally<'_>> = BTreeMap::new();
        for commit in commits {
            tallies
                .entry(commit.repo.as_str())
                .or_insert(Tally {
                    count: 0,
                    first: commit.timestamp,
                    repo: &commit.repo,
                })
                .count += 1;
        }

        let winner = tallies.into_values().reduce(|best, candidate| {
            let better = match candidate.count.cmp(&best.count) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => match self.config.tie_break {
                    // BTreeMap iterates by name, so the incumbent is smaller
                    TieBreak::Lexicographic => false,
                    TieBreak::EarliestCommit => candidate.first < best.first,
                },
            };
            if better { candidate } else { best }
        });

        winner.map_or((None, 0), |t| (Some(t.repo.to_string()), t.count))
    }

    pub fn attribute(&self, session: Session) -> Attribution {
        let (identified_project, supporting_commit_count) = self.identify(&session);
        Attribution {
            session,
            identified_project,
            supporting_commit_count,
        }
    }

    /// Attributes every session in parallel, preserving input order.
    pub fn attribute_sessions(&self, sessions: Vec<Session>) -> Vec<Attribution> {
        if self.index.is_empty() {
            tracing::debug!("commit index empty, attribution falls back to hints");
        }
        sessions
            .into_par_iter()
            .map(|session| self.attribute(session))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitRecord;
    use crate::event::Metrics;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 29, h, m, 0).unwrap()
    }

    fn commit(repo: &str, ts: DateTime<Utc>) -> CommitRecord {
        CommitRecord {
            repo: repo.to_string(),
            sha: format!("{repo}{}", ts.timestamp()),
            timestamp: ts,
            message: "work".to_string(),
            author: None,
        }
    }

    fn session(start: DateTime<Utc>, end: DateTime<Utc>) -> Session {
        Session {
            start,
            end,
            service: "Claude".to_string(),
            project: None,
            metrics: Metrics::default(),
            excerpts: Vec::new(),
        }
    }

    fn one_hour_window() -> AttributionConfig {
        AttributionConfig {
            hours_before: 1,
            hours_after: 1,
            ..AttributionConfig::default()
        }
    }

    #[test]
    fn test_single_commit_in_window_identifies_repo() {
        let index = CommitIndex::new(vec![commit("X", at(14, 5))]);
        let attributor = Attributor::new(&index, one_hour_window());

        let result = attributor.attribute(session(at(14, 0), at(14, 30)));

        assert_eq!(result.identified_project.as_deref(), Some("X"));
        assert_eq!(result.supporting_commit_count, 1);
    }

    #[test]
    fn test_no_commits_in_window() {
        let index = CommitIndex::new(vec![commit("X", at(9, 0))]);
        let attributor = Attributor::new(&index, one_hour_window());

        let result = attributor.attribute(session(at(14, 0), at(14, 30)));

        assert_eq!(result.identified_project, None);
        assert_eq!(result.supporting_commit_count, 0);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let index = CommitIndex::new(vec![commit("early", at(12, 0)), commit("late", at(15, 0))]);
        let attributor = Attributor::new(&index, AttributionConfig::default());

        // Default window for 14:00 is 12:00..=15:00
        let (from, to) = attributor.window(at(14, 0));
        assert_eq!((from, to), (at(12, 0), at(15, 0)));

        let (_, count) = attributor.identify(&session(at(14, 0), at(14, 10)));
        assert_eq!(count, 1);

        let (project, _) = attributor.identify(&session(at(14, 1), at(14, 10)));
        assert_eq!(project.as_deref(), Some("late"));
    }

    #[test]
    fn test_most_commits_wins() {
        let index = CommitIndex::new(vec![
            commit("a", at(13, 0)),
            commit("b", at(13, 10)),
            commit("b", at(13, 20)),
        ]);
        let attributor = Attributor::new(&index, AttributionConfig::default());

        let (project, count) = attributor.identify(&session(at(14, 0), at(15, 0)));

        assert_eq!(project.as_deref(), Some("b"));
        assert_eq!(count, 2);
    }

    #[test]
    fn test_tie_break_lexicographic_and_earliest() {
        let index = CommitIndex::new(vec![commit("zeta", at(13, 0)), commit("alpha", at(13, 30))]);
        let s = session(at(14, 0), at(14, 30));

        let lexi = Attributor::new(&index, AttributionConfig::default());
        assert_eq!(lexi.identify(&s).0.as_deref(), Some("alpha"));

        let earliest = Attributor::new(
            &index,
            AttributionConfig {
                tie_break: TieBreak::EarliestCommit,
                ..AttributionConfig::default()
            },
        );
        assert_eq!(earliest.identify(&s).0.as_deref(), Some("zeta"));
    }

    #[test]
    fn test_attribution_is_deterministic_and_keeps_order() {
        let index = CommitIndex::new(vec![
            commit("b", at(10, 0)),
            commit("a", at(10, 0)),
            commit("c", at(16, 0)),
        ]);
        let attributor = Attributor::new(&index, AttributionConfig::default());
        let sessions: Vec<_> = (8..20).map(|h| session(at(h, 0), at(h, 30))).collect();

        let first = attributor.attribute_sessions(sessions.clone());
        let second = attributor.attribute_sessions(sessions);

        assert_eq!(first, second);
        assert_eq!(first[2].session.start, at(10, 0));
        assert_eq!(first[2].identified_project.as_deref(), Some("a"));
    }

    #[test]
    fn test_empty_index_is_not_an_error() {
        let index = CommitIndex::default();
        let attributor = Attributor::new(&index, AttributionConfig::default());

        let results = attributor.attribute_sessions(vec![session(at(9, 0), at(9, 5))]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].identified_project, None);
    }

    #[test]
    fn test_negative_window_rejected() {
        let config = AttributionConfig {
            hours_after: -1,
            ..AttributionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_window_rejected_and_clamped() {
        let config = AttributionConfig {
            hours_before: 3_000_000_000,
            ..AttributionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooLarge {
                field: "hours_before",
                ..
            })
        ));

        // An unvalidated config still yields a window instead of overflowing
        let index = CommitIndex::new(vec![commit("X", at(8, 0))]);
        let attributor = Attributor::new(&index, config);
        let (from, _) = attributor.window(at(9, 0));
        assert_eq!(from, DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            attributor.identify(&session(at(9, 0), at(9, 5))),
            (Some("X".to_string()), 1)
        );
    }
}
