//! Commit records and a time-sorted index over them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit from one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Repository label, used as the attributed project name.
    pub repo: String,
    pub sha: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Commits sorted by timestamp for range queries.
#[derive(Debug, Clone, Default)]
pub struct CommitIndex {
    commits: Vec<CommitRecord>,
}

impl CommitIndex {
    pub fn new(mut commits: Vec<CommitRecord>) -> Self {
        commits.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.repo.cmp(&b.repo))
                .then_with(|| a.sha.cmp(&b.sha))
        });
        Self { commits }
    }

    /// Commits with `start <= timestamp <= end`.
    pub fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> &[CommitRecord] {
        if start > end {
            return &[];
        }
        let lo = self.commits.partition_point(|c| c.timestamp < start);
        let hi = self.commits.partition_point(|c| c.timestamp <= end);
        &self.commits[lo..hi]
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitRecord> {
        self.commits.iter()
    }
}

impl FromIterator<CommitRecord> for CommitIndex {
    fn from_iter<I: IntoIterator<Item = CommitRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn commit(repo: &str, h: u32, m: u32) -> CommitRecord {
        CommitRecord {
            repo: repo.to_string(),
            sha: format!("{repo}-{h}{m}"),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 29, h, m, 0).unwrap(),
            message: String::new(),
            author: None,
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 29, h, m, 0).unwrap()
    }

    #[test]
    fn test_range_is_inclusive_on_both_ends() {
        let index = CommitIndex::new(vec![
            commit("b", 12, 0),
            commit("a", 9, 0),
            commit("a", 10, 30),
            commit("c", 8, 59),
        ]);

        let hits = index.range(at(9, 0), at(12, 0));
        let repos: Vec<_> = hits.iter().map(|c| c.repo.as_str()).collect();
        assert_eq!(repos, ["a", "a", "b"]);
    }

    #[test]
    fn test_range_empty_and_inverted() {
        let index: CommitIndex = [commit("a", 9, 0)].into_iter().collect();
        assert!(index.range(at(10, 0), at(11, 0)).is_empty());
        assert!(index.range(at(11, 0), at(8, 0)).is_empty());
        assert!(CommitIndex::default().range(at(0, 0), at(23, 0)).is_empty());
    }
}
