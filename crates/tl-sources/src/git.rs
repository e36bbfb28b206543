//! Version-control adapter: local `git log` and GitHub via `gh api`.
//!
//! Commits serve both as activity events and as the attribution index.
//! Each command runs under a timeout; a repository that fails or times out is
//! logged and skipped.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use tl_core::hint::parse_remote_name;
use tl_core::{
    CommitRecord, CommitSource, EventKind, EventSource, Origin, RawEvent, SourceError, TimeRange,
    parse_timestamp,
};
use tokio::process::Command;

/// Default per-command timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Field separator for `git log` output (ASCII unit separator).
const FIELD_SEP: char = '\x1f';

const GIT_LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%aI%x1f%s";

/// A local repository and the label its commits are reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepo {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct GhCommit {
    sha: String,
    commit: GhCommitDetail,
}

#[derive(Debug, Deserialize)]
struct GhCommitDetail {
    #[serde(default)]
    message: String,
    author: Option<GhAuthor>,
}

#[derive(Debug, Deserialize)]
struct GhAuthor {
    name: Option<String>,
    date: Option<String>,
}

/// Commits from local repositories and GitHub.
#[derive(Debug)]
pub struct GitSource {
    local: Vec<LocalRepo>,
    github: Vec<String>,
    timeout: Duration,
    /// Last fetched range, shared between the event and commit views.
    cache: Mutex<Option<(TimeRange, Vec<CommitRecord>)>>,
}

impl Default for GitSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GitSource {
    pub fn new() -> Self {
        Self {
            local: Vec::new(),
            github: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_local(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.local.push(LocalRepo {
            name: name.into(),
            path: path.into(),
        });
        self
    }

    /// Adds a GitHub repository as an `owner/name` slug.
    #[must_use]
    pub fn with_github(mut self, slug: impl Into<String>) -> Self {
        self.github.push(slug.into());
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_repos(&self) -> &[LocalRepo] {
        &self.local
    }

    pub fn github_repos(&self) -> &[String] {
        &self.github
    }

    async fn local_commits(
        &self,
        repo: &LocalRepo,
        range: &TimeRange,
    ) -> Result<Vec<CommitRecord>, SourceError> {
        if !repo.path.is_dir() {
            return Err(SourceError::Unavailable(format!(
                "{} is not a directory",
                repo.path.display()
            )));
        }

        let mut args = vec![
            "log".to_string(),
            "--all".to_string(),
            GIT_LOG_FORMAT.to_string(),
        ];
        if let Some(start) = range.start {
            args.push(format!("--since={}", start.to_rfc3339()));
        }
        if let Some(end) = range.end {
            args.push(format!("--until={}", end.to_rfc3339()));
        }

        let mut cmd = Command::new("git");
        cmd.args(&args).current_dir(&repo.path);
        let stdout = run_with_timeout(cmd, "git log", self.timeout).await?;

        Ok(parse_git_log(&stdout, &repo.name)
            .into_iter()
            .filter(|c| range.contains(c.timestamp))
            .collect())
    }

    async fn github_commits(
        &self,
        slug: &str,
        range: &TimeRange,
    ) -> Result<Vec<CommitRecord>, SourceError> {
        let mut endpoint = format!("/repos/{slug}/commits?per_page=100");
        if let Some(start) = range.start {
            endpoint.push_str(&format!("&since={}", start.format("%Y-%m-%dT%H:%M:%SZ")));
        }
        if let Some(end) = range.end {
            endpoint.push_str(&format!("&until={}", end.format("%Y-%m-%dT%H:%M:%SZ")));
        }

        let mut cmd = Command::new("gh");
        cmd.args(["api", "--paginate", &endpoint]);
        let stdout = run_with_timeout(cmd, "gh api", self.timeout).await?;

        let name = parse_remote_name(slug).unwrap_or_else(|| slug.to_string());
        Ok(parse_gh_commits(&stdout, &name)
            .into_iter()
            .filter(|c| range.contains(c.timestamp))
            .collect())
    }

    async fn fetch_all(&self, range: &TimeRange) -> Vec<CommitRecord> {
        let mut commits = Vec::new();

        for repo in &self.local {
            match self.local_commits(repo, range).await {
                Ok(found) => {
                    tracing::debug!(repo = %repo.name, count = found.len(), "read local commits");
                    commits.extend(found);
                }
                Err(e) => tracing::warn!(repo = %repo.name, error = %e, "skipping repository"),
            }
        }

        for slug in &self.github {
            match self.github_commits(slug, range).await {
                Ok(found) => {
                    tracing::debug!(repo = %slug, count = found.len(), "read GitHub commits");
                    commits.extend(found);
                }
                Err(e) => tracing::warn!(repo = %slug, error = %e, "skipping repository"),
            }
        }

        commits
    }

    fn commits(&self, range: &TimeRange) -> Result<Vec<CommitRecord>, SourceError> {
        if let Ok(guard) = self.cache.lock() {
            if let Some((cached_range, commits)) = guard.as_ref() {
                if cached_range == range {
                    return Ok(commits.clone());
                }
            }
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let commits = runtime.block_on(self.fetch_all(range));

        if let Ok(mut guard) = self.cache.lock() {
            *guard = Some((*range, commits.clone()));
        }
        Ok(commits)
    }
}

/// Runs a command to completion, killing it if `timeout` elapses.
async fn run_with_timeout(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
) -> Result<String, SourceError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(SourceError::Timeout {
                command: label.to_string(),
                seconds: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        return Err(SourceError::Command {
            command: label.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `git log` output in the `%H %an %aI %s` unit-separated format.
///
/// Lines with a bad hash or timestamp are skipped.
pub fn parse_git_log(output: &str, repo: &str) -> Vec<CommitRecord> {
    output
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            if line.trim().is_empty() {
                return None;
            }
            let mut parts = line.splitn(4, FIELD_SEP);
            let (Some(sha), Some(author), Some(date), message) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                tracing::trace!(repo, line = idx + 1, "skipping short git log line");
                return None;
            };

            let sha = sha.trim();
            if sha.len() != 40 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                tracing::trace!(repo, line = idx + 1, "skipping line with invalid hash");
                return None;
            }
            let Some(timestamp) = parse_timestamp(date) else {
                tracing::trace!(repo, line = idx + 1, date, "skipping line with invalid date");
                return None;
            };

            let author = author.trim();
            Some(CommitRecord {
                repo: repo.to_string(),
                sha: sha.to_string(),
                timestamp,
                message: message.unwrap_or_default().trim().to_string(),
                author: (!author.is_empty()).then(|| author.to_string()),
            })
        })
        .collect()
}

/// Parses `gh api --paginate` output: one or more concatenated JSON arrays.
pub fn parse_gh_commits(output: &str, repo: &str) -> Vec<CommitRecord> {
    let mut commits = Vec::new();

    for page in serde_json::Deserializer::from_str(output).into_iter::<Vec<serde_json::Value>>() {
        let page = match page {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(repo, error = %e, "unparseable GitHub commits page");
                break;
            }
        };

        for value in page {
            let gh: GhCommit = match serde_json::from_value(value) {
                Ok(gh) => gh,
                Err(e) => {
                    tracing::debug!(repo, error = %e, "skipping malformed GitHub commit");
                    continue;
                }
            };
            let author = gh.commit.author;
            let Some(timestamp) = author
                .as_ref()
                .and_then(|a| a.date.as_deref())
                .and_then(parse_timestamp)
            else {
                tracing::trace!(repo, sha = %gh.sha, "skipping commit without date");
                continue;
            };

            commits.push(CommitRecord {
                repo: repo.to_string(),
                sha: gh.sha,
                timestamp,
                message: gh.commit.message.lines().next().unwrap_or_default().to_string(),
                author: author.and_then(|a| a.name),
            });
        }
    }

    commits
}

impl CommitSource for GitSource {
    fn get_commits(&self, range: &TimeRange) -> Result<Vec<CommitRecord>, SourceError> {
        self.commits(range)
    }
}

impl EventSource for GitSource {
    fn name(&self) -> &str {
        "Git"
    }

    fn origin(&self) -> Origin {
        Origin::Vcs
    }

    fn is_available(&self) -> bool {
        !self.github.is_empty() || self.local.iter().any(|r| r.path.is_dir())
    }

    fn extract_events(&self, range: &TimeRange) -> Result<Vec<RawEvent>, SourceError> {
        let mut events: Vec<RawEvent> = self
            .commits(range)?
            .into_iter()
            .map(|c| {
                RawEvent::new(c.timestamp, Origin::Vcs, EventKind::Commit)
                    .with_project_hint(Some(c.repo))
                    .with_content(c.message)
            })
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}
