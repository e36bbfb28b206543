//! Aggregation of attributed sessions into report summaries.
//!
//! Every function here is pure: empty input produces an empty report.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::attribution::Attribution;
use crate::enrich::Enricher;
use crate::merge::WorkBlock;
use crate::session::Session;

/// Label used when neither commits nor hints name a project.
pub const UNKNOWN_PROJECT: &str = "Unknown";

/// Number of hours reported by [`peak_hours`].
const PEAK_HOURS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportConfig {
    /// Services whose own project hint beats commit attribution.
    pub trust_hint_services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    pub total_ms: i64,
    pub session_count: usize,
    /// Distinct services, sorted by name.
    pub services: Vec<String>,
    pub max_supporting_commits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub name: String,
    pub total_ms: i64,
    pub session_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub service: String,
    pub project: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    /// UTC calendar day of the entries' start.
    pub date: NaiveDate,
    pub total_ms: i64,
    pub entries: Vec<DayEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub total_ms: i64,
    pub session_count: usize,
    pub by_project: Vec<ProjectSummary>,
    pub by_service: Vec<ServiceSummary>,
    pub by_day: Vec<DaySummary>,
    /// Busiest UTC hours of day, most active first.
    pub peak_hours: Vec<u32>,
}

impl Report {
    pub const fn is_empty(&self) -> bool {
        self.session_count == 0
    }
}

/// Resolves the reporting label for one attribution.
pub fn project_label(attribution: &Attribution, config: &ReportConfig) -> String {
    let session = &attribution.session;
    let trusts_hint = config
        .trust_hint_services
        .iter()
        .any(|s| s == &session.service);

    let label = if trusts_hint {
        session
            .project
            .as_ref()
            .or(attribution.identified_project.as_ref())
    } else {
        attribution
            .identified_project
            .as_ref()
            .or(session.project.as_ref())
    };

    label.map_or_else(|| UNKNOWN_PROJECT.to_string(), Clone::clone)
}

#[derive(Default)]
struct ProjectAcc {
    total_ms: i64,
    session_count: usize,
    services: BTreeSet<String>,
    max_supporting_commits: usize,
}

/// Sort key: total descending, then name ascending.
fn by_total_then_name(a: (i64, &str), b: (i64, &str)) -> std::cmp::Ordering {
    b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

/// Builds the project, service and day aggregates.
pub fn aggregate(attributions: &[Attribution], config: &ReportConfig) -> Report {
    let mut projects: BTreeMap<String, ProjectAcc> = BTreeMap::new();
    let mut services: BTreeMap<&str, (i64, usize)> = BTreeMap::new();
    let mut days: BTreeMap<NaiveDate, DaySummary> = BTreeMap::new();
    let mut total_ms = 0i64;

    for attribution in attributions {
        let session = &attribution.session;
        let duration_ms = session.duration_ms();
        let label = project_label(attribution, config);
        total_ms += duration_ms;

        let project = projects.entry(label.clone()).or_default();
        project.total_ms += duration_ms;
        project.session_count += 1;
        project.services.insert(session.service.clone());
        project.max_supporting_commits = project
            .max_supporting_commits
            .max(attribution.supporting_commit_count);

        let service = services.entry(session.service.as_str()).or_default();
        service.0 += duration_ms;
        service.1 += 1;

        let date = session.start.date_naive();
        let day = days.entry(date).or_insert_with(|| DaySummary {
            date,
            total_ms: 0,
            entries: Vec::new(),
        });
        day.total_ms += duration_ms;
        day.entries.push(DayEntry {
            start: session.start,
            end: session.end,
            service: session.service.clone(),
            project: label,
        });
    }

    let mut by_project: Vec<ProjectSummary> = projects
        .into_iter()
        .map(|(name, acc)| ProjectSummary {
            name,
            total_ms: acc.total_ms,
            session_count: acc.session_count,
            services: acc.services.into_iter().collect(),
            max_supporting_commits: acc.max_supporting_commits,
        })
        .collect();
    by_project.sort_by(|a, b| by_total_then_name((a.total_ms, &a.name), (b.total_ms, &b.name)));

    let mut by_service: Vec<ServiceSummary> = services
        .into_iter()
        .map(|(name, (total_ms, session_count))| ServiceSummary {
            name: name.to_string(),
            total_ms,
            session_count,
        })
        .collect();
    by_service.sort_by(|a, b| by_total_then_name((a.total_ms, &a.name), (b.total_ms, &b.name)));

    let by_day = days
        .into_values()
        .map(|mut day| {
            day.entries.sort_by_key(|e| e.start);
            day
        })
        .collect();

    Report {
        total_ms,
        session_count: attributions.len(),
        by_project,
        by_service,
        by_day,
        peak_hours: peak_hours(attributions.iter().map(|a| &a.session)),
    }
}

/// Top UTC hours of day by the number of sessions active in them.
///
/// A session counts toward every hour from its start hour through the hour
/// containing its end. Ties go to the earlier hour.
pub fn peak_hours<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Vec<u32> {
    let mut counts = [0usize; 24];

    for session in sessions {
        let Some(mut hour) = session
            .start
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
        else {
            continue;
        };
        while hour <= session.end {
            counts[hour.hour() as usize] += 1;
            hour += Duration::hours(1);
        }
    }

    let mut ranked: Vec<(u32, usize)> = (0u32..)
        .zip(counts)
        .filter(|&(_, count)| count > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(PEAK_HOURS).map(|(h, _)| h).collect()
}

/// A suggested time-tracking entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub service: String,
}

/// Turns blocks into time entries.
///
/// Splittable blocks yield one "Part N" entry per contributing session; other
/// blocks yield a single entry.
pub fn time_entries(blocks: &[WorkBlock], enricher: &dyn Enricher) -> Vec<TimeEntry> {
    let mut entries = Vec::new();

    for block in blocks {
        if block.splittable {
            for (idx, session) in block.sessions.iter().enumerate() {
                entries.push(TimeEntry {
                    description: format!("{} - Part {}", enricher.describe(session), idx + 1),
                    start: session.start,
                    end: session.end,
                    duration_ms: session.duration_ms(),
                    project: session.project.clone().or_else(|| block.project.clone()),
                    service: session.service.clone(),
                });
            }
        } else {
            let session = block.to_session();
            entries.push(TimeEntry {
                description: enricher.describe(&session),
                start: block.start,
                end: block.end,
                duration_ms: block.duration_ms(),
                project: block.project.clone(),
                service: session.service,
            });
        }
    }
    entries
}
