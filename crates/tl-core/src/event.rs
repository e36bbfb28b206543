//! Raw activity events normalized from the various sources.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of tool produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// AI assistant session transcripts.
    Assistant,
    /// Editor activity (database modification times, conversation rows).
    Editor,
    /// Version-control history.
    Vcs,
}

impl Origin {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Editor => "editor",
            Self::Vcs => "vcs",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assistant" => Ok(Self::Assistant),
            "editor" => Ok(Self::Editor),
            "vcs" => Ok(Self::Vcs),
            _ => Err(format!("invalid origin: {s}")),
        }
    }
}

/// The type of activity a single record represents.
///
/// Determines the synthetic duration given to a session built from a lone event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A user or assistant message in a transcript.
    #[default]
    Message,
    /// A file save or editor database write.
    FileActivity,
    /// A version-control commit.
    Commit,
}

/// A metric value carried through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

/// Metrics accumulated on sessions and blocks.
///
/// The well-known counters are typed fields; anything source-specific goes
/// into `extra`. Numbers are summed when sessions merge, text keeps the first
/// value seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Number of raw events that contributed.
    #[serde(default)]
    pub interaction_count: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, MetricValue>,
}

impl Metrics {
    /// Adds a numeric extension metric. Non-finite values are dropped.
    #[must_use]
    pub fn with_number(mut self, key: impl Into<String>, value: f64) -> Self {
        if value.is_finite() {
            self.extra.insert(key.into(), MetricValue::Number(value));
        }
        self
    }

    /// Adds a text extension metric.
    #[must_use]
    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra
            .insert(key.into(), MetricValue::Text(value.into()));
        self
    }

    #[must_use]
    pub const fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Folds `other` into `self`.
    pub fn absorb(&mut self, other: &Self) {
        self.interaction_count = self
            .interaction_count
            .saturating_add(other.interaction_count);
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);

        for (key, value) in &other.extra {
            match (self.extra.get_mut(key), value) {
                (Some(MetricValue::Number(acc)), MetricValue::Number(n)) => *acc += n,
                // First text wins; mismatched types keep what we already have
                (Some(_), _) => {}
                (None, value) => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Source-specific content of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub kind: EventKind,
    /// Free text (prompt, commit message) used only by enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub metrics: Metrics,
}

/// A normalized activity record from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub timestamp: DateTime<Utc>,
    pub origin: Origin,
    /// Best-effort project label inferred by the adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_hint: Option<String>,
    #[serde(default)]
    pub payload: Payload,
}

impl RawEvent {
    /// Creates an event with an empty payload of the given kind.
    pub fn new(timestamp: DateTime<Utc>, origin: Origin, kind: EventKind) -> Self {
        Self {
            timestamp,
            origin,
            project_hint: None,
            payload: Payload {
                kind,
                ..Payload::default()
            },
        }
    }

    #[must_use]
    pub fn with_project_hint(mut self, hint: Option<String>) -> Self {
        self.project_hint = hint.filter(|h| !h.is_empty());
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.payload.content = (!content.is_empty()).then_some(content);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.payload.metrics = metrics;
        self
    }
}

/// Inclusive time range used to filter extraction. Open on missing ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub const fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// A range with no bounds.
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| ts >= s) && self.end.is_none_or(|e| ts <= e)
    }
}

/// Epoch values above this are milliseconds rather than seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Converts an epoch value (seconds or milliseconds) to UTC.
pub fn timestamp_from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() > EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

/// Parses a timestamp string and normalizes it to UTC.
///
/// Accepts RFC 3339 with any offset, naive ISO date-times (read as UTC), and
/// epoch seconds or milliseconds. Returns `None` for anything else.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(timestamp_from_epoch);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_rfc3339_with_offset_normalizes_to_utc() {
        let ts = parse_timestamp("2026-01-29T12:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 1, 29, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_zulu_with_fraction() {
        let ts = parse_timestamp("2026-01-29T10:58:45.000Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 1, 29, 10, 58, 45).unwrap());
    }

    #[test]
    fn test_parse_timestamp_naive_is_utc() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 29, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2026-01-29T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-01-29 10:00:00"), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_epoch_seconds_and_millis() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 19, 6, 12, 0).unwrap();
        let secs = expected.timestamp();
        assert_eq!(parse_timestamp(&secs.to_string()), Some(expected));
        assert_eq!(
            parse_timestamp(&(secs * 1000).to_string()),
            Some(expected)
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp("not-a-timestamp"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("29/01/2026"), None);
    }

    #[test]
    fn test_metrics_absorb_sums_numbers_and_keeps_first_text() {
        let mut a = Metrics {
            interaction_count: 2,
            input_tokens: 100,
            ..Metrics::default()
        }
        .with_number("lines", 10.0)
        .with_text("branch", "main");
        let b = Metrics {
            interaction_count: 3,
            input_tokens: 50,
            output_tokens: 7,
            ..Metrics::default()
        }
        .with_number("lines", 5.0)
        .with_number("files", 1.0)
        .with_text("branch", "feature");

        a.absorb(&b);

        assert_eq!(a.interaction_count, 5);
        assert_eq!(a.input_tokens, 150);
        assert_eq!(a.output_tokens, 7);
        assert_eq!(a.extra["lines"], MetricValue::Number(15.0));
        assert_eq!(a.extra["files"], MetricValue::Number(1.0));
        assert_eq!(a.extra["branch"], MetricValue::Text("main".into()));
    }

    #[test]
    fn test_metrics_drop_non_finite() {
        let m = Metrics::default().with_number("bad", f64::NAN);
        assert!(m.extra.is_empty());
    }

    #[test]
    fn test_time_range_inclusive_bounds() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let range = TimeRange::new(Some(start), Some(end));

        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + chrono::Duration::seconds(1)));
        assert!(TimeRange::unbounded().contains(start));
    }

    #[test]
    fn test_raw_event_drops_empty_hint_and_content() {
        let event = RawEvent::new(Utc::now(), Origin::Editor, EventKind::FileActivity)
            .with_project_hint(Some(String::new()))
            .with_content("");
        assert!(event.project_hint.is_none());
        assert!(event.payload.content.is_none());
    }

    #[test]
    fn test_origin_roundtrip() {
        for origin in [Origin::Assistant, Origin::Editor, Origin::Vcs] {
            let parsed: Origin = origin.as_str().parse().unwrap();
            assert_eq!(parsed, origin);
            let serde_value = serde_json::to_value(origin).unwrap();
            assert_eq!(serde_value.as_str().unwrap(), origin.as_str());
        }
    }
}
