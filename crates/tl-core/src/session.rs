//! Session reconstruction from one source's raw events.
//!
//! # Algorithm
//!
//! 1. Stable-sort events by timestamp
//! 2. Start a new group when the gap to the previous event exceeds `max_gap`
//! 3. Multi-event groups span first..last plus a trailing buffer
//! 4. Single-event groups get a synthetic duration based on the event kind
//!
//! Groups are split by gaps only, never by absolute length.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::{EventKind, Metrics, RawEvent};

/// Maximum number of content excerpts kept per session.
pub(crate) const MAX_EXCERPTS: usize = 20;

/// Maximum length of each excerpt (bytes).
pub(crate) const MAX_EXCERPT_LENGTH: usize = 2000;

/// Upper bound for any configured duration (366 days).
pub(crate) const MAX_DURATION_MS: i64 = 366 * 24 * 3_600_000;

/// Configuration for the session builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Events further apart than this start a new session.
    /// Default: 900000 (15 minutes).
    pub max_gap_ms: i64,

    /// Added after the last event of a multi-event session, since the last
    /// observed event understates the real end of work.
    /// Default: 180000 (3 minutes).
    pub trailing_buffer_ms: i64,

    /// Duration of a lone message event. Default: 300000 (5 minutes).
    pub message_duration_ms: i64,

    /// Duration of a lone file-activity event. Default: 300000 (5 minutes).
    pub file_activity_duration_ms: i64,

    /// Duration of a lone commit. Default: 60000 (1 minute).
    pub commit_duration_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_gap_ms: 900_000,                // 15 minutes
            trailing_buffer_ms: 180_000,        // 3 minutes
            message_duration_ms: 300_000,       // 5 minutes
            file_activity_duration_ms: 300_000, // 5 minutes
            commit_duration_ms: 60_000,         // 1 minute
        }
    }
}

impl SessionConfig {
    /// Synthetic duration for a single event of the given kind.
    pub const fn point_duration_ms(&self, kind: EventKind) -> i64 {
        match kind {
            EventKind::Message => self.message_duration_ms,
            EventKind::FileActivity => self.file_activity_duration_ms,
            EventKind::Commit => self.commit_duration_ms,
        }
    }

    /// Checks that durations are non-negative and no synthetic extension can
    /// reach the next session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("max_gap", self.max_gap_ms),
            ("trailing_buffer", self.trailing_buffer_ms),
            ("message_duration", self.message_duration_ms),
            ("file_activity_duration", self.file_activity_duration_ms),
            ("commit_duration", self.commit_duration_ms),
        ];

        for (field, value_ms) in fields {
            if value_ms < 0 {
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

        for &(field, value_ms) in &fields[1..] {
            if value_ms > self.max_gap_ms {
                return Err(ConfigError::ExceedsGap {
                    field,
                    value_ms,
                    max_gap_ms: self.max_gap_ms,
                });
            }
        }

        Ok(())
    }
}

/// A contiguous interval of activity from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Service that produced the session (e.g. "Claude", "Cursor", "Git").
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub metrics: Metrics,
    /// Bounded free-text content for enrichment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excerpts: Vec<String>,
}

impl Session {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }

    /// Returns `true` if the two sessions share any instant.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Truncate an excerpt to `MAX_EXCERPT_LENGTH`, adding "..." if truncated.
pub(crate) fn truncate_excerpt(content: &str) -> String {
    if content.len() <= MAX_EXCERPT_LENGTH {
        return content.to_string();
    }

    // Find a safe UTF-8 boundary
    let mut end = MAX_EXCERPT_LENGTH;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &content[..end])
}

/// Groups raw events into sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Creates a builder after validating `config`.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Builds sessions for `service` from its events, in any order.
    ///
    /// The output is sorted by `start` and never overlaps.
    pub fn build(&self, service: &str, mut events: Vec<RawEvent>) -> Vec<Session> {
        // Stable: ties keep source order
        events.sort_by_key(|e| e.timestamp);

        let mut sessions = Vec::new();
        let mut group: Vec<RawEvent> = Vec::new();

        for event in events {
            let starts_new_group = group.last().is_some_and(|last| {
                let gap_ms = (event.timestamp - last.timestamp).num_milliseconds();
                gap_ms > self.config.max_gap_ms
            });

            if starts_new_group {
                sessions.extend(self.close_group(service, std::mem::take(&mut group)));
            }
            group.push(event);
        }

        sessions.extend(self.close_group(service, group));

        sessions
    }

    /// Turns a sorted group into a session; `None` for an empty group.
    fn close_group(&self, service: &str, group: Vec<RawEvent>) -> Option<Session> {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            return None;
        };
        let (first, last) = (first.timestamp, last.timestamp);

        let min_duration_ms = group
            .iter()
            .map(|e| self.config.point_duration_ms(e.payload.kind))
            .max()
            .unwrap_or(0);
        let min_end = first + Duration::milliseconds(min_duration_ms);

        let end = if group.len() == 1 {
            min_end
        } else {
            (last + Duration::milliseconds(self.config.trailing_buffer_ms)).max(min_end)
        };

        let mut metrics = Metrics::default();
        let mut project = None;
        let mut excerpts = Vec::new();

        for event in &group {
            metrics.absorb(&event.payload.metrics);
            if project.is_none() {
                project.clone_from(&event.project_hint);
            }
            if excerpts.len() < MAX_EXCERPTS {
                if let Some(content) = &event.payload.content {
                    excerpts.push(truncate_excerpt(content));
                }
            }
        }
        metrics.interaction_count = group.len() as u64;

        Some(Session {
            start: first,
            end,
            service: service.to_string(),
            project,
            metrics,
            excerpts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Origin;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 29, h, m, 0).unwrap()
    }

    fn message(h: u32, m: u32) -> RawEvent {
        RawEvent::new(at(h, m), Origin::Assistant, EventKind::Message)
    }

    fn builder() -> SessionBuilder {
        SessionBuilder::new(SessionConfig::default()).unwrap()
    }

    /// Small deterministic generator so property checks don't need extra crates.
    fn pseudo_random_minutes(seed: u64, count: usize) -> Vec<i64> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                i64::try_from((state >> 33) % 600).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_two_events_within_gap_form_one_session_with_buffer() {
        let sessions = builder().build("Claude", vec![message(10, 10), message(10, 0)]);

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].start, at(10, 0));
        assert_eq!(sessions[0].end, at(10, 13));
        assert_eq!(sessions[0].metrics.interaction_count, 2);
    }

    #[test]
    fn test_gap_exactly_at_threshold_continues_group() {
        let sessions = builder().build("Claude", vec![message(10, 0), message(10, 15)]);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].end, at(10, 18));
    }

    #[test]
    fn test_gap_beyond_threshold_splits() {
        let sessions = builder().build("Claude", vec![message(10, 0), message(10, 16)]);

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].start, at(10, 0));
        assert_eq!(sessions[0].end, at(10, 5));
        assert_eq!(sessions[1].start, at(10, 16));
        assert_eq!(sessions[1].end, at(10, 21));
    }

    #[test]
    fn test_single_event_durations_depend_on_kind() {
        let commit = RawEvent::new(at(9, 0), Origin::Vcs, EventKind::Commit);
        let save = RawEvent::new(at(12, 0), Origin::Editor, EventKind::FileActivity);

        let sessions = builder().build("mixed", vec![save, commit]);

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].duration_ms(), 60_000);
        assert_eq!(sessions[1].duration_ms(), 300_000);
    }

    #[test]
    fn test_close_events_still_get_minimum_duration() {
        let a = message(10, 0);
        let mut b = message(10, 0);
        b.timestamp += Duration::seconds(20);

        let sessions = builder().build("Claude", vec![a, b]);

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_ms(), 300_000);
    }

    #[test]
    fn test_long_continuous_activity_is_not_split() {
        // Ten hours of messages every ten minutes
        let events: Vec<_> = (0..60)
            .map(|i| {
                RawEvent::new(
                    at(8, 0) + Duration::minutes(i * 10),
                    Origin::Assistant,
                    EventKind::Message,
                )
            })
            .collect();

        let sessions = builder().build("Claude", events);

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].metrics.interaction_count, 60);
    }

    #[test]
    fn test_empty_input_yields_no_sessions() {
        assert!(builder().build("Claude", Vec::new()).is_empty());
    }

    #[test]
    fn test_sums_token_metrics_and_extra_numbers() {
        let metrics = Metrics {
            input_tokens: 100,
            output_tokens: 40,
            ..Metrics::default()
        }
        .with_number("tool_calls", 2.0);
        let a = message(10, 0).with_metrics(metrics.clone());
        let b = message(10, 5).with_metrics(metrics);

        let sessions = builder().build("Claude", vec![a, b]);

        let m = &sessions[0].metrics;
        assert_eq!(m.input_tokens, 200);
        assert_eq!(m.output_tokens, 80);
        assert_eq!(m.extra["tool_calls"], crate::event::MetricValue::Number(4.0));
    }

    #[test]
    fn test_project_is_earliest_non_empty_hint() {
        let a = message(10, 0);
        let b = message(10, 5).with_project_hint(Some("ledger".into()));
        let c = message(10, 10).with_project_hint(Some("billing".into()));

        let sessions = builder().build("Claude", vec![c, b, a]);

        assert_eq!(sessions[0].project.as_deref(), Some("ledger"));
    }

    #[test]
    fn test_excerpts_are_bounded() {
        let events: Vec<_> = (0..30)
            .map(|i| {
                RawEvent::new(
                    at(10, 0) + Duration::minutes(i),
                    Origin::Assistant,
                    EventKind::Message,
                )
                .with_content("x".repeat(3000))
            })
            .collect();

        let sessions = builder().build("Claude", events);

        assert_eq!(sessions[0].excerpts.len(), MAX_EXCERPTS);
        assert!(sessions[0].excerpts[0].ends_with("..."));
        assert!(sessions[0].excerpts[0].len() <= MAX_EXCERPT_LENGTH + 3);
    }

    #[test]
    fn test_truncate_excerpt_utf8_boundary() {
        let emoji_string = "😀".repeat(1000);
        let truncated = truncate_excerpt(&emoji_string);

        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= MAX_EXCERPT_LENGTH + 3);
    }

    #[test]
    fn test_sessions_sorted_and_non_overlapping_for_generated_inputs() {
        for seed in 0..50 {
            let events: Vec<_> = pseudo_random_minutes(seed, 40)
                .into_iter()
                .enumerate()
                .map(|(i, minute)| {
                    let kind = match i % 3 {
                        0 => EventKind::Message,
                        1 => EventKind::FileActivity,
                        _ => EventKind::Commit,
                    };
                    RawEvent::new(at(0, 0) + Duration::minutes(minute), Origin::Editor, kind)
                })
                .collect();

            let sessions = builder().build("gen", events);

            for pair in sessions.windows(2) {
                assert!(pair[0].start <= pair[1].start, "seed {seed}: unsorted");
                assert!(!pair[0].overlaps(&pair[1]), "seed {seed}: overlap");
            }
            for s in &sessions {
                assert!(s.end >= s.start);
                assert!(s.duration_ms() >= 60_000, "seed {seed}: below minimum");
            }
            let total: u64 = sessions.iter().map(|s| s.metrics.interaction_count).sum();
            assert_eq!(total, 40);
        }
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let config = SessionConfig {
            trailing_buffer_ms: -1,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NegativeDuration {
                field: "trailing_buffer",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_durations_longer_than_gap() {
        let config = SessionConfig {
            max_gap_ms: 120_000,
            ..SessionConfig::default()
        };
        let err = SessionBuilder::new(config).unwrap_err();
        assert!(matches!(err, ConfigError::ExceedsGap { field: "trailing_buffer", .. }));
    }

    #[test]
    fn test_empty_group_closes_to_nothing() {
        let builder = SessionBuilder::new(SessionConfig::default()).unwrap();
        assert!(builder.close_group("Claude", Vec::new()).is_none());
    }

    #[test]
    fn test_validate_rejects_saturated_durations() {
        let config = SessionConfig {
            max_gap_ms: i64::MAX,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooLarge { field: "max_gap", .. })
        ));
    }
}
