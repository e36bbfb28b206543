//! Optional enrichment of sessions with human-readable descriptions.
//!
//! Enrichment only reads session excerpts; nothing downstream depends on it.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Fallback description when nothing could be extracted.
pub const DEFAULT_DESCRIPTION: &str = "Development work";

/// Deliverables shorter than this are noise ("it", "the bug").
const MIN_DELIVERABLE_LENGTH: usize = 10;

/// Deliverables joined into one description.
const MAX_DESCRIBED: usize = 2;

/// Produces a short description of the work in a session.
pub trait Enricher: Send + Sync {
    fn describe(&self, session: &Session) -> String;
}

/// Enricher that always returns [`DEFAULT_DESCRIPTION`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl Enricher for NoEnrichment {
    fn describe(&self, _session: &Session) -> String {
        DEFAULT_DESCRIPTION.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableKind {
    Feature,
    BugFix,
    Refactor,
    Documentation,
}

impl DeliverableKind {
    const fn verb(self) -> &'static str {
        match self {
            Self::Feature => "Implemented",
            Self::BugFix => "Fixed",
            Self::Refactor => "Refactored",
            Self::Documentation => "Documented",
        }
    }
}

/// A unit of work recognized in free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub kind: DeliverableKind,
    pub subject: String,
}

impl fmt::Display for Deliverable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.verb(), self.subject)
    }
}

static PATTERNS: LazyLock<Vec<(DeliverableKind, Regex)>> = LazyLock::new(|| {
    let table: &[(DeliverableKind, &str)] = &[
        (DeliverableKind::Feature, r"implement(?:ed)?\s+(.+?)(?:\.|,|$)"),
        (DeliverableKind::Feature, r"add(?:ed)?\s+(.+?)\s+(?:feature|functionality|support)"),
        (DeliverableKind::Feature, r"creat(?:ed|ing)?\s+(.+?)\s+(?:component|system|module)"),
        (DeliverableKind::Feature, r"built\s+(.+?)\s+(?:integration|tool|utility)"),
        (DeliverableKind::BugFix, r"fix(?:ed)?\s+(.+?)\s+(?:bug|issue|error|problem)"),
        (DeliverableKind::BugFix, r"resolv(?:ed|ing)?\s+(.+?)\s+(?:error|issue)"),
        (DeliverableKind::Refactor, r"refactor(?:ed|ing)?\s+(.+?)(?:\.|,|$)"),
        (DeliverableKind::Refactor, r"optimiz(?:ed|ing)?\s+(.+?)(?:\.|,|$)"),
        (DeliverableKind::Refactor, r"migrat(?:ed|ing)?\s+(.+?\s+to\s+.+?)(?:\.|,|$)"),
        (DeliverableKind::Documentation, r"document(?:ed|ing)?\s+(.+?)(?:\.|,|$)"),
        (DeliverableKind::Documentation, r"creat(?:ed|ing)?\s+(.+?)\s+(?:guide|tutorial|readme)"),
    ];
    table
        .iter()
        .map(|(kind, pattern)| (*kind, Regex::new(&format!("(?i){pattern}")).unwrap()))
        .collect()
});

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Regex-based deliverable extraction from session excerpts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliverableExtractor;

impl DeliverableExtractor {
    /// Finds deliverables in `text`, skipping short and duplicate subjects.
    pub fn extract(&self, text: &str) -> Vec<Deliverable> {
        let mut seen = HashSet::new();
        self.extract_into(text, &mut seen)
    }

    fn extract_into(&self, text: &str, seen: &mut HashSet<String>) -> Vec<Deliverable> {
        let lowered = text.to_lowercase();
        let mut found = Vec::new();

        for (kind, re) in PATTERNS.iter() {
            for caps in re.captures_iter(&lowered) {
                let Some(raw) = caps.get(1) else { continue };
                let subject = WHITESPACE_RE
                    .replace_all(raw.as_str().trim(), " ")
                    .trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':'))
                    .to_string();

                if subject.chars().count() < MIN_DELIVERABLE_LENGTH || !seen.insert(subject.clone()) {
                    continue;
                }
                found.push(Deliverable {
                    kind: *kind,
                    subject,
                });
            }
        }
        found
    }

    /// Deliverables across all excerpts of a session, deduplicated.
    pub fn session_deliverables(&self, session: &Session) -> Vec<Deliverable> {
        let mut seen = HashSet::new();
        session
            .excerpts
            .iter()
            .flat_map(|excerpt| self.extract_into(excerpt, &mut seen))
            .collect()
    }
}

impl Enricher for DeliverableExtractor {
    fn describe(&self, session: &Session) -> String {
        let deliverables = self.session_deliverables(session);
        if deliverables.is_empty() {
            return DEFAULT_DESCRIPTION.to_string();
        }
        deliverables
            .iter()
            .take(MAX_DESCRIBED)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
