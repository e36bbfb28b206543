//! Claude Code transcript adapter.
//!
//! Reads `projects/<encoded-dir>/*.jsonl` and `<session>/subagents/*.jsonl`.
//! Each user or assistant line with a valid timestamp becomes a message event.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Deserialize;
use tl_core::hint::{Chain, EncodedDirName, HintStrategy, KnownProjects, PathBasename};
use tl_core::{
    EventKind, EventSource, Metrics, Origin, RawEvent, SourceError, TimeRange, parse_timestamp,
};

/// Buffer size for `BufReader` (64KB for optimal performance on large files)
const BUFFER_SIZE: usize = 64 * 1024;

/// Minimal struct for typed deserialization (faster than `serde_json::Value`)
#[derive(Debug, Deserialize)]
struct TranscriptLine {
    #[serde(rename = "type")]
    line_type: Option<String>,
    cwd: Option<String>,
    timestamp: Option<String>,
    message: Option<MessageBody>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    model: Option<String>,
    content: Option<MessageContent>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

/// Message content can be a string or an array of content blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A content block in a message (text, `tool_use`, etc.).
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: Option<String>,
    text: Option<String>,
}

impl MessageContent {
    fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.block_type.as_deref() == Some("text"))
                .filter_map(|b| b.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn tool_calls(&self) -> usize {
        match self {
            Self::Text(_) => 0,
            Self::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.block_type.as_deref() == Some("tool_use"))
                .count(),
        }
    }
}

/// Check if a line might contain relevant data (pre-filter before JSON parse)
fn might_be_relevant(line: &str) -> bool {
    line.contains("\"timestamp\"") && line.contains("\"type\"")
}

/// A transcript file plus the encoded project directory it lives under.
#[derive(Debug)]
struct TranscriptFile {
    path: PathBuf,
    project_dir: Option<String>,
}

/// Claude Code session transcripts under `<claude_dir>/projects`.
pub struct ClaudeLogSource {
    projects_dir: PathBuf,
    hints: Chain,
}

impl std::fmt::Debug for ClaudeLogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeLogSource")
            .field("projects_dir", &self.projects_dir)
            .finish_non_exhaustive()
    }
}

impl ClaudeLogSource {
    pub fn new(claude_dir: impl AsRef<Path>) -> Self {
        Self::with_known_projects(claude_dir, Vec::<String>::new())
    }

    /// Prefers configured project names when they appear in a path.
    pub fn with_known_projects(
        claude_dir: impl AsRef<Path>,
        known: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            projects_dir: claude_dir.as_ref().join("projects"),
            hints: Chain::new()
                .then(KnownProjects::new(known))
                .then(EncodedDirName)
                .then(PathBasename),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    fn transcript_files(&self) -> Result<Vec<TranscriptFile>, SourceError> {
        let mut files = Vec::new();

        for project_entry in std::fs::read_dir(&self.projects_dir)? {
            let project_path = project_entry?.path();
            if !project_path.is_dir() {
                continue;
            }
            let project_dir = project_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(String::from);

            for entry in std::fs::read_dir(&project_path)?.flatten() {
                let path = entry.path();
                if is_jsonl(&path) {
                    files.push(TranscriptFile {
                        path,
                        project_dir: project_dir.clone(),
                    });
                } else if path.is_dir() {
                    let Ok(subagents) = std::fs::read_dir(path.join("subagents")) else {
                        continue;
                    };
                    files.extend(
                        subagents
                            .flatten()
                            .map(|e| e.path())
                            .filter(|p| is_jsonl(p))
                            .map(|path| TranscriptFile {
                                path,
                                project_dir: project_dir.clone(),
                            }),
                    );
                }
            }
        }

        Ok(files)
    }
}

fn is_jsonl(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == "jsonl")
}

/// Parses one transcript into message events within `range`.
///
/// Malformed lines are logged and skipped. The project hint comes from the
/// line's `cwd` (or the last one seen), falling back to the directory name.
pub fn parse_transcript(
    path: &Path,
    project_dir: Option<&str>,
    hints: &dyn HintStrategy,
    range: &TimeRange,
) -> Result<Vec<RawEvent>, SourceError> {
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(BUFFER_SIZE, file);

    let dir_hint = project_dir.and_then(|d| hints.infer(d));
    let mut cwd_hint: Option<String> = None;
    let mut events = Vec::new();

    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let position = || format!("{}:{}", path.display(), idx + 1);
        let line = match String::from_utf8(bytes?) {
            Ok(line) => line,
            Err(e) => {
                let err = SourceError::Malformed {
                    position: position(),
                    reason: e.to_string(),
                };
                tracing::debug!(error = %err, "skipping transcript line");
                continue;
            }
        };
        if line.len() < 10 || !might_be_relevant(&line) {
            continue;
        }

        let record: TranscriptLine = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                let err = SourceError::Malformed {
                    position: position(),
                    reason: e.to_string(),
                };
                tracing::trace!(error = %err, "skipping transcript line");
                continue;
            }
        };

        if let Some(cwd) = record.cwd.as_deref() {
            if let Some(hint) = hints.infer(cwd) {
                cwd_hint = Some(hint);
            }
        }

        if !matches!(record.line_type.as_deref(), Some("user" | "assistant")) {
            continue;
        }

        let Some(timestamp) = record.timestamp.as_deref().and_then(parse_timestamp) else {
            let err = SourceError::Malformed {
                position: position(),
                reason: format!("invalid timestamp {:?}", record.timestamp),
            };
            tracing::debug!(error = %err, "skipping transcript line");
            continue;
        };
        if !range.contains(timestamp) {
            continue;
        }

        let mut event = RawEvent::new(timestamp, Origin::Assistant, EventKind::Message)
            .with_project_hint(cwd_hint.clone().or_else(|| dir_hint.clone()));

        if let Some(message) = record.message {
            let mut metrics = Metrics::default();
            if let Some(usage) = &message.usage {
                metrics.input_tokens = usage.input_tokens.unwrap_or(0);
                metrics.output_tokens = usage.output_tokens.unwrap_or(0);
            }
            if let Some(content) = &message.content {
                let tool_calls = content.tool_calls();
                if tool_calls > 0 {
                    #[allow(clippy::cast_precision_loss)]
                    let tool_calls = tool_calls as f64;
                    metrics = metrics.with_number("tool_calls", tool_calls);
                }
                event = event.with_content(content.text());
            }
            if let Some(model) = message.model {
                metrics = metrics.with_text("model", model);
            }
            event = event.with_metrics(metrics);
        }

        events.push(event);
    }

    Ok(events)
}

impl EventSource for ClaudeLogSource {
    fn name(&self) -> &str {
        "Claude"
    }

    fn origin(&self) -> Origin {
        Origin::Assistant
    }

    fn is_available(&self) -> bool {
        std::fs::read_dir(&self.projects_dir).is_ok_and(|mut entries| entries.next().is_some())
    }

    fn extract_events(&self, range: &TimeRange) -> Result<Vec<RawEvent>, SourceError> {
        if !self.projects_dir.exists() {
            return Err(SourceError::Unavailable(format!(
                "{} does not exist",
                self.projects_dir.display()
            )));
        }

        let files = self.transcript_files()?;
        tracing::debug!(files = files.len(), dir = ?self.projects_dir, "scanning transcripts");

        let mut events: Vec<RawEvent> = files
            .par_iter()
            .flat_map(|tf| {
                match parse_transcript(&tf.path, tf.project_dir.as_deref(), &self.hints, range) {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!(path = ?tf.path, error = %e, "skipping unreadable transcript");
                        Vec::new()
                    }
                }
            })
            .collect();

        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}
