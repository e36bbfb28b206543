//! Error types shared by the pipeline stages and adapters.

use thiserror::Error;

/// Invalid configuration values for a pipeline stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration that must be non-negative was negative.
    #[error("{field} cannot be negative, got {value_ms} ms")]
    NegativeDuration { field: &'static str, value_ms: i64 },

    /// A synthetic duration exceeds the gap threshold, which would let
    /// consecutive sessions overlap.
    #[error("{field} ({value_ms} ms) cannot exceed max_gap ({max_gap_ms} ms)")]
    ExceedsGap {
        field: &'static str,
        value_ms: i64,
        max_gap_ms: i64,
    },

    /// A duration beyond the supported bound.
    #[error("{field} ({value_ms} ms) cannot exceed {max_ms} ms")]
    TooLarge {
        field: &'static str,
        value_ms: i64,
        max_ms: i64,
    },
}

/// Failures while reading an activity source.
///
/// Only `Unavailable` and the command/backend variants are whole-source
/// failures; `Malformed` describes a single skipped record.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed record at {position}: {reason}")]
    Malformed { position: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("`{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("backend error: {message}")]
    Backend { message: String },
}

impl SourceError {
    /// Wraps an error from a storage backend (e.g. `SQLite`).
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}
