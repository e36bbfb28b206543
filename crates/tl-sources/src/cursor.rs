//! Cursor editor adapter.
//!
//! Cursor keeps no explicit activity log, so two signals are combined:
//! - modification times of the global and per-workspace `state.vscdb` files
//!   (and their `.backup` copies), as file-activity events
//! - `composerData:*` rows in the global database, whose `createdAt` and
//!   `lastUpdatedAt` fields mark conversation activity

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;
use tl_core::hint::{Chain, HintStrategy, KnownProjects, PathBasename};
use tl_core::{
    EventKind, EventSource, Origin, RawEvent, SourceError, TimeRange, timestamp_from_epoch,
};

const STATE_DB: &str = "state.vscdb";
const BACKUP_DB: &str = "state.vscdb.backup";

/// Default cutoff for modification-time activity.
pub const DEFAULT_RECENCY_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
struct WorkspaceFile {
    folder: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComposerData {
    created_at: Option<i64>,
    last_updated_at: Option<i64>,
    name: Option<String>,
}

/// Cursor activity under its user-data directory (e.g. `~/.config/Cursor`).
pub struct CursorSource {
    cursor_dir: PathBuf,
    recency: Option<Duration>,
    hints: Chain,
}

impl std::fmt::Debug for CursorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorSource")
            .field("cursor_dir", &self.cursor_dir)
            .field("recency", &self.recency)
            .finish_non_exhaustive()
    }
}

impl CursorSource {
    pub fn new(cursor_dir: impl Into<PathBuf>) -> Self {
        Self {
            cursor_dir: cursor_dir.into(),
            recency: Some(Duration::days(DEFAULT_RECENCY_DAYS)),
            hints: Chain::new().then(PathBasename),
        }
    }

    /// Ignore file modification times older than `days`; `None` keeps all.
    #[must_use]
    pub fn with_recency_days(mut self, days: Option<i64>) -> Self {
        self.recency = days.map(Duration::days);
        self
    }

    #[must_use]
    pub fn with_known_projects(
        mut self,
        known: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.hints = Chain::new()
            .then(KnownProjects::new(known))
            .then(PathBasename);
        self
    }

    pub fn cursor_dir(&self) -> &Path {
        &self.cursor_dir
    }

    fn global_storage(&self) -> PathBuf {
        self.cursor_dir.join("User").join("globalStorage")
    }

    fn workspace_storage(&self) -> PathBuf {
        self.cursor_dir.join("User").join("workspaceStorage")
    }

    /// Every workspace directory that contains a state database.
    fn workspace_dirs(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.workspace_storage()) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.join(STATE_DB).is_file())
            .collect();
        dirs.sort();
        dirs
    }

    fn workspace_hint(&self, workspace_dir: &Path) -> Option<String> {
        let path = workspace_dir.join("workspace.json");
        let raw = std::fs::read_to_string(&path).ok()?;
        let parsed: WorkspaceFile = match serde_json::from_str(&raw) {
            Ok(w) => w,
            Err(e) => {
                tracing::debug!(path = ?path, error = %e, "unreadable workspace.json");
                return None;
            }
        };
        let folder = parsed.folder?;
        let folder = folder.strip_prefix("file://").unwrap_or(&folder);
        self.hints.infer(folder)
    }

    /// File-activity events from database modification times.
    fn mtime_events(&self, range: &TimeRange) -> Vec<RawEvent> {
        let cutoff = self.recency.map(|r| Utc::now() - r);
        let mut candidates: Vec<(PathBuf, Option<String>)> = Vec::new();

        let global = self.global_storage();
        candidates.push((global.join(STATE_DB), None));
        candidates.push((global.join(BACKUP_DB), None));

        for dir in self.workspace_dirs() {
            let hint = self.workspace_hint(&dir);
            candidates.push((dir.join(STATE_DB), hint.clone()));
            candidates.push((dir.join(BACKUP_DB), hint));
        }

        candidates
            .into_iter()
            .filter_map(|(path, hint)| {
                let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                let timestamp = DateTime::<Utc>::from(modified);
                if cutoff.is_some_and(|c| timestamp < c) || !range.contains(timestamp) {
                    return None;
                }
                tracing::trace!(path = ?path, %timestamp, "database activity");
                Some(
                    RawEvent::new(timestamp, Origin::Editor, EventKind::FileActivity)
                        .with_project_hint(hint),
                )
            })
            .collect()
    }

    /// Conversation events from the global database.
    fn conversation_events(&self, range: &TimeRange) -> Result<Vec<RawEvent>, SourceError> {
        let db_path = self.global_storage().join(STATE_DB);
        if !db_path.is_file() {
            return Ok(Vec::new());
        }
        read_composer_rows(&db_path).map(|rows| {
            rows.into_iter()
                .filter(|e| range.contains(e.timestamp))
                .collect()
        })
    }
}

/// Reads composer timestamps from a Cursor state database (read-only).
///
/// A database without the `cursorDiskKV` table yields no events.
pub fn read_composer_rows(db_path: &Path) -> Result<Vec<RawEvent>, SourceError> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(SourceError::backend)?;

    let has_table: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'cursorDiskKV')",
            [],
            |row| row.get(0),
        )
        .map_err(SourceError::backend)?;
    if !has_table {
        tracing::debug!(path = ?db_path, "no cursorDiskKV table");
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare("SELECT key, value FROM cursorDiskKV WHERE key LIKE 'composerData:%'")
        .map_err(SourceError::backend)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Value>(1)?)))
        .map_err(SourceError::backend)?;

    let mut events = Vec::new();
    for row in rows {
        let (key, value) = match row {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable cursorDiskKV row");
                continue;
            }
        };

        let parsed = match &value {
            Value::Text(text) => serde_json::from_str::<ComposerData>(text),
            Value::Blob(bytes) => serde_json::from_slice::<ComposerData>(bytes),
            _ => continue,
        };
        let data = match parsed {
            Ok(d) => d,
            Err(e) => {
                let err = SourceError::Malformed {
                    position: key,
                    reason: e.to_string(),
                };
                tracing::trace!(error = %err, "skipping composer row");
                continue;
            }
        };

        let mut stamps: Vec<DateTime<Utc>> = [data.created_at, data.last_updated_at]
            .into_iter()
            .flatten()
            .filter_map(timestamp_from_epoch)
            .collect();
        stamps.dedup();

        for timestamp in stamps {
            let mut event = RawEvent::new(timestamp, Origin::Editor, EventKind::Message);
            if let Some(name) = &data.name {
                event = event.with_content(name.clone());
            }
            events.push(event);
        }
    }

    Ok(events)
}

impl EventSource for CursorSource {
    fn name(&self) -> &str {
        "Cursor"
    }

    fn origin(&self) -> Origin {
        Origin::Editor
    }

    fn is_available(&self) -> bool {
        self.global_storage().join(STATE_DB).is_file() || !self.workspace_dirs().is_empty()
    }

    fn extract_events(&self, range: &TimeRange) -> Result<Vec<RawEvent>, SourceError> {
        if !self.is_available() {
            return Err(SourceError::Unavailable(format!(
                "no Cursor state databases under {}",
                self.cursor_dir.display()
            )));
        }

        let mut events = self.mtime_events(range);
        match self.conversation_events(range) {
            Ok(rows) => events.extend(rows),
            Err(e) => tracing::warn!(error = %e, "could not read Cursor conversations"),
        }

        events.sort_by_key(|e| e.timestamp);
        tracing::debug!(count = events.len(), "extracted Cursor activity");
        Ok(events)
    }
}
