//! Configuration loading and management.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use tl_core::{
    AttributionConfig, MergeConfig, PipelineConfig, ReportConfig, SessionConfig, TieBreak,
};
use tl_sources::{ClaudeLogSource, CursorSource, GitSource};

const MINUTE_MS: i64 = 60_000;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Claude Code data directory (holds `projects/`).
    pub claude_dir: PathBuf,
    /// Cursor user data directory (holds `User/globalStorage`).
    pub cursor_dir: PathBuf,
    pub repositories: Repositories,
    /// Project names preferred when they appear in a path.
    pub known_projects: Vec<String>,
    pub sessions: SessionSettings,
    pub merge_gap_minutes: i64,
    pub attribution: AttributionSettings,
    pub git_timeout_secs: u64,
    /// Ignore editor state older than this many days; `0` keeps everything.
    pub editor_recency_days: i64,
    /// Services whose own project hint overrides commit attribution.
    pub trust_hint_services: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repositories {
    /// Local clones by short name.
    pub local: BTreeMap<String, PathBuf>,
    /// GitHub repositories as `owner/name`.
    pub github: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapSettings {
    pub max_gap_minutes: i64,
}

impl Default for GapSettings {
    fn default() -> Self {
        Self {
            max_gap_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointMinutes {
    pub message: i64,
    pub file_activity: i64,
    pub commit: i64,
}

impl Default for PointMinutes {
    fn default() -> Self {
        Self {
            message: 5,
            file_activity: 5,
            commit: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub assistant: GapSettings,
    pub editor: GapSettings,
    pub vcs: GapSettings,
    pub trailing_buffer_minutes: i64,
    pub point_minutes: PointMinutes,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            assistant: GapSettings::default(),
            editor: GapSettings::default(),
            vcs: GapSettings::default(),
            trailing_buffer_minutes: 3,
            point_minutes: PointMinutes::default(),
        }
    }
}

impl SessionSettings {
    fn session_config(&self, gap: &GapSettings) -> SessionConfig {
        SessionConfig {
            max_gap_ms: minutes_to_ms(gap.max_gap_minutes),
            trailing_buffer_ms: minutes_to_ms(self.trailing_buffer_minutes),
            message_duration_ms: minutes_to_ms(self.point_minutes.message),
            file_activity_duration_ms: minutes_to_ms(self.point_minutes.file_activity),
            commit_duration_ms: minutes_to_ms(self.point_minutes.commit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionSettings {
    pub hours_before: i64,
    pub hours_after: i64,
    pub tie_break: TieBreak,
}

impl Default for AttributionSettings {
    fn default() -> Self {
        let core = AttributionConfig::default();
        Self {
            hours_before: core.hours_before,
            hours_after: core.hours_after,
            tie_break: core.tie_break,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let cursor_dir = dirs::config_dir()
            .map_or_else(|| home.join(".config/Cursor"), |p| p.join("Cursor"));
        Self {
            claude_dir: home.join(".claude"),
            cursor_dir,
            repositories: Repositories::default(),
            known_projects: Vec::new(),
            sessions: SessionSettings::default(),
            merge_gap_minutes: 15,
            attribution: AttributionSettings::default(),
            git_timeout_secs: 10,
            editor_recency_days: 30,
            trust_hint_services: vec!["Claude".to_string()],
        }
    }
}

/// The configured adapters.
#[derive(Debug)]
pub struct Sources {
    pub claude: ClaudeLogSource,
    pub cursor: CursorSource,
    pub git: GitSource,
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // TL_SESSIONS__ASSISTANT__MAX_GAP_MINUTES=20 and friends
        figment = figment.merge(Env::prefixed("TL_").split("__"));

        figment.extract()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            assistant: self.sessions.session_config(&self.sessions.assistant),
            editor: self.sessions.session_config(&self.sessions.editor),
            vcs: self.sessions.session_config(&self.sessions.vcs),
            merge: MergeConfig {
                merge_gap_ms: minutes_to_ms(self.merge_gap_minutes),
            },
            attribution: AttributionConfig {
                hours_before: self.attribution.hours_before,
                hours_after: self.attribution.hours_after,
                tie_break: self.attribution.tie_break,
            },
            report: ReportConfig {
                trust_hint_services: self.trust_hint_services.clone(),
            },
        }
    }

    pub fn sources(&self) -> Sources {
        let claude =
            ClaudeLogSource::with_known_projects(&self.claude_dir, self.known_projects.clone());

        let recency = (self.editor_recency_days > 0).then_some(self.editor_recency_days);
        let cursor = CursorSource::new(&self.cursor_dir)
            .with_recency_days(recency)
            .with_known_projects(self.known_projects.clone());

        let mut git = GitSource::new().with_timeout(Duration::from_secs(self.git_timeout_secs));
        for (name, path) in &self.repositories.local {
            git = git.with_local(name, path);
        }
        for slug in &self.repositories.github {
            git = git.with_github(slug);
        }

        Sources { claude, cursor, git }
    }
}

const fn minutes_to_ms(minutes: i64) -> i64 {
    minutes.saturating_mul(MINUTE_MS)
}

/// Returns the platform-specific config directory for tl.
///
/// On Linux: `~/.config/tl`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tl"))
}
