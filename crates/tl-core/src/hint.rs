//! Project-hint inference from paths and other context strings.
//!
//! Hints are best-effort: every strategy may return `None`, and adapters can
//! swap strategies without touching merge or attribution logic.

use std::path::Path;

/// Common jj/git workspace directory names.
const WORKSPACE_NAMES: &[&str] = &["default", "main", "dev", "feature", "master"];

/// A pluggable rule mapping a raw path or context string to a project label.
pub trait HintStrategy: Send + Sync {
    fn infer(&self, context: &str) -> Option<String>;
}

impl<F> HintStrategy for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn infer(&self, context: &str) -> Option<String> {
        self(context)
    }
}

/// Uses the final path component, stepping over workspace directory names.
///
/// `/home/sami/time-tracker/default` yields `time-tracker`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathBasename;

impl HintStrategy for PathBasename {
    fn infer(&self, context: &str) -> Option<String> {
        let trimmed = context.trim_end_matches(['/', '\\']);
        let path = Path::new(trimmed);
        let basename = path.file_name().and_then(|n| n.to_str())?;

        let name = if WORKSPACE_NAMES.contains(&basename) {
            path.parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or(basename)
        } else {
            basename
        };

        (!name.is_empty()).then(|| name.to_string())
    }
}

/// Decodes Claude Code's project directory names (`-home-user-my-project`).
///
/// The encoding replaces path separators with dashes, so the original path
/// cannot be recovered exactly; the last non-empty segment is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodedDirName;

impl HintStrategy for EncodedDirName {
    fn infer(&self, context: &str) -> Option<String> {
        if !context.starts_with('-') {
            return None;
        }
        context
            .split('-')
            .rfind(|part| !part.is_empty())
            .map(String::from)
    }
}

/// Matches configured project names as substrings of the context.
///
/// The first configured name found wins, so order the list by priority.
#[derive(Debug, Clone, Default)]
pub struct KnownProjects {
    names: Vec<String>,
}

impl KnownProjects {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .filter(|n: &String| !n.is_empty())
                .collect(),
        }
    }
}

impl HintStrategy for KnownProjects {
    fn infer(&self, context: &str) -> Option<String> {
        self.names
            .iter()
            .find(|name| {
                context.contains(name.as_str())
                    // Claude's directory encoding turns underscores into dashes
                    || context.contains(&name.replace('_', "-"))
            })
            .cloned()
    }
}

/// Tries each strategy in order and returns the first hint found.
#[derive(Default)]
pub struct Chain {
    strategies: Vec<Box<dyn HintStrategy>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then(mut self, strategy: impl HintStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

impl HintStrategy for Chain {
    fn infer(&self, context: &str) -> Option<String> {
        self.strategies.iter().find_map(|s| s.infer(context))
    }
}

/// Extract repo name from a git remote URL or `owner/name` slug.
pub fn parse_remote_name(url: &str) -> Option<String> {
    let name = url
        .rsplit('/')
        .next()
        .or_else(|| url.rsplit(':').next())?
        .trim_end_matches(".git");

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
