//! Event source adapters for the timeline.
//!
//! Each adapter implements [`tl_core::EventSource`]; the git adapter also
//! implements [`tl_core::CommitSource`] for attribution.

pub mod claude;
pub mod cursor;
pub mod git;

pub use claude::ClaudeLogSource;
pub use cursor::CursorSource;
pub use git::{GitSource, LocalRepo};
