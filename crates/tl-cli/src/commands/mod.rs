//! CLI subcommand implementations.

pub mod blocks;
pub mod entries;
pub mod report;
pub mod status;
pub mod util;
