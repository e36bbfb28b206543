//! Developer timeline CLI library.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, PeriodArgs};
pub use config::{Config, Sources};
