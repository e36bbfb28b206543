//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Developer timeline reconstruction.
///
/// Rebuilds where your working time went from assistant transcripts, editor
/// state and commit history.
#[derive(Debug, Parser)]
#[command(name = "tl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show which sources are configured and available.
    Status,

    /// Show time per project, service and day.
    Report {
        #[command(flatten)]
        period: PeriodArgs,

        /// Report on merged cross-source blocks instead of per-service sessions.
        #[arg(long)]
        blocks: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the merged timeline and idle gaps.
    Blocks {
        #[command(flatten)]
        period: PeriodArgs,

        /// Minimum idle period reported as a gap, in minutes.
        #[arg(long, default_value_t = 60)]
        gap_threshold: i64,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Suggest time entries for the period.
    Entries {
        #[command(flatten)]
        period: PeriodArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Period selection shared by the pipeline commands.
#[derive(Debug, Clone, Default, Args)]
pub struct PeriodArgs {
    /// Cover the last N days up to now.
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub days: Option<u32>,

    /// Period start (ISO 8601, YYYY-MM-DD, or '2 days ago').
    #[arg(long)]
    pub start: Option<String>,

    /// Period end (ISO 8601, YYYY-MM-DD, or '1 hour ago').
    #[arg(long)]
    pub end: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_report_with_period() {
        let cli = Cli::try_parse_from(["tl", "report", "--days", "3", "--blocks", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Report {
                period,
                blocks,
                json,
            }) => {
                assert_eq!(period.days, Some(3));
                assert!(blocks);
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_days_with_start() {
        let result = Cli::try_parse_from(["tl", "entries", "--days", "1", "--start", "2026-01-01"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tl", "status", "-v", "-c", "/tmp/tl.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tl.toml")));
    }

    #[test]
    fn test_blocks_default_gap_threshold() {
        let cli = Cli::try_parse_from(["tl", "blocks"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Blocks {
                gap_threshold: 60,
                ..
            })
        ));
    }
}
