//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// torstats - Tor network size charts from daily snapshots
///
/// Reads the daily relay/exit/guard node lists under `history/`, draws the
/// network size and IPv4/IPv6 charts, and combines them with the node
/// distribution pie chart.
///
/// Examples:
///   torstats chart
///   torstats --project-root /srv/tor-stats chart --dump stats/history.json
///   torstats combine
///   torstats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Pipeline to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .torstats.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Project root holding the history/ and stats/ directories
    #[arg(short, long, value_name = "DIR", env = "TORSTATS_PROJECT_ROOT", global = true)]
    pub project_root: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .torstats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Available pipelines.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Aggregate the snapshot history and draw the network chart
    Chart {
        /// Also write the aggregated daily counts as JSON
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,
    },

    /// Combine the network chart and the pie chart side by side
    Combine,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("A command is required: chart or combine".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref root) = self.project_root {
            if !root.is_dir() {
                return Err(format!(
                    "Project root is not a directory: {}",
                    root.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            command: Some(Command::Chart { dump: None }),
            config: None,
            project_root: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::try_parse_from(["torstats", "chart", "--dump", "out.json"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Chart {
                dump: Some(PathBuf::from("out.json"))
            })
        );

        let args = Args::try_parse_from(["torstats", "-v", "combine"]).unwrap();
        assert_eq!(args.command, Some(Command::Combine));
        assert!(args.verbose);
    }

    #[test]
    fn test_validation_requires_command() {
        let mut args = make_args();
        args.command = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_project_root() {
        let mut args = make_args();
        args.project_root = Some(PathBuf::from("/definitely/not/here"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
