// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Poll tags until shutdown (default)
//! - `validate`: Validate configuration file
//! - `browse`: Print the discovered tag table
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// tagpoll - OPC UA tag discovery and polling
///
/// Connects to an OPC UA server, discovers the variables below the configured
/// roots and streams their values as lines on stdout.
#[derive(Parser, Debug)]
#[command(
    name = "tagpoll",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "OPC UA tag discovery and polling",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "tagpoll.yaml",
        env = "TAGPOLL_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "TAGPOLL_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "TAGPOLL_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the tagpoll CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Poll tags until interrupted
    ///
    /// This is the default command when no subcommand is specified.
    /// Every reading is written to stdout as one line.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration file without connecting.
    Validate(ValidateArgs),

    /// Browse once and print the tag table
    Browse(BrowseArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Reading line format (overrides `output.format`)
    #[arg(short, long)]
    pub format: Option<ReadingFormat>,

    /// Stop after this many batches
    #[arg(long)]
    pub max_batches: Option<u64>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `browse` command.
#[derive(Args, Debug, Clone, Default)]
pub struct BrowseArgs {
    /// Table format
    #[arg(short, long, default_value = "csv")]
    pub format: TableFormat,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

/// Line format for readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReadingFormat {
    /// One JSON object per line
    Json,
    /// `path (node_id) = payload`
    Text,
}

impl From<tagpoll_config::OutputFormat> for ReadingFormat {
    fn from(format: tagpoll_config::OutputFormat) -> Self {
        match format {
            tagpoll_config::OutputFormat::Json => Self::Json,
            tagpoll_config::OutputFormat::Text => Self::Text,
        }
    }
}

/// Tag table format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TableFormat {
    /// Comma-separated records with a header row
    #[default]
    Csv,
    /// JSON array of tag definitions
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["tagpoll"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from(["tagpoll", "run", "-f", "text", "--max-batches", "3"]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("Expected Run command");
        };
        assert_eq!(args.format, Some(ReadingFormat::Text));
        assert_eq!(args.max_batches, Some(3));
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["tagpoll", "validate", "--show-config", "-f", "json"]);
        let Some(Commands::Validate(args)) = cli.command else {
            panic!("Expected Validate command");
        };
        assert!(args.show_config);
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_browse_command() {
        let cli = Cli::parse_from(["tagpoll", "browse"]);
        let Some(Commands::Browse(args)) = cli.command else {
            panic!("Expected Browse command");
        };
        assert_eq!(args.format, TableFormat::Csv);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["tagpoll", "-c", "/etc/tagpoll/line1.yaml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/tagpoll/line1.yaml"));
    }

    #[test]
    fn test_log_flags() {
        let cli = Cli::parse_from(["tagpoll", "-l", "trace", "--log-format", "json"]);
        assert_eq!(cli.effective_log_level(), "trace");
        assert_eq!(cli.log_format, LogFormat::Json);

        let cli = Cli::parse_from(["tagpoll", "-q"]);
        assert_eq!(cli.effective_log_level(), "warn");

        let cli = Cli::parse_from(["tagpoll", "-v"]);
        assert_eq!(cli.effective_log_level(), "debug");
    }

    #[test]
    fn test_reading_format_from_config() {
        assert_eq!(
            ReadingFormat::from(tagpoll_config::OutputFormat::Json),
            ReadingFormat::Json
        );
    }
}
