//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DataScout - LLM-driven data exploration and analysis
#[derive(Parser)]
#[command(
    name = "datascout",
    about = "Explore and analyze tabular data with LLM-driven blocks",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the exploration agent against a data file
    Explore {
        /// Data file (.csv, .json, or .db/.sqlite with --query)
        input: PathBuf,

        /// Exploration goal
        #[arg(short, long)]
        goal: String,

        /// Maximum exploration iterations
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Write the final report to this path as well
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// SQL query for sqlite inputs
        #[arg(long)]
        query: Option<String>,
    },

    /// Transform data with a natural-language instruction
    Query {
        /// Data file (.csv, .json, or .db/.sqlite with --query)
        input: PathBuf,

        /// What to do with the data
        instruction: String,

        /// SQL query for sqlite inputs
        #[arg(long)]
        query: Option<String>,
    },

    /// Check data quality and suggest cleaning steps
    Quality {
        /// Data file (.csv, .json, or .db/.sqlite with --query)
        input: PathBuf,

        /// Apply automatic cleaning and report rows removed
        #[arg(long)]
        auto_clean: bool,

        /// SQL query for sqlite inputs
        #[arg(long)]
        query: Option<String>,
    },

    /// Run a statistical analysis
    Stats {
        /// Data file (.csv, .json, or .db/.sqlite with --query)
        input: PathBuf,

        /// Analysis type (descriptive_stats, correlation, t_test, normality_test)
        #[arg(short, long, default_value = "descriptive_stats")]
        analysis: String,

        /// Dependent variable (t_test, normality_test)
        #[arg(long)]
        dependent: Option<String>,

        /// Grouping column (t_test)
        #[arg(long)]
        group_column: Option<String>,

        /// SQL query for sqlite inputs
        #[arg(long)]
        query: Option<String>,
    },

    /// Recommend charts for a data file
    Recommend {
        /// Data file (.csv, .json, or .db/.sqlite with --query)
        input: PathBuf,

        /// Analysis goal guiding the recommendations
        #[arg(short, long)]
        goal: Option<String>,

        /// SQL query for sqlite inputs
        #[arg(long)]
        query: Option<String>,
    },

    /// List available blocks
    Blocks,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_explore_command() {
        let cli = Cli::parse_from([
            "datascout",
            "explore",
            "sales.csv",
            "--goal",
            "find sales leader",
            "--max-iterations",
            "5",
        ]);
        match cli.command {
            Command::Explore {
                input,
                goal,
                max_iterations,
                ..
            } => {
                assert_eq!(input, PathBuf::from("sales.csv"));
                assert_eq!(goal, "find sales leader");
                assert_eq!(max_iterations, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["datascout", "--log-level", "DEBUG", "blocks"]);
        assert_eq!(cli.log_level.as_deref(), Some("DEBUG"));
        assert!(matches!(cli.command, Command::Blocks));
    }
}
