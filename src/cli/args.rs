//! CLI argument structures

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Run declarative test cases and suites
#[derive(Parser, Debug)]
#[command(name = "robogo")]
#[command(about = "robogo - Run declarative test cases with parallel steps and resilient actions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv adds thread ids and line numbers)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run test case or suite files
    Run(RunArgs),
    /// List the available actions
    Actions,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Test case or suite files (a suite lists its test cases under `testcases`)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Run independent steps and suite test cases concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Upper bound on concurrently running steps or test cases (1-100)
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Abort the whole run after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Console)]
    pub output: OutputFormat,

    /// Runner configuration file (YAML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Log the delay and error of every retry attempt
    #[arg(long)]
    pub verbose_retry: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Console,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "robogo",
            "-vv",
            "run",
            "a.yaml",
            "b.yaml",
            "--parallel",
            "--max-concurrency",
            "8",
            "--timeout",
            "30",
            "--output",
            "json",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.files.len(), 2);
        assert!(args.parallel);
        assert_eq!(args.max_concurrency, Some(8));
        assert_eq!(args.timeout, Some(30));
        assert_eq!(args.output, OutputFormat::Json);
    }

    #[test]
    fn test_run_requires_files() {
        assert!(Cli::try_parse_from(["robogo", "run"]).is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
