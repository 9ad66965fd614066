use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use crate::dialect::Dialect;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatsFormat {
    #[default]
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "logweave")]
#[command(about = "Merge nearly-ordered access logs from many servers into one time-ordered stream")]
#[command(
    long_about = "Merge nearly-ordered access logs from many servers into one time-ordered stream\n\nEach input is sorted within a sliding window, then all inputs are merged and\nwritten out split by day. Jobs are read from logs.ini; -i merges files given\ndirectly.\n\nCOMMON EXAMPLES:\n  logweave -a                                  run every job in logs.ini\n  logweave www -s 2010-04-01 -e 2010-05-01     one job, April only\n  logweave -n -a                               show what would be merged\n  logweave -i a.log.gz -i b.log.gz | less      ad hoc merge to stdout"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Jobs (sections of the job file) to run
    pub jobs: Vec<String>,

    /// Run every job in the job file
    #[arg(short = 'a', long = "all", help_heading = "Job Options", conflicts_with = "jobs")]
    pub all: bool,

    /// Job file (default: ./logs.ini, then the user config directory)
    #[arg(short = 'c', long = "config", help_heading = "Job Options")]
    pub config: Option<String>,

    /// Don't merge; print which logs would be merged and where they would go
    #[arg(short = 'n', long = "no-act", help_heading = "Job Options")]
    pub no_act: bool,

    /// Merge these files instead of running jobs (repeatable)
    #[arg(
        short = 'i',
        long = "input",
        help_heading = "Input Options",
        conflicts_with_all = ["jobs", "all"]
    )]
    pub inputs: Vec<PathBuf>,

    /// Log format of the inputs; overrides the job's format
    #[arg(short = 'f', long = "format", value_enum, help_heading = "Input Options")]
    pub format: Option<Dialect>,

    /// Sorting window per input, in lines; overrides the job's window_size
    #[arg(short = 'w', long = "window-size", help_heading = "Input Options", value_parser = parse_window_size)]
    pub window_size: Option<usize>,

    /// Fail on the first malformed line instead of skipping it
    #[arg(long = "strict", help_heading = "Input Options")]
    pub strict: bool,

    /// Decompress gzip inputs by running PATH -d -c in a child process
    #[arg(long = "gzip-helper", value_name = "PATH", help_heading = "Input Options")]
    pub gzip_helper: Option<PathBuf>,

    /// Only output records on or after DATE (YYYY-MM-DD, inclusive)
    #[arg(short = 's', long = "start-date", value_name = "DATE", help_heading = "Filtering Options", value_parser = parse_date)]
    pub start_date: Option<NaiveDate>,

    /// Only output records before DATE (YYYY-MM-DD, exclusive)
    #[arg(short = 'e', long = "end-date", value_name = "DATE", help_heading = "Filtering Options", value_parser = parse_date)]
    pub end_date: Option<NaiveDate>,

    /// Keep a random subset of roughly one record in eight
    #[arg(long = "sample", help_heading = "Filtering Options")]
    pub sample: bool,

    /// Output template for -i (strftime or YYYY/MM/DD placeholders); stdout if omitted
    #[arg(long = "dest", value_name = "TEMPLATE", help_heading = "Output Options", requires = "inputs")]
    pub dest: Option<String>,

    /// Rewrite every record in combined log format
    #[arg(long = "convert-combined", help_heading = "Output Options")]
    pub convert_combined: bool,

    /// Don't print the running line count
    #[arg(short = 'q', long = "quiet", help_heading = "Output Options")]
    pub quiet: bool,

    /// Print processing statistics at the end
    #[arg(long = "stats", help_heading = "Output Options")]
    pub stats: bool,

    #[arg(long = "stats-format", value_enum, default_value = "table", help_heading = "Output Options")]
    pub stats_format: StatsFormat,

    /// Plain `logweave:` prefixes instead of emoji in diagnostics
    #[arg(long = "no-emoji", help_heading = "Output Options")]
    pub no_emoji: bool,

    /// More diagnostics on stderr (-v per file, -vv per skipped line)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output Options")]
    pub verbose: u8,

    /// Print shell completions and exit
    #[arg(long = "completions", value_name = "SHELL", value_enum)]
    pub completions: Option<clap_complete::Shell>,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}' (expected YYYY-MM-DD): {}", value, e))
}

fn parse_window_size(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("window size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("invalid window size '{}': {}", value, e)),
    }
}

impl Cli {
    /// Checks clap cannot express; failures are usage errors
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start >= end {
                return Err(format!(
                    "--start-date {} must be before --end-date {} (the end date is exclusive)",
                    start, end
                ));
            }
        }
        if self.completions.is_none() && self.inputs.is_empty() && !self.all && self.jobs.is_empty() {
            return Err("No jobs to process. Name jobs, use -a for all jobs, or -i to merge files".to_string());
        }
        if self.no_act && !self.inputs.is_empty() {
            return Err("--no-act only applies to configured jobs".to_string());
        }
        Ok(())
    }
}
