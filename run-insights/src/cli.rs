//! CLI argument parsing for run-insights
//!
//! This module contains only the clap derive structs.
//! Validation happens in config.rs.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Tsv,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "run-insights", author, version, about)]
pub struct Cli {
    /// CloudWatch log groups to query, space- or comma-separated
    #[clap(
        long,
        value_delimiter = ',',
        num_args = 1..,
        required = true
    )]
    pub log_groups: Vec<String>,

    /// Inline Logs Insights query text (mutually exclusive with --query-file)
    #[clap(long, conflicts_with = "query_file")]
    pub query: Option<String>,

    /// File containing the query text
    #[clap(long)]
    pub query_file: Option<PathBuf>,

    /// File of input tokens, one per line, substituted for {{inputs}} one
    /// batch at a time. Blank lines and #-comments are skipped.
    #[clap(long)]
    pub inputs_file: Option<PathBuf>,

    /// Inputs per rendered query
    #[clap(long, default_value_t = 50)]
    pub batch_size: usize,

    /// Queries in flight at once
    #[clap(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Query window start: RFC3339, epoch seconds, `today`, or `yesterday`
    /// (default: one hour before the end)
    #[clap(long)]
    pub start: Option<String>,

    /// Query window end (default: now)
    #[clap(long)]
    pub end: Option<String>,

    /// Per-query row limit
    #[clap(long)]
    pub limit: Option<i32>,

    /// Per-query wall-clock deadline in seconds
    #[clap(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Seconds between result polls
    #[clap(long, default_value_t = 2)]
    pub poll_secs: u64,

    /// Run inside a resolved purpose account instead of the current one
    #[clap(long)]
    pub purpose: Option<String>,

    /// Region queried (and used for account resolution)
    #[clap(long, default_value = "us-east-1")]
    pub region: String,

    /// Role assumed in the target purpose account
    #[clap(long, default_value = "OpsReadOnly")]
    pub role: String,

    /// Team prefix of the account email naming convention
    #[clap(long, default_value = "svcteam")]
    pub team: String,

    /// Drop the cached account set before resolving
    #[clap(long)]
    pub refresh_cache: bool,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_requires_log_groups() {
        assert!(Cli::try_parse_from(["run-insights", "--query", "fields @message"]).is_err());
    }

    #[test]
    fn cli_parses_comma_separated_log_groups() {
        let cli = Cli::parse_from([
            "run-insights",
            "--log-groups",
            "/svc/api,/svc/worker",
            "--query",
            "fields @message",
        ]);
        assert_eq!(cli.log_groups, vec!["/svc/api", "/svc/worker"]);
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from([
            "run-insights",
            "--log-groups",
            "/svc/api",
            "--query",
            "fields @message",
        ]);
        assert_eq!(cli.batch_size, 50);
        assert_eq!(cli.concurrency, 4);
        assert_eq!(cli.timeout_secs, 300);
        assert_eq!(cli.poll_secs, 2);
        assert_eq!(cli.region, "us-east-1");
        assert_eq!(cli.output, OutputFormat::Table);
        assert!(cli.purpose.is_none());
    }

    #[test]
    fn cli_rejects_query_and_query_file_together() {
        assert!(
            Cli::try_parse_from([
                "run-insights",
                "--log-groups",
                "/svc/api",
                "--query",
                "fields @message",
                "--query-file",
                "q.txt",
            ])
            .is_err()
        );
    }

    #[test]
    fn cli_parses_tsv_output() {
        let cli = Cli::parse_from([
            "run-insights",
            "--log-groups",
            "/svc/api",
            "--query",
            "fields @message",
            "--output",
            "tsv",
        ]);
        assert_eq!(cli.output, OutputFormat::Tsv);
    }
}
