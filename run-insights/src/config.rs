//! Configuration for run-insights
//!
//! This module validates CLI arguments, reads the query/inputs files, and
//! resolves the query time window.

use crate::cli::{Cli, OutputFormat};
use chrono::{DateTime, TimeZone, Utc};
use eyre::{Result, bail, eyre};
use ops_core::Purpose;
use ops_core::batch::INPUTS_PLACEHOLDER;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

/// A resolved purpose account to assume into.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub purpose: Purpose,
    pub role: String,
    pub team: String,
    pub refresh_cache: bool,
}

/// Validated configuration for run-insights
#[derive(Debug, Clone)]
pub struct Config {
    pub log_groups: Vec<String>,
    pub query: String,
    pub inputs: Vec<String>,
    pub batch_size: usize,
    pub concurrency: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: Option<i32>,
    pub poll_interval: Duration,
    pub deadline: Duration,
    pub region: String,
    pub target: Option<Target>,
    pub output: OutputFormat,
}

impl TryFrom<Cli> for Config {
    type Error = eyre::Error;

    fn try_from(cli: Cli) -> Result<Self> {
        if cli.log_groups.is_empty() {
            bail!("At least one log group must be specified");
        }
        if cli.batch_size == 0 {
            bail!("--batch-size must be at least 1");
        }
        if cli.concurrency == 0 {
            bail!("--concurrency must be at least 1");
        }
        if cli.timeout_secs == 0 {
            bail!("--timeout-secs must be at least 1");
        }
        if cli.poll_secs == 0 {
            bail!("--poll-secs must be at least 1");
        }

        let query = match (&cli.query, &cli.query_file) {
            (Some(q), None) => q.clone(),
            (None, Some(path)) => fs::read_to_string(path)
                .map_err(|e| eyre!("Cannot read query file {}: {}", path.display(), e))?,
            (None, None) => bail!("One of --query or --query-file is required"),
            (Some(_), Some(_)) => bail!("--query and --query-file are mutually exclusive"),
        };
        let query = query.trim().to_owned();
        if query.is_empty() {
            bail!("Query text is empty");
        }

        let inputs = match &cli.inputs_file {
            Some(path) => parse_inputs(&fs::read_to_string(path).map_err(|e| {
                eyre!("Cannot read inputs file {}: {}", path.display(), e)
            })?),
            None => Vec::new(),
        };

        // The placeholder and the input set come as a pair.
        let has_placeholder = query.contains(INPUTS_PLACEHOLDER);
        if has_placeholder && inputs.is_empty() {
            bail!("Query contains {INPUTS_PLACEHOLDER} but no --inputs-file was given");
        }
        if !has_placeholder && !inputs.is_empty() {
            bail!("--inputs-file given but the query has no {INPUTS_PLACEHOLDER} placeholder");
        }

        let end = match &cli.end {
            Some(s) => parse_when(s)?,
            None => Utc::now(),
        };
        let start = match &cli.start {
            Some(s) => parse_when(s)?,
            None => end - chrono::Duration::hours(1),
        };
        if start >= end {
            bail!("Window start {start} is not before end {end}");
        }

        let target = match &cli.purpose {
            Some(p) => Some(Target {
                purpose: Purpose::from_str(p)?,
                role: cli.role.clone(),
                team: cli.team.clone(),
                refresh_cache: cli.refresh_cache,
            }),
            None => None,
        };

        Ok(Config {
            log_groups: cli.log_groups,
            query,
            inputs,
            batch_size: cli.batch_size,
            concurrency: cli.concurrency,
            start,
            end,
            limit: cli.limit,
            poll_interval: Duration::from_secs(cli.poll_secs),
            deadline: Duration::from_secs(cli.timeout_secs),
            region: cli.region,
            target,
            output: cli.output,
        })
    }
}

/// Parse a window bound: RFC3339, epoch seconds, `today`, or `yesterday`.
pub fn parse_when(src: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(src) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(secs) = src.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| eyre!("Epoch timestamp out of range: {src}"));
    }
    let midnight_of = |dt: DateTime<Utc>| {
        dt.date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|n| n.and_utc())
            .ok_or_else(|| eyre!("Cannot compute midnight for {dt}"))
    };
    match src {
        "today" => midnight_of(Utc::now()),
        "yesterday" => midnight_of(Utc::now() - chrono::Duration::days(1)),
        _ => bail!(
            "Cannot parse time '{src}'. Expected RFC3339, epoch seconds, 'today', or 'yesterday'"
        ),
    }
}

/// One token per line; blank lines and #-comments are skipped.
pub fn parse_inputs(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_owned)
        .collect()
}
