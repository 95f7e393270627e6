//! run-insights library
//!
//! Runs a CloudWatch Logs Insights query, optionally batched over a large
//! input set and optionally inside a resolved purpose account.
//! This module separates business logic from the CLI shell.

pub mod cli;
pub mod config;

pub use cli::{Cli, OutputFormat};
pub use config::Config;

use comfy_table::presets::ASCII_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use eyre::Result;
use log::info;
use ops_core::batch::StandardBatchQuery;
use ops_core::{BatchOutcome, FileCache, InsightsQueryClient, ResultRow, TaskRunner};
use ops_core::{accounts, creds};
use std::collections::BTreeSet;
use terminal_size::{Width, terminal_size};

/// Run the configured query batches and return the merged outcome.
pub async fn run(config: &Config) -> Result<BatchOutcome> {
    let base_conf = creds::base_config(&config.region).await;

    let conf = match &config.target {
        Some(target) => {
            let cache = FileCache::open_default();
            let set = accounts::resolve_cached(
                &base_conf,
                &target.team,
                &cache,
                target.refresh_cache,
            )
            .await?;
            let account = set.lookup(target.purpose, &config.region)?;
            info!(
                "querying {} account {} in {}",
                account.purpose, account.account_id, config.region
            );
            creds::assumed_config(
                &base_conf,
                &account.account_id,
                &target.role,
                &config.region,
                "run-insights",
            )
            .await
        }
        None => base_conf,
    };

    let client = InsightsQueryClient::new(&conf);
    let query = StandardBatchQuery {
        log_groups: config.log_groups.clone(),
        query: config.query.clone(),
        start: config.start,
        end: config.end,
        limit: config.limit,
        poll_interval: config.poll_interval,
        deadline: config.deadline,
    };
    let runner = TaskRunner::new(config.concurrency)?;

    ops_core::run_batched(&client, &query, &config.inputs, config.batch_size, &runner).await
}

/// Best-effort detection of the current terminal width (columns).
pub fn terminal_width() -> usize {
    terminal_size()
        .map(|(Width(w), _)| w as usize)
        .unwrap_or(80)
}

/// Sorted union of field names across all rows.
pub fn column_names(rows: &[ResultRow]) -> Vec<String> {
    let names: BTreeSet<&str> = rows.iter().flat_map(|r| r.keys().map(String::as_str)).collect();
    names.into_iter().map(str::to_owned).collect()
}

/// Format result rows as a terminal table.
pub fn format_table(rows: &[ResultRow]) -> String {
    let columns = column_names(rows);
    let mut table = Table::new();
    table.load_preset(ASCII_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(terminal_width() as u16);
    table.set_header(columns.clone());
    for row in rows {
        table.add_row(
            columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or_default()),
        );
    }
    table.to_string()
}

/// Format result rows as tab-separated lines with a header row. Embedded
/// tabs and newlines inside values become spaces.
pub fn format_tsv(rows: &[ResultRow]) -> String {
    let columns = column_names(rows);
    let mut out = columns.join("\t");
    out.push('\n');
    for row in rows {
        let line: Vec<String> = columns
            .iter()
            .map(|c| {
                row.get(c)
                    .map(|v| v.replace(['\t', '\n'], " "))
                    .unwrap_or_default()
            })
            .collect();
        out.push_str(&line.join("\t"));
        out.push('\n');
    }
    out
}
