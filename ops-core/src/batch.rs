//! batch.rs
//!
//! Batched query orchestration. Insights queries cap out quickly when you
//! try to filter on thousands of tokens (request ids, resource arns, ...),
//! so the input set is chunked, each chunk rendered into its own query, and
//! the chunks executed through the [`TaskRunner`]. One failing chunk never
//! cancels its siblings; failures are carried in the merged outcome.

use crate::insights::{InsightsQueryClient, QuerySpec, QueryStats, ResultRow};
use crate::runner::TaskRunner;
use chrono::{DateTime, Utc};
use eyre::{Result, ensure};
use log::{error, info};
use std::time::Duration;

/// Placeholder substituted with the rendered batch in query text.
pub const INPUTS_PLACEHOLDER: &str = "{{inputs}}";

/// A query that can be rendered once per input batch.
pub trait BatchQuery: Send + Sync {
    fn log_groups(&self) -> Vec<String>;
    fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>);
    fn render(&self, batch: &[String]) -> String;

    fn limit(&self) -> Option<i32> {
        None
    }
    fn poll_interval(&self) -> Duration {
        Duration::from_secs(2)
    }
    fn deadline(&self) -> Duration {
        Duration::from_secs(300)
    }
}

/// The common case: a query string containing [`INPUTS_PLACEHOLDER`], which
/// each batch replaces with a quoted, comma-separated list.
#[derive(Debug, Clone)]
pub struct StandardBatchQuery {
    pub log_groups: Vec<String>,
    pub query: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: Option<i32>,
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl BatchQuery for StandardBatchQuery {
    fn log_groups(&self) -> Vec<String> {
        self.log_groups.clone()
    }

    fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }

    fn render(&self, batch: &[String]) -> String {
        self.query.replace(INPUTS_PLACEHOLDER, &quote_list(batch))
    }

    fn limit(&self) -> Option<i32> {
        self.limit
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Render tokens as `"a","b","c"` for use inside an `in [...]` clause.
/// Embedded double quotes are escaped.
pub fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("\"{}\"", i.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Split inputs into render-ready chunks. An empty input set still yields a
/// single empty chunk so a placeholder-free query runs exactly once.
pub fn chunk_inputs(inputs: &[String], batch_size: usize) -> Vec<Vec<String>> {
    if inputs.is_empty() {
        return vec![Vec::new()];
    }
    inputs.chunks(batch_size).map(|c| c.to_vec()).collect()
}

/// A batch that failed or timed out, kept for the final report.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub inputs: usize,
    pub error: String,
}

/// Merged result of a batched run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub rows: Vec<ResultRow>,
    pub stats: QueryStats,
    pub failures: Vec<BatchFailure>,
    pub batches: usize,
}

impl BatchOutcome {
    pub fn fully_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Chunk `inputs`, render one query per chunk, and execute the chunks
/// through `runner`, merging rows and statistics.
pub async fn run_batched(
    client: &InsightsQueryClient,
    query: &dyn BatchQuery,
    inputs: &[String],
    batch_size: usize,
    runner: &TaskRunner,
) -> Result<BatchOutcome> {
    ensure!(batch_size > 0, "batch size must be at least 1");

    let chunks = chunk_inputs(inputs, batch_size);
    let (start, end) = query.time_range();
    info!(
        "running {} batch(es) of up to {batch_size} input(s), {} at a time",
        chunks.len(),
        runner.concurrency()
    );

    let mut outcome = BatchOutcome {
        batches: chunks.len(),
        ..Default::default()
    };

    let tasks = chunks.into_iter().enumerate().map(|(index, chunk)| {
        let spec = QuerySpec {
            log_groups: query.log_groups(),
            query: query.render(&chunk),
            start,
            end,
            limit: query.limit(),
            poll_interval: query.poll_interval(),
            deadline: query.deadline(),
        };
        async move { (index, chunk.len(), client.run(&spec).await) }
    });

    for (index, input_count, result) in runner.run_all(tasks).await {
        match result {
            Ok(res) => {
                info!("batch {index}: {} row(s) from {input_count} input(s)", res.rows.len());
                outcome.stats.merge(&res.stats);
                outcome.rows.extend(res.rows);
            }
            Err(e) => {
                error!("batch {index} failed: {e:?}");
                outcome.failures.push(BatchFailure {
                    batch_index: index,
                    inputs: input_count,
                    error: format!("{e:#}"),
                });
            }
        }
    }

    outcome.failures.sort_by_key(|f| f.batch_index);
    Ok(outcome)
}
