//! insights.rs
//!
//! CloudWatch Logs Insights is asynchronous: StartQuery returns an id, and
//! the caller polls GetQueryResults until the query reaches a terminal
//! state. This wrapper owns that loop, including a wall-clock deadline that
//! issues a best-effort StopQuery before giving up.

use aws_sdk_cloudwatchlogs as cwl;
use aws_sdk_cloudwatchlogs::types::{QueryStatus, ResultField};
use aws_types::SdkConfig;
use chrono::{DateTime, Utc};
use eyre::{ContextCompat, Result, WrapErr, bail, ensure};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// One Insights result row, field name to value. The `@ptr` bookkeeping
/// field is dropped.
pub type ResultRow = BTreeMap<String, String>;

/// Everything needed to run one query.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub log_groups: Vec<String>,
    pub query: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: Option<i32>,
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl QuerySpec {
    pub fn new(
        log_groups: Vec<String>,
        query: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            log_groups,
            query,
            start,
            end,
            limit: None,
            poll_interval: Duration::from_secs(2),
            deadline: Duration::from_secs(300),
        }
    }
}

/// Scan statistics reported with a completed query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryStats {
    pub records_matched: f64,
    pub records_scanned: f64,
    pub bytes_scanned: f64,
}

impl QueryStats {
    pub fn merge(&mut self, other: &QueryStats) {
        self.records_matched += other.records_matched;
        self.records_scanned += other.records_scanned;
        self.bytes_scanned += other.bytes_scanned;
    }
}

#[derive(Debug)]
pub struct QueryResults {
    pub query_id: String,
    pub rows: Vec<ResultRow>,
    pub stats: QueryStats,
}

pub struct InsightsQueryClient {
    client: cwl::Client,
}

impl InsightsQueryClient {
    pub fn new(conf: &SdkConfig) -> Self {
        Self {
            client: cwl::Client::new(conf),
        }
    }

    /// Start the query and poll it to a terminal state.
    ///
    /// Scheduled/Running (and Unknown) keep polling; Complete returns rows;
    /// Failed/Cancelled/Timeout become errors carrying the query id. If the
    /// local deadline elapses first the query is cancelled server-side.
    pub async fn run(&self, spec: &QuerySpec) -> Result<QueryResults> {
        ensure!(spec.start < spec.end, "query start must precede end");
        ensure!(!spec.log_groups.is_empty(), "at least one log group is required");

        let started = Instant::now();
        let mut req = self
            .client
            .start_query()
            .set_log_group_names(Some(spec.log_groups.clone()))
            .query_string(&spec.query)
            .start_time(spec.start.timestamp())
            .end_time(spec.end.timestamp());
        if let Some(limit) = spec.limit {
            req = req.limit(limit);
        }

        let query_id = req
            .send()
            .await?
            .query_id()
            .context("StartQuery returned no query id")?
            .to_owned();
        debug!("started query {query_id} over {:?}", spec.log_groups);

        loop {
            tokio::time::sleep(spec.poll_interval).await;

            // A failed poll still leaves the query running server-side.
            let out = match self.client.get_query_results().query_id(&query_id).send().await {
                Ok(out) => out,
                Err(e) => {
                    self.cancel(&query_id).await;
                    return Err(e).wrap_err_with(|| format!("polling query {query_id} failed"));
                }
            };
            match out.status() {
                Some(QueryStatus::Complete) => {
                    let rows = rows_from(out.results());
                    let stats = out
                        .statistics()
                        .map(|s| QueryStats {
                            records_matched: s.records_matched(),
                            records_scanned: s.records_scanned(),
                            bytes_scanned: s.bytes_scanned(),
                        })
                        .unwrap_or_default();
                    info!(
                        "query {query_id} complete: {} rows in {:.2?}",
                        rows.len(),
                        started.elapsed()
                    );
                    return Ok(QueryResults { query_id, rows, stats });
                }
                Some(s @ (QueryStatus::Failed | QueryStatus::Cancelled | QueryStatus::Timeout)) => {
                    bail!("query {query_id} finished in state {}", s.as_str());
                }
                other => {
                    debug!(
                        "query {query_id} still {}",
                        other.map(QueryStatus::as_str).unwrap_or("pending")
                    );
                }
            }

            if started.elapsed() >= spec.deadline {
                self.cancel(&query_id).await;
                bail!(
                    "query {query_id} exceeded the {}s deadline",
                    spec.deadline.as_secs()
                );
            }
        }
    }

    /// Best-effort StopQuery; failures are logged, not returned.
    pub async fn cancel(&self, query_id: &str) {
        if let Err(e) = self.client.stop_query().query_id(query_id).send().await {
            warn!("failed to stop query {query_id}: {e:?}");
        }
    }
}

fn rows_from(results: &[Vec<ResultField>]) -> Vec<ResultRow> {
    results
        .iter()
        .map(|fields| {
            fields
                .iter()
                .filter(|f| f.field() != Some("@ptr"))
                .filter_map(|f| Some((f.field()?.to_owned(), f.value()?.to_owned())))
                .collect()
        })
        .collect()
}
