//! runner.rs
//!
//! Bounded-concurrency task pool. Every tool that fans out over batches,
//! regions, or accounts funnels its futures through here so at most
//! `concurrency` of them are in flight at once.

use eyre::{Result, ensure};
use futures::{StreamExt, TryStreamExt, stream};
use std::future::Future;

#[derive(Debug, Clone, Copy)]
pub struct TaskRunner {
    concurrency: usize,
}

impl TaskRunner {
    pub fn new(concurrency: usize) -> Result<Self> {
        ensure!(concurrency > 0, "concurrency must be at least 1");
        Ok(Self { concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Drive every task to completion, at most `concurrency` at a time.
    /// Outputs arrive in completion order; a failing task never aborts its
    /// siblings, so callers that care inspect each output themselves.
    pub async fn run_all<T, Fut>(&self, tasks: impl IntoIterator<Item = Fut>) -> Vec<T>
    where
        Fut: Future<Output = T>,
    {
        stream::iter(tasks)
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    /// Like [`run_all`](Self::run_all) but fail-fast: the first error wins
    /// and successful outputs keep the input order.
    pub async fn try_run_all<T, Fut>(&self, tasks: impl IntoIterator<Item = Fut>) -> Result<Vec<T>>
    where
        Fut: Future<Output = Result<T>>,
    {
        stream::iter(tasks)
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(TaskRunner::new(0).is_err());
        assert_eq!(TaskRunner::new(3).unwrap().concurrency(), 3);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let runner = TaskRunner::new(4).unwrap();
        let out: Vec<u32> = runner.run_all(Vec::<futures::future::Ready<u32>>::new()).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_bound() {
        let runner = TaskRunner::new(3).unwrap();
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let tasks = (0..12).map(|i| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i
            }
        });

        let mut out = runner.run_all(tasks).await;
        out.sort_unstable();
        assert_eq!(out, (0..12).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn run_all_collects_failures_without_aborting() {
        let runner = TaskRunner::new(2).unwrap();
        let tasks = (0..6).map(|i| async move {
            if i % 2 == 0 {
                Ok(i)
            } else {
                eyre::bail!("task {i} failed")
            }
        });

        let out: Vec<Result<i32>> = runner.run_all(tasks).await;
        assert_eq!(out.iter().filter(|r| r.is_ok()).count(), 3);
        assert_eq!(out.iter().filter(|r| r.is_err()).count(), 3);
    }

    #[tokio::test]
    async fn try_run_all_preserves_input_order() {
        let runner = TaskRunner::new(4).unwrap();
        let tasks = (0..8).map(|i| async move {
            // Later tasks finish earlier; `buffered` must still order outputs.
            tokio::time::sleep(Duration::from_millis(8 - i)).await;
            Ok(i)
        });

        let out = runner.try_run_all(tasks).await.unwrap();
        assert_eq!(out, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn try_run_all_surfaces_first_error() {
        let runner = TaskRunner::new(2).unwrap();
        let tasks = (0..4).map(|i| async move {
            if i == 2 {
                eyre::bail!("boom")
            }
            Ok(i)
        });

        assert!(runner.try_run_all(tasks).await.is_err());
    }
}
