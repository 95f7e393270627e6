//! sweeper.rs
//!
//! Scan-then-act plumbing. A sweep first collects the keys of every
//! matching item (paginated Scan), then hands them to a [`SweepAction`].
//! Actions run their writes through the shared [`TaskRunner`]; deletes go
//! through BatchWriteItem in chunks of 25 with one retry round for
//! unprocessed items.

use async_trait::async_trait;
use aws_sdk_dynamodb as ddb;
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, WriteRequest};
use eyre::Result;
use log::{debug, error, info, warn};
use ops_core::TaskRunner;
use std::collections::HashMap;

/// DynamoDB caps BatchWriteItem at 25 requests.
pub const BATCH_WRITE_SIZE: usize = 25;

/// The key attributes of one item.
pub type Key = HashMap<String, AttributeValue>;

/// Extract the key attributes from a scanned item; `None` when the item is
/// missing one of them.
pub fn key_of(item: &HashMap<String, AttributeValue>, key_attrs: &[String]) -> Option<Key> {
    let mut key = HashMap::with_capacity(key_attrs.len());
    for attr in key_attrs {
        key.insert(attr.clone(), item.get(attr)?.clone());
    }
    Some(key)
}

/// Page-size hint for the Scan call. Limits items evaluated per page so a
/// small `--limit` never reads whole pages of a large table; `None` (or a
/// value too large for the wire type) lets DynamoDB pick.
fn page_limit(limit: Option<usize>) -> Option<i32> {
    limit.and_then(|l| i32::try_from(l).ok())
}

/// Page through a Scan, returning the keys of matching items (up to `limit`).
pub async fn scan_keys(
    client: &ddb::Client,
    table: &str,
    filter: Option<&str>,
    expr_names: &HashMap<String, String>,
    expr_values: &HashMap<String, AttributeValue>,
    key_attrs: &[String],
    limit: Option<usize>,
) -> Result<Vec<Key>> {
    info!("Scanning {table}…");
    let mut keys = Vec::new();

    let mut pages = client
        .scan()
        .table_name(table)
        .set_filter_expression(filter.map(ToOwned::to_owned))
        .set_expression_attribute_names((!expr_names.is_empty()).then(|| expr_names.clone()))
        .set_expression_attribute_values((!expr_values.is_empty()).then(|| expr_values.clone()))
        .set_limit(page_limit(limit))
        .into_paginator()
        .items()
        .send();

    while let Some(item) = pages.next().await {
        let item = item?;
        match key_of(&item, key_attrs) {
            Some(key) => keys.push(key),
            None => warn!("scanned item is missing a key attribute; skipped"),
        }
        if let Some(limit) = limit {
            if keys.len() >= limit {
                debug!("stopping scan at --limit {limit}");
                break;
            }
        }
    }

    info!("Scan matched {} item(s)", keys.len());
    Ok(keys)
}

/// Result of executing an action.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SweepReport {
    pub matched: usize,
    pub applied: usize,
    pub failed: usize,
}

/// A mutation applied to the matched key set.
#[async_trait]
pub trait SweepAction: Send + Sync {
    fn describe(&self) -> String;

    async fn execute(
        &self,
        client: &ddb::Client,
        table: &str,
        keys: Vec<Key>,
        runner: &TaskRunner,
    ) -> Result<SweepReport>;
}

/// Delete every matched item via BatchWriteItem.
pub struct DeleteAction;

#[async_trait]
impl SweepAction for DeleteAction {
    fn describe(&self) -> String {
        "delete".to_string()
    }

    async fn execute(
        &self,
        client: &ddb::Client,
        table: &str,
        keys: Vec<Key>,
        runner: &TaskRunner,
    ) -> Result<SweepReport> {
        let matched = keys.len();
        let mut requests = Vec::with_capacity(matched);
        for key in keys {
            requests.push(
                WriteRequest::builder()
                    .set_delete_request(Some(DeleteRequest::builder().set_key(Some(key)).build()?))
                    .build(),
            );
        }

        let chunks: Vec<Vec<WriteRequest>> = requests
            .chunks(BATCH_WRITE_SIZE)
            .map(|c| c.to_vec())
            .collect();

        let tasks = chunks.into_iter().map(|chunk| async move {
            let n = chunk.len();
            let res = client
                .batch_write_item()
                .request_items(table, chunk)
                .send()
                .await;
            (n, res)
        });

        let mut failed = 0usize;
        let mut unprocessed: Vec<WriteRequest> = Vec::new();
        for (n, res) in runner.run_all(tasks).await {
            match res {
                Ok(out) => {
                    if let Some(map) = out.unprocessed_items {
                        for reqs in map.into_values() {
                            unprocessed.extend(reqs);
                        }
                    }
                }
                Err(e) => {
                    error!("BatchWriteItem failed: {e:?}");
                    failed += n;
                }
            }
        }

        // One sequential retry round; whatever still bounces is reported.
        if !unprocessed.is_empty() {
            warn!("{} unprocessed delete(s); retrying once", unprocessed.len());
            for chunk in unprocessed.chunks(BATCH_WRITE_SIZE) {
                match client
                    .batch_write_item()
                    .request_items(table, chunk.to_vec())
                    .send()
                    .await
                {
                    Ok(out) => {
                        if let Some(map) = out.unprocessed_items {
                            failed += map.values().map(Vec::len).sum::<usize>();
                        }
                    }
                    Err(e) => {
                        error!("BatchWriteItem retry failed: {e:?}");
                        failed += chunk.len();
                    }
                }
            }
        }

        Ok(SweepReport {
            matched,
            applied: matched - failed,
            failed,
        })
    }
}

/// Set one attribute on every matched item via UpdateItem.
pub struct SetAttrAction {
    pub attr: String,
    pub value: AttributeValue,
}

#[async_trait]
impl SweepAction for SetAttrAction {
    fn describe(&self) -> String {
        format!("set {} = {:?}", self.attr, self.value)
    }

    async fn execute(
        &self,
        client: &ddb::Client,
        table: &str,
        keys: Vec<Key>,
        runner: &TaskRunner,
    ) -> Result<SweepReport> {
        let matched = keys.len();
        let tasks = keys.into_iter().map(|key| async move {
            client
                .update_item()
                .table_name(table)
                .set_key(Some(key))
                .update_expression("SET #attr = :value")
                .expression_attribute_names("#attr", &self.attr)
                .expression_attribute_values(":value", self.value.clone())
                .send()
                .await
        });

        let mut failed = 0usize;
        for res in runner.run_all(tasks).await {
            if let Err(e) = res {
                error!("UpdateItem failed: {e:?}");
                failed += 1;
            }
        }

        Ok(SweepReport {
            matched,
            applied: matched - failed,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, &str)]) -> HashMap<String, AttributeValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::S(v.to_string())))
            .collect()
    }

    #[test]
    fn page_limit_caps_scan_pages() {
        assert_eq!(page_limit(Some(1)), Some(1));
        assert_eq!(page_limit(Some(500)), Some(500));
        assert_eq!(page_limit(None), None);
        assert_eq!(page_limit(Some(usize::MAX)), None);
    }

    #[test]
    fn key_of_extracts_partition_key() {
        let it = item(&[("jobId", "j-1"), ("status", "EXPIRED")]);
        let key = key_of(&it, &["jobId".to_string()]).unwrap();
        assert_eq!(key.len(), 1);
        assert_eq!(key["jobId"], AttributeValue::S("j-1".to_string()));
    }

    #[test]
    fn key_of_extracts_composite_key() {
        let it = item(&[("jobId", "j-1"), ("createdAt", "2026-01-01"), ("x", "y")]);
        let key = key_of(&it, &["jobId".to_string(), "createdAt".to_string()]).unwrap();
        assert_eq!(key.len(), 2);
        assert!(key.contains_key("createdAt"));
    }

    #[test]
    fn key_of_missing_attribute_is_none() {
        let it = item(&[("status", "EXPIRED")]);
        assert!(key_of(&it, &["jobId".to_string()]).is_none());
    }

    #[test]
    fn delete_action_describes_itself() {
        assert_eq!(DeleteAction.describe(), "delete");
    }

    #[test]
    fn set_action_describes_assignment() {
        let action = SetAttrAction {
            attr: "status".to_string(),
            value: AttributeValue::S("ARCHIVED".to_string()),
        };
        assert!(action.describe().starts_with("set status = "));
    }
}
