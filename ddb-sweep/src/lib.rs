//! ddb-sweep library
//!
//! Scan a DynamoDB table for matching items and count, delete, or update
//! them. Mutating actions are gated behind --apply; a plain run prints what
//! would happen. This module separates business logic from the CLI shell.

pub mod cli;
pub mod config;
pub mod sweeper;

pub use cli::Cli;
pub use config::{Action, Config};
pub use sweeper::{DeleteAction, SetAttrAction, SweepAction, SweepReport};

use aws_sdk_dynamodb as ddb;
use eyre::Result;
use log::info;
use ops_core::{FileCache, TaskRunner, accounts, creds};

/// What a sweep ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// --action count, or a scan that matched nothing
    Counted(usize),
    /// A mutating action without --apply
    DryRun { pending: usize, action: String },
    /// A mutating action that ran
    Applied(SweepReport),
}

/// Run the configured sweep.
pub async fn run(config: &Config) -> Result<SweepOutcome> {
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
                "sweeping {} in {} account {}",
                config.table, account.region, account.account_id
            );
            creds::assumed_config(
                &base_conf,
                &account.account_id,
                &target.role,
                &config.region,
                "ddb-sweep",
            )
            .await
        }
        None => base_conf,
    };

    let client = ddb::Client::new(&conf);
    let keys = sweeper::scan_keys(
        &client,
        &config.table,
        config.filter_expression.as_deref(),
        &config.expr_names,
        &config.expr_values,
        &config.key_attrs,
        config.limit,
    )
    .await?;

    let action: Box<dyn SweepAction> = match &config.action {
        Action::Count => return Ok(SweepOutcome::Counted(keys.len())),
        Action::Delete => Box::new(DeleteAction),
        Action::Set { attr, value } => Box::new(SetAttrAction {
            attr: attr.clone(),
            value: value.clone(),
        }),
    };

    if keys.is_empty() {
        return Ok(SweepOutcome::Counted(0));
    }

    // No --apply, no mutation. Ever.
    if !config.apply {
        return Ok(SweepOutcome::DryRun {
            pending: keys.len(),
            action: action.describe(),
        });
    }

    let runner = TaskRunner::new(config.concurrency)?;
    let report = action.execute(&client, &config.table, keys, &runner).await?;
    Ok(SweepOutcome::Applied(report))
}

/// Format a sweep outcome for terminal output
pub fn format_outcome(outcome: &SweepOutcome) -> String {
    match outcome {
        SweepOutcome::Counted(n) => format!("{n} item(s) matched"),
        SweepOutcome::DryRun { pending, action } => {
            format!("would {action} on {pending} item(s); re-run with --apply")
        }
        SweepOutcome::Applied(report) => format!(
            "{} matched, {} applied, {} failed",
            report.matched, report.applied, report.failed
        ),
    }
}
