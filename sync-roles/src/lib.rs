//! sync-roles library
//!
//! Reconciles the team's operations role across the resolved account fleet:
//! fetch the actual IAM state per account, diff it against the desired
//! state, and (only with --apply) execute the changes.
//! This module separates business logic from the CLI shell.

pub mod cli;
pub mod config;
pub mod diff;

pub use cli::Cli;
pub use config::{Config, Mode};
pub use diff::{ActualRole, DesiredRole, RoleChange, decode_trust_document, diff_role};

use aws_sdk_iam as iam;
use eyre::{Result, WrapErr, eyre};
use log::{error, info};
use ops_core::{AccountSet, FileCache, Purpose, ServiceAccount, accounts, creds};
use std::collections::BTreeSet;

/// Outcome of reconciling one account.
#[derive(Debug)]
pub struct AccountReport {
    pub account_id: String,
    pub purpose: Purpose,
    pub region: String,
    pub changes: Vec<RoleChange>,
    pub applied: bool,
    pub error: Option<String>,
}

async fn resolve_fleet(config: &Config) -> Result<(aws_types::SdkConfig, AccountSet)> {
    let base_region = config
        .regions
        .as_ref()
        .and_then(|r| r.first())
        .cloned()
        .unwrap_or_else(|| "us-east-1".to_string());
    let base_conf = creds::base_config(&base_region).await;
    let cache = FileCache::open_default();
    let set = accounts::resolve_cached(&base_conf, &config.team, &cache, config.refresh_cache).await?;
    Ok((base_conf, set))
}

/// Resolve and return the account set (the --list path).
pub async fn list_accounts(config: &Config) -> Result<Vec<ServiceAccount>> {
    let (_, set) = resolve_fleet(config).await?;
    let mut accounts: Vec<ServiceAccount> = target_accounts(&set, config)
        .into_iter()
        .cloned()
        .collect();
    accounts.sort_by(|a, b| (a.purpose.as_str(), &a.region).cmp(&(b.purpose.as_str(), &b.region)));
    Ok(accounts)
}

// With no explicit --regions a listing covers every resolved region.
fn target_accounts<'a>(set: &'a AccountSet, config: &Config) -> Vec<&'a ServiceAccount> {
    set.filter(config.purpose, None)
        .into_iter()
        .filter(|a| config.regions.as_ref().is_none_or(|rs| rs.contains(&a.region)))
        .collect()
}

/// Fetch the current role state in one account; `None` if the role is absent.
pub async fn fetch_actual_role(
    client: &iam::Client,
    role_name: &str,
) -> Result<Option<ActualRole>> {
    let role = match client.get_role().role_name(role_name).send().await {
        Ok(out) => out.role,
        Err(err) => {
            let svc = err.into_service_error();
            if svc.is_no_such_entity_exception() {
                return Ok(None);
            }
            return Err(eyre::Report::new(svc)).wrap_err("GetRole failed");
        }
    };

    let trust_policy = match role.as_ref().and_then(|r| r.assume_role_policy_document()) {
        Some(doc) => Some(decode_trust_document(doc)?),
        None => None,
    };

    let mut policy_arns = BTreeSet::new();
    let mut pages = client
        .list_attached_role_policies()
        .role_name(role_name)
        .into_paginator()
        .send();
    while let Some(page) = pages.next().await {
        for policy in page?.attached_policies() {
            if let Some(arn) = policy.policy_arn() {
                policy_arns.insert(arn.to_owned());
            }
        }
    }

    Ok(Some(ActualRole { trust_policy, policy_arns }))
}

/// Execute a change list against one account's IAM.
pub async fn apply_changes(
    client: &iam::Client,
    desired: &DesiredRole,
    changes: &[RoleChange],
) -> Result<()> {
    for change in changes {
        info!("applying: {change}");
        match change {
            RoleChange::CreateRole => {
                client
                    .create_role()
                    .role_name(&desired.name)
                    .assume_role_policy_document(desired.trust_document()?)
                    .send()
                    .await
                    .wrap_err("CreateRole failed")?;
            }
            RoleChange::UpdateTrust => {
                client
                    .update_assume_role_policy()
                    .role_name(&desired.name)
                    .policy_document(desired.trust_document()?)
                    .send()
                    .await
                    .wrap_err("UpdateAssumeRolePolicy failed")?;
            }
            RoleChange::AttachPolicy(arn) => {
                client
                    .attach_role_policy()
                    .role_name(&desired.name)
                    .policy_arn(arn)
                    .send()
                    .await
                    .wrap_err_with(|| format!("AttachRolePolicy({arn}) failed"))?;
            }
            RoleChange::DetachPolicy(arn) => {
                client
                    .detach_role_policy()
                    .role_name(&desired.name)
                    .policy_arn(arn)
                    .send()
                    .await
                    .wrap_err_with(|| format!("DetachRolePolicy({arn}) failed"))?;
            }
        }
    }
    Ok(())
}

/// Diff (and with Mode::Apply, converge) the role in every target account.
/// Per-account failures are captured in the report rather than aborting the
/// rest of the fleet.
pub async fn reconcile(config: &Config) -> Result<Vec<AccountReport>> {
    let principal = config
        .trusted_principal
        .as_deref()
        .ok_or_else(|| eyre!("reconcile requires a trusted principal"))?;
    let desired = DesiredRole::new(&config.role_name, principal, config.policy_arns.clone());

    let (base_conf, set) = resolve_fleet(config).await?;
    let caller = creds::caller_account(&base_conf).await?;
    let targets = target_accounts(&set, config);
    info!("reconciling {} in {} account(s)", config.role_name, targets.len());

    let mut reports = Vec::new();
    for account in targets {
        info!(
            "--- {} {} ({})",
            account.purpose, account.region, account.account_id
        );
        let mut report = AccountReport {
            account_id: account.account_id.clone(),
            purpose: account.purpose,
            region: account.region.clone(),
            changes: Vec::new(),
            applied: false,
            error: None,
        };

        match reconcile_account(&base_conf, config, &desired, account, &caller).await {
            Ok(changes) => {
                report.changes = changes;
                report.applied = config.mode == Mode::Apply;
            }
            Err(e) => {
                error!("   Error in {}: {:?}", account.account_id, e);
                report.error = Some(format!("{e:#}"));
            }
        }
        reports.push(report);
    }
    Ok(reports)
}

async fn reconcile_account(
    base_conf: &aws_types::SdkConfig,
    config: &Config,
    desired: &DesiredRole,
    account: &ServiceAccount,
    caller: &str,
) -> Result<Vec<RoleChange>> {
    // No assume-role hop when the target is the account we are already in.
    let conf = if account.account_id == caller {
        info!("   {} is the caller account, using ambient credentials", account.account_id);
        base_conf.clone()
    } else {
        creds::assumed_config(
            base_conf,
            &account.account_id,
            &config.admin_role,
            &account.region,
            "sync-roles",
        )
        .await
    };
    let client = iam::Client::new(&conf);

    let actual = fetch_actual_role(&client, &config.role_name).await?;
    let changes = diff_role(desired, actual.as_ref());

    if changes.is_empty() {
        info!("   {} already in sync", config.role_name);
    } else if config.mode == Mode::Apply {
        apply_changes(&client, desired, &changes).await?;
    }
    Ok(changes)
}

/// Format an account for --list output
pub fn format_account(account: &ServiceAccount) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        account.purpose, account.region, account.account_id, account.email
    )
}

/// Format a reconciliation report for terminal output
pub fn format_report(report: &AccountReport) -> String {
    let header = format!(
        "{}\t{}\t{}",
        report.purpose, report.region, report.account_id
    );
    if let Some(e) = &report.error {
        return format!("{header}\tERROR: {e}");
    }
    if report.changes.is_empty() {
        return format!("{header}\tin sync");
    }
    let verb = if report.applied { "applied" } else { "would apply" };
    let changes: Vec<String> = report.changes.iter().map(|c| c.to_string()).collect();
    format!("{header}\t{verb}: {}", changes.join(", "))
}
