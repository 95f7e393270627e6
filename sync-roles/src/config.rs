//! Configuration for sync-roles
//!
//! This module validates CLI arguments and provides defaults.

use crate::cli::Cli;
use eyre::{Result, bail};
use ops_core::Purpose;
use std::str::FromStr;

/// Mode of operation for sync-roles
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Print the resolved account set
    List,
    /// Compute and print the per-account change plan
    Plan,
    /// Compute and execute the per-account changes
    Apply,
}

/// Regions reconciled when --regions is not given.
pub const DEFAULT_REGIONS: [&str; 2] = ["us-east-1", "us-west-2"];

/// Validated configuration for sync-roles
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub role_name: String,
    pub trusted_principal: Option<String>,
    pub policy_arns: Vec<String>,
    pub purpose: Option<Purpose>,
    /// `None` means every resolved region (only --list reaches this).
    pub regions: Option<Vec<String>>,
    pub team: String,
    pub admin_role: String,
    pub refresh_cache: bool,
}

impl TryFrom<Cli> for Config {
    type Error = eyre::Error;

    fn try_from(cli: Cli) -> Result<Self> {
        let mode = if cli.list {
            Mode::List
        } else if cli.apply {
            Mode::Apply
        } else {
            Mode::Plan
        };

        let regions = match cli.regions {
            Some(r) if r.is_empty() => bail!("At least one region must be specified"),
            Some(r) => Some(r),
            // Listing covers the whole fleet; mutation stays scoped.
            None if mode == Mode::List => None,
            None => Some(DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect()),
        };

        if mode != Mode::List && cli.trusted_principal.is_none() {
            bail!("--trusted-principal is required unless --list");
        }
        if let Some(principal) = &cli.trusted_principal {
            if !principal.starts_with("arn:aws:iam::") && !principal.starts_with("arn:aws:sts::") {
                bail!(
                    "Invalid principal ARN: '{}'. Expected an IAM or STS principal ARN",
                    principal
                );
            }
        }
        for arn in &cli.policy_arns {
            if !arn.starts_with("arn:aws:iam::") || !arn.contains(":policy/") {
                bail!(
                    "Invalid policy ARN format: '{}'. Expected format: arn:aws:iam::<account>:policy/<name>",
                    arn
                );
            }
        }

        let purpose = match &cli.purpose {
            Some(p) => Some(Purpose::from_str(p)?),
            None => None,
        };

        Ok(Config {
            mode,
            role_name: cli.role_name,
            trusted_principal: cli.trusted_principal,
            policy_arns: cli.policy_arns,
            purpose,
            regions,
            team: cli.team,
            admin_role: cli.admin_role,
            refresh_cache: cli.refresh_cache,
        })
    }
}
