//! CLI argument parsing for sync-roles
//!
//! This module contains only the clap derive structs.
//! Validation happens in config.rs.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "sync-roles", author, version, about)]
pub struct Cli {
    /// Print the resolved account set and exit
    #[clap(long)]
    pub list: bool,

    /// Execute the computed changes (default is a dry-run plan)
    #[clap(long, conflicts_with = "list")]
    pub apply: bool,

    /// IAM role reconciled in each target account
    #[clap(long, default_value = "OpsOperator")]
    pub role_name: String,

    /// Principal ARN allowed to assume the role (required unless --list)
    #[clap(long)]
    pub trusted_principal: Option<String>,

    /// Managed policy ARNs that must be attached to the role
    #[clap(long)]
    pub policy_arns: Vec<String>,

    /// Only reconcile accounts with this purpose
    #[clap(long)]
    pub purpose: Option<String>,

    /// Regions whose accounts are targeted, space- or comma-separated.
    /// Reconciliation defaults to us-east-1 and us-west-2; --list shows
    /// every resolved region unless this is given.
    #[clap(long, value_delimiter = ',', num_args = 1..)]
    pub regions: Option<Vec<String>>,

    /// Team prefix of the account email naming convention
    #[clap(long, default_value = "svcteam")]
    pub team: String,

    /// Role assumed to reach each target account
    #[clap(long, default_value = "OpsAdmin")]
    pub admin_role: String,

    /// Drop the cached account set before resolving
    #[clap(long)]
    pub refresh_cache: bool,
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
    fn cli_defaults() {
        let cli = Cli::parse_from(["sync-roles", "--list"]);
        assert!(cli.list);
        assert!(!cli.apply);
        assert_eq!(cli.role_name, "OpsOperator");
        assert_eq!(cli.admin_role, "OpsAdmin");
        assert!(cli.regions.is_none());
    }

    #[test]
    fn cli_rejects_list_with_apply() {
        assert!(Cli::try_parse_from(["sync-roles", "--list", "--apply"]).is_err());
    }

    #[test]
    fn cli_parses_comma_separated_regions() {
        let cli = Cli::parse_from(["sync-roles", "--list", "--regions", "eu-west-1,us-east-1"]);
        assert_eq!(cli.regions, Some(vec!["eu-west-1".to_string(), "us-east-1".to_string()]));
    }

    #[test]
    fn cli_parses_multiple_policy_arns() {
        let cli = Cli::parse_from([
            "sync-roles",
            "--trusted-principal",
            "arn:aws:iam::123456789012:root",
            "--policy-arns",
            "arn:aws:iam::aws:policy/ReadOnlyAccess",
            "--policy-arns",
            "arn:aws:iam::123456789012:policy/OpsExtra",
        ]);
        assert_eq!(cli.policy_arns.len(), 2);
    }
}
