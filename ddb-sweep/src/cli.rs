//! CLI argument parsing for ddb-sweep
//!
//! This module contains only the clap derive structs.
//! Validation happens in config.rs.

use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Report how many items match (never mutates)
    Count,
    /// Delete matching items via BatchWriteItem
    Delete,
    /// Set one attribute on each matching item
    Set,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "ddb-sweep", author, version, about)]
pub struct Cli {
    /// Table to sweep
    #[clap(long, required = true)]
    pub table: String,

    /// Partition key attribute name
    #[clap(long, required = true)]
    pub key: String,

    /// Sort key attribute name, when the table has one
    #[clap(long)]
    pub sort_key: Option<String>,

    /// Scan filter expression, e.g. "#s = :stale"
    #[clap(long)]
    pub filter_expression: Option<String>,

    /// Expression attribute name, `#alias=attribute` (repeatable)
    #[clap(long)]
    pub expr_name: Vec<String>,

    /// Expression attribute value, `:name=value` (repeatable).
    /// Values are strings unless prefixed `num:` or `bool:`.
    #[clap(long)]
    pub expr_value: Vec<String>,

    /// What to do with matching items
    #[clap(long, value_enum, default_value_t = ActionKind::Count)]
    pub action: ActionKind,

    /// Attribute assignment for --action set, `name=value` (typed like
    /// --expr-value)
    #[clap(long)]
    pub set_attr: Option<String>,

    /// Stop after this many matching items
    #[clap(long)]
    pub limit: Option<usize>,

    /// Write requests in flight at once
    #[clap(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Execute the mutation (delete/set refuse to run without this)
    #[clap(long)]
    pub apply: bool,

    /// Run inside a resolved purpose account instead of the current one
    #[clap(long)]
    pub purpose: Option<String>,

    /// Region of the table (and used for account resolution)
    #[clap(long, default_value = "us-east-1")]
    pub region: String,

    /// Role assumed in the target purpose account
    #[clap(long, default_value = "OpsOperator")]
    pub role: String,

    /// Team prefix of the account email naming convention
    #[clap(long, default_value = "svcteam")]
    pub team: String,

    /// Drop the cached account set before resolving
    #[clap(long)]
    pub refresh_cache: bool,
}
