//! Configuration for ddb-sweep
//!
//! This module validates CLI arguments and parses the typed expression
//! attribute values.

use crate::cli::{ActionKind, Cli};
use aws_sdk_dynamodb::types::AttributeValue;
use eyre::{Result, bail, eyre};
use ops_core::Purpose;
use std::collections::HashMap;
use std::str::FromStr;

/// A resolved purpose account to assume into.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub purpose: Purpose,
    pub role: String,
    pub team: String,
    pub refresh_cache: bool,
}

/// What to do with matching items.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Count,
    Delete,
    Set { attr: String, value: AttributeValue },
}

impl Action {
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Action::Count)
    }
}

/// Validated configuration for ddb-sweep
#[derive(Debug, Clone)]
pub struct Config {
    pub table: String,
    /// Partition key first, sort key second when present.
    pub key_attrs: Vec<String>,
    pub filter_expression: Option<String>,
    pub expr_names: HashMap<String, String>,
    pub expr_values: HashMap<String, AttributeValue>,
    pub action: Action,
    pub limit: Option<usize>,
    pub concurrency: usize,
    pub apply: bool,
    pub region: String,
    pub target: Option<Target>,
}

impl TryFrom<Cli> for Config {
    type Error = eyre::Error;

    fn try_from(cli: Cli) -> Result<Self> {
        if cli.concurrency == 0 {
            bail!("--concurrency must be at least 1");
        }
        if cli.limit == Some(0) {
            bail!("--limit must be at least 1");
        }

        let mut key_attrs = vec![cli.key.clone()];
        if let Some(sk) = &cli.sort_key {
            if sk == &cli.key {
                bail!("--sort-key must differ from --key");
            }
            key_attrs.push(sk.clone());
        }

        let mut expr_names = HashMap::new();
        for pair in &cli.expr_name {
            let (alias, attr) = split_pair(pair)?;
            expr_names.insert(with_prefix(&alias, '#'), attr);
        }
        let mut expr_values = HashMap::new();
        for pair in &cli.expr_value {
            let (name, raw) = split_pair(pair)?;
            expr_values.insert(with_prefix(&name, ':'), parse_attr_value(&raw)?);
        }
        if cli.filter_expression.is_none() && (!expr_names.is_empty() || !expr_values.is_empty()) {
            bail!("--expr-name/--expr-value require --filter-expression");
        }

        let action = match cli.action {
            ActionKind::Count => Action::Count,
            ActionKind::Delete => Action::Delete,
            ActionKind::Set => {
                let pair = cli
                    .set_attr
                    .as_deref()
                    .ok_or_else(|| eyre!("--action set requires --set-attr"))?;
                let (attr, raw) = split_pair(pair)?;
                if key_attrs.contains(&attr) {
                    bail!("--set-attr cannot target the key attribute '{attr}'");
                }
                Action::Set {
                    attr,
                    value: parse_attr_value(&raw)?,
                }
            }
        };
        if cli.set_attr.is_some() && !matches!(action, Action::Set { .. }) {
            bail!("--set-attr only makes sense with --action set");
        }

        let target = match &cli.purpose {
            Some(p) => Some(Target {
                purpose: Purpose::from_str(p)?,
                role: cli.role.clone(),
                team: cli.team.clone(),
                refresh_cache: cli.refresh_cache,
            }),
            None => None,
        };

        Ok(Config {
            table: cli.table,
            key_attrs,
            filter_expression: cli.filter_expression,
            expr_names,
            expr_values,
            action,
            limit: cli.limit,
            concurrency: cli.concurrency,
            apply: cli.apply,
            region: cli.region,
            target,
        })
    }
}

fn split_pair(pair: &str) -> Result<(String, String)> {
    let (k, v) = pair
        .split_once('=')
        .ok_or_else(|| eyre!("Expected name=value, got '{pair}'"))?;
    if k.is_empty() {
        bail!("Empty name in '{pair}'");
    }
    Ok((k.to_owned(), v.to_owned()))
}

fn with_prefix(name: &str, prefix: char) -> String {
    if name.starts_with(prefix) {
        name.to_owned()
    } else {
        format!("{prefix}{name}")
    }
}

/// Parse a typed attribute value: `num:` and `bool:` prefixes, plain
/// strings otherwise.
pub fn parse_attr_value(raw: &str) -> Result<AttributeValue> {
    if let Some(n) = raw.strip_prefix("num:") {
        n.parse::<f64>()
            .map_err(|_| eyre!("'{n}' is not a number"))?;
        return Ok(AttributeValue::N(n.to_owned()));
    }
    if let Some(b) = raw.strip_prefix("bool:") {
        return Ok(AttributeValue::Bool(b.parse().map_err(|_| {
            eyre!("'{b}' is not a boolean (use true or false)")
        })?));
    }
    Ok(AttributeValue::S(raw.to_owned()))
}
