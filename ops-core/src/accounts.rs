//! accounts.rs
//!
//! Resolution of the team's "purpose" accounts. Every account the team owns
//! follows an email naming convention, `<team>+<purpose>-<region>@...`, so
//! the full account set can be recovered by paging Organizations
//! ListAccounts and regex-matching each account email. The resolved set is
//! normally memoized on disk via [`crate::cache::FileCache`].

use aws_sdk_organizations as org;
use aws_types::SdkConfig;
use eyre::{Result, bail};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role a named account plays in the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    ControlPlane,
    DataPlane,
    ComputeService,
    Billing,
    Tooling,
}

impl Purpose {
    pub const ALL: [Purpose; 5] = [
        Purpose::ControlPlane,
        Purpose::DataPlane,
        Purpose::ComputeService,
        Purpose::Billing,
        Purpose::Tooling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::ControlPlane => "control-plane",
            Purpose::DataPlane => "data-plane",
            Purpose::ComputeService => "compute-service",
            Purpose::Billing => "billing",
            Purpose::Tooling => "tooling",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self> {
        for p in Purpose::ALL {
            if p.as_str() == s {
                return Ok(p);
            }
        }
        bail!(
            "Unknown purpose: '{}'. Expected one of: {}",
            s,
            Purpose::ALL.map(|p| p.as_str()).join(", ")
        )
    }
}

/// One resolved account in the team's fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub account_id: String,
    pub email: String,
    pub name: String,
    pub purpose: Purpose,
    pub region: String,
}

/// The email naming convention that maps an account to (purpose, region).
///
/// Local part layout is `<team>+<purpose>-<region>`, e.g.
/// `svcteam+control-plane-us-east-1@example.com`.
#[derive(Debug, Clone)]
pub struct NamingConvention {
    re: Regex,
}

impl NamingConvention {
    pub fn new(team: &str) -> Result<Self> {
        let re = Regex::new(&format!(
            r"^{}\+(?P<purpose>[a-z-]+)-(?P<region>[a-z]{{2}}-[a-z]+-\d+)@",
            regex::escape(team)
        ))?;
        Ok(Self { re })
    }

    /// Classify an account email; `None` when the email does not follow the
    /// convention or names a purpose this toolset does not know about.
    pub fn classify(&self, email: &str) -> Option<(Purpose, String)> {
        let caps = self.re.captures(email)?;
        let purpose = match Purpose::from_str(&caps["purpose"]) {
            Ok(p) => p,
            Err(_) => {
                debug!("email {email} matches convention but purpose is unknown");
                return None;
            }
        };
        Some((purpose, caps["region"].to_owned()))
    }
}

/// The full resolved account set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSet {
    pub accounts: Vec<ServiceAccount>,
}

impl AccountSet {
    /// The unique account for a (purpose, region) pair. Missing or duplicate
    /// matches are an error here rather than at discovery time so listings
    /// can still show a messy fleet.
    pub fn lookup(&self, purpose: Purpose, region: &str) -> Result<&ServiceAccount> {
        let mut matches = self
            .accounts
            .iter()
            .filter(|a| a.purpose == purpose && a.region == region);
        let Some(first) = matches.next() else {
            bail!("No {purpose} account resolved in {region}");
        };
        if let Some(second) = matches.next() {
            bail!(
                "Ambiguous {purpose} account in {region}: both {} and {} match",
                first.account_id,
                second.account_id
            );
        }
        Ok(first)
    }

    pub fn filter(&self, purpose: Option<Purpose>, region: Option<&str>) -> Vec<&ServiceAccount> {
        self.accounts
            .iter()
            .filter(|a| purpose.is_none_or(|p| a.purpose == p))
            .filter(|a| region.is_none_or(|r| a.region == r))
            .collect()
    }

    /// Sorted, de-duplicated set of regions present in the fleet.
    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self.accounts.iter().map(|a| a.region.clone()).collect();
        regions.sort();
        regions.dedup();
        regions
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Discovers the account set by paging Organizations ListAccounts.
pub struct AccountResolver {
    client: org::Client,
    convention: NamingConvention,
}

impl AccountResolver {
    pub fn new(conf: &SdkConfig, convention: NamingConvention) -> Self {
        Self {
            client: org::Client::new(conf),
            convention,
        }
    }

    /// Page every account in the organization, keeping ACTIVE accounts whose
    /// email matches the naming convention.
    pub async fn resolve_all(&self) -> Result<AccountSet> {
        info!("Enumerating accounts via AWS Organizations…");
        let mut accounts = Vec::new();

        let mut pages = self.client.list_accounts().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page?;
            for acct in page.accounts() {
                if !matches!(acct.status(), Some(org::types::AccountStatus::Active)) {
                    debug!(
                        "skipping non-active account {}",
                        acct.id().unwrap_or_default()
                    );
                    continue;
                }
                let email = acct.email().unwrap_or_default();
                let Some((purpose, region)) = self.convention.classify(email) else {
                    debug!("skipping {email}: not a purpose account");
                    continue;
                };
                accounts.push(ServiceAccount {
                    account_id: acct.id().unwrap_or_default().to_owned(),
                    email: email.to_owned(),
                    name: acct.name().unwrap_or_default().to_owned(),
                    purpose,
                    region,
                });
            }
        }

        info!("Resolved {} purpose accounts", accounts.len());
        Ok(AccountSet { accounts })
    }
}

/// How long a cached account set stays valid.
pub const ACCOUNT_CACHE_MAX_AGE: std::time::Duration =
    std::time::Duration::from_secs(24 * 60 * 60);

/// Resolve the account set through the file cache, hitting Organizations
/// only on a miss (or when `refresh` drops the cached copy first).
pub async fn resolve_cached(
    base_conf: &SdkConfig,
    team: &str,
    cache: &crate::cache::FileCache,
    refresh: bool,
) -> Result<AccountSet> {
    let key = format!("accounts-{team}");
    if refresh {
        cache.invalidate(&key)?;
    }
    let convention = NamingConvention::new(team)?;
    cache
        .load_or_fetch(&key, ACCOUNT_CACHE_MAX_AGE, || async {
            AccountResolver::new(base_conf, convention).resolve_all().await
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(id: &str, purpose: Purpose, region: &str) -> ServiceAccount {
        ServiceAccount {
            account_id: id.to_string(),
            email: format!("svcteam+{purpose}-{region}@example.com"),
            name: format!("{purpose}-{region}"),
            purpose,
            region: region.to_string(),
        }
    }

    #[test]
    fn purpose_round_trips_through_display() {
        for p in Purpose::ALL {
            assert_eq!(Purpose::from_str(p.as_str()).unwrap(), p);
        }
    }

    #[test]
    fn purpose_rejects_unknown_name() {
        let err = Purpose::from_str("mainframe").unwrap_err();
        assert!(err.to_string().contains("Unknown purpose"));
    }

    #[test]
    fn convention_classifies_control_plane_email() {
        let nc = NamingConvention::new("svcteam").unwrap();
        let (purpose, region) = nc
            .classify("svcteam+control-plane-us-east-1@example.com")
            .unwrap();
        assert_eq!(purpose, Purpose::ControlPlane);
        assert_eq!(region, "us-east-1");
    }

    #[test]
    fn convention_ignores_other_teams() {
        let nc = NamingConvention::new("svcteam").unwrap();
        assert!(nc.classify("otherteam+billing-us-east-1@example.com").is_none());
    }

    #[test]
    fn convention_ignores_unknown_purpose() {
        let nc = NamingConvention::new("svcteam").unwrap();
        assert!(nc.classify("svcteam+mainframe-us-east-1@example.com").is_none());
    }

    #[test]
    fn convention_ignores_plain_emails() {
        let nc = NamingConvention::new("svcteam").unwrap();
        assert!(nc.classify("svcteam@example.com").is_none());
    }

    #[test]
    fn convention_escapes_regex_metacharacters_in_team() {
        let nc = NamingConvention::new("svc.team").unwrap();
        assert!(nc.classify("svcxteam+billing-us-east-1@example.com").is_none());
        assert!(nc.classify("svc.team+billing-us-east-1@example.com").is_some());
    }

    #[test]
    fn lookup_finds_unique_account() {
        let set = AccountSet {
            accounts: vec![
                acct("111111111111", Purpose::ControlPlane, "us-east-1"),
                acct("222222222222", Purpose::ControlPlane, "us-west-2"),
            ],
        };
        let a = set.lookup(Purpose::ControlPlane, "us-west-2").unwrap();
        assert_eq!(a.account_id, "222222222222");
    }

    #[test]
    fn lookup_errors_on_missing_account() {
        let set = AccountSet::default();
        let err = set.lookup(Purpose::Billing, "us-east-1").unwrap_err();
        assert!(err.to_string().contains("No billing account"));
    }

    #[test]
    fn lookup_errors_on_duplicate_pair() {
        let set = AccountSet {
            accounts: vec![
                acct("111111111111", Purpose::DataPlane, "us-east-1"),
                acct("222222222222", Purpose::DataPlane, "us-east-1"),
            ],
        };
        let err = set.lookup(Purpose::DataPlane, "us-east-1").unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
    }

    #[test]
    fn filter_by_purpose_and_region() {
        let set = AccountSet {
            accounts: vec![
                acct("1", Purpose::ControlPlane, "us-east-1"),
                acct("2", Purpose::DataPlane, "us-east-1"),
                acct("3", Purpose::DataPlane, "us-west-2"),
            ],
        };
        assert_eq!(set.filter(Some(Purpose::DataPlane), None).len(), 2);
        assert_eq!(set.filter(None, Some("us-east-1")).len(), 2);
        assert_eq!(set.filter(Some(Purpose::DataPlane), Some("us-west-2")).len(), 1);
        assert_eq!(set.filter(None, None).len(), 3);
    }

    #[test]
    fn regions_are_sorted_and_unique() {
        let set = AccountSet {
            accounts: vec![
                acct("1", Purpose::ControlPlane, "us-west-2"),
                acct("2", Purpose::DataPlane, "us-east-1"),
                acct("3", Purpose::Tooling, "us-west-2"),
            ],
        };
        assert_eq!(set.regions(), vec!["us-east-1", "us-west-2"]);
    }

    #[test]
    fn account_set_serializes_round_trip() {
        let set = AccountSet {
            accounts: vec![acct("111111111111", Purpose::Billing, "eu-west-1")],
        };
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("\"billing\""));
        let back: AccountSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.accounts, set.accounts);
    }
}
