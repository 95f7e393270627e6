//! creds.rs
//!
//! SDK-config construction. Cross-account access works the same way in every
//! tool: a base config from the ambient credentials, then an assumed
//! operations role in whichever purpose account the tool is targeting.

use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_sdk_sts as sts;
use aws_types::{SdkConfig, region::Region};
use eyre::Result;
use log::debug;

/// Format the ARN of `role_name` in `account_id`.
pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

/// Load the ambient (non-assumed) config pinned to `region`.
pub async fn base_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_owned()))
        .load()
        .await
}

/// Build a config whose credentials come from assuming `role_name` in
/// `account_id`, layered on the base config's credentials.
pub async fn assumed_config(
    base_conf: &SdkConfig,
    account_id: &str,
    role_name: &str,
    region: &str,
    session_name: &str,
) -> SdkConfig {
    let arn = role_arn(account_id, role_name);
    debug!("assuming {arn} in {region}");
    let region = Region::new(region.to_owned());

    let provider = AssumeRoleProvider::builder(arn)
        .session_name(session_name)
        .region(region.clone())
        .configure(base_conf)
        .build()
        .await;

    aws_config::defaults(BehaviorVersion::latest())
        .region(RegionProviderChain::first_try(region))
        .credentials_provider(provider)
        .load()
        .await
}

/// The account id behind the current credentials.
pub async fn caller_account(conf: &SdkConfig) -> Result<String> {
    debug!("Calling STS GetCallerIdentity…");
    let caller_account = sts::Client::new(conf)
        .get_caller_identity()
        .send()
        .await?
        .account()
        .unwrap_or_default()
        .to_owned();
    debug!("Caller account = {}", caller_account);
    Ok(caller_account)
}
