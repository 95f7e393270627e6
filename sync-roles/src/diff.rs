//! diff.rs
//!
//! Pure diffing of desired vs actual IAM role state. IAM returns the
//! assume-role policy document URL-encoded, so comparison happens on decoded
//! `serde_json::Value`s; object key order and whitespace never count as a
//! difference.

use eyre::{Result, WrapErr};
use percent_encoding::percent_decode_str;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fmt;

/// The role state the fleet should converge on.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredRole {
    pub name: String,
    pub trust_policy: Value,
    pub policy_arns: BTreeSet<String>,
}

impl DesiredRole {
    pub fn new(
        name: &str,
        trusted_principal: &str,
        policy_arns: impl IntoIterator<Item = String>,
    ) -> Self {
        let trust_policy = json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": { "AWS": trusted_principal },
                "Action": "sts:AssumeRole"
            }]
        });
        Self {
            name: name.to_owned(),
            trust_policy,
            policy_arns: policy_arns.into_iter().collect(),
        }
    }

    /// The trust policy as the JSON string IAM expects.
    pub fn trust_document(&self) -> Result<String> {
        serde_json::to_string(&self.trust_policy).wrap_err("serializing trust policy")
    }
}

/// What a target account actually has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActualRole {
    pub trust_policy: Option<Value>,
    pub policy_arns: BTreeSet<String>,
}

/// One mutation needed to converge a role.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleChange {
    CreateRole,
    UpdateTrust,
    AttachPolicy(String),
    DetachPolicy(String),
}

impl fmt::Display for RoleChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleChange::CreateRole => write!(f, "create role"),
            RoleChange::UpdateTrust => write!(f, "update trust policy"),
            RoleChange::AttachPolicy(arn) => write!(f, "attach {arn}"),
            RoleChange::DetachPolicy(arn) => write!(f, "detach {arn}"),
        }
    }
}

/// Decode the URL-encoded policy document IAM returns into a JSON value.
pub fn decode_trust_document(doc: &str) -> Result<Value> {
    let decoded = percent_decode_str(doc)
        .decode_utf8()
        .wrap_err("trust document is not valid UTF-8 after decoding")?;
    serde_json::from_str(&decoded).wrap_err("trust document is not valid JSON")
}

/// Compute the ordered change list converging `actual` on `desired`.
/// `None` for `actual` means the role does not exist. An empty list means
/// the role is in sync.
pub fn diff_role(desired: &DesiredRole, actual: Option<&ActualRole>) -> Vec<RoleChange> {
    let Some(actual) = actual else {
        let mut changes = vec![RoleChange::CreateRole];
        changes.extend(desired.policy_arns.iter().cloned().map(RoleChange::AttachPolicy));
        return changes;
    };

    let mut changes = Vec::new();
    if actual.trust_policy.as_ref() != Some(&desired.trust_policy) {
        changes.push(RoleChange::UpdateTrust);
    }
    for arn in desired.policy_arns.difference(&actual.policy_arns) {
        changes.push(RoleChange::AttachPolicy(arn.clone()));
    }
    for arn in actual.policy_arns.difference(&desired.policy_arns) {
        changes.push(RoleChange::DetachPolicy(arn.clone()));
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRINCIPAL: &str = "arn:aws:iam::123456789012:root";
    const POLICY_A: &str = "arn:aws:iam::aws:policy/ReadOnlyAccess";
    const POLICY_B: &str = "arn:aws:iam::123456789012:policy/OpsExtra";

    fn desired(policies: &[&str]) -> DesiredRole {
        DesiredRole::new(
            "OpsOperator",
            PRINCIPAL,
            policies.iter().map(|p| p.to_string()),
        )
    }

    fn in_sync_actual(d: &DesiredRole) -> ActualRole {
        ActualRole {
            trust_policy: Some(d.trust_policy.clone()),
            policy_arns: d.policy_arns.clone(),
        }
    }

    #[test]
    fn missing_role_needs_create_and_attach() {
        let d = desired(&[POLICY_A, POLICY_B]);
        let changes = diff_role(&d, None);
        assert_eq!(changes[0], RoleChange::CreateRole);
        assert_eq!(
            changes.len(),
            3,
            "create plus one attach per desired policy"
        );
        assert!(changes.contains(&RoleChange::AttachPolicy(POLICY_A.to_string())));
        assert!(changes.contains(&RoleChange::AttachPolicy(POLICY_B.to_string())));
    }

    #[test]
    fn in_sync_role_needs_nothing() {
        let d = desired(&[POLICY_A]);
        let actual = in_sync_actual(&d);
        assert!(diff_role(&d, Some(&actual)).is_empty());
    }

    #[test]
    fn trust_drift_triggers_update() {
        let d = desired(&[]);
        let mut actual = in_sync_actual(&d);
        actual.trust_policy = Some(json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": { "AWS": "arn:aws:iam::999999999999:root" },
                "Action": "sts:AssumeRole"
            }]
        }));
        assert_eq!(diff_role(&d, Some(&actual)), vec![RoleChange::UpdateTrust]);
    }

    #[test]
    fn key_order_is_not_drift() {
        let d = desired(&[]);
        let mut actual = in_sync_actual(&d);
        // Same document, keys in a different order.
        actual.trust_policy = Some(
            serde_json::from_str(
                r#"{
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Principal": { "AWS": "arn:aws:iam::123456789012:root" },
                        "Effect": "Allow"
                    }],
                    "Version": "2012-10-17"
                }"#,
            )
            .unwrap(),
        );
        assert!(diff_role(&d, Some(&actual)).is_empty());
    }

    #[test]
    fn policy_drift_attaches_and_detaches() {
        let d = desired(&[POLICY_A]);
        let actual = ActualRole {
            trust_policy: Some(d.trust_policy.clone()),
            policy_arns: [POLICY_B.to_string()].into_iter().collect(),
        };
        let changes = diff_role(&d, Some(&actual));
        assert_eq!(
            changes,
            vec![
                RoleChange::AttachPolicy(POLICY_A.to_string()),
                RoleChange::DetachPolicy(POLICY_B.to_string()),
            ]
        );
    }

    #[test]
    fn decode_trust_document_handles_url_encoding() {
        let encoded = "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%5D%7D";
        let value = decode_trust_document(encoded).unwrap();
        assert_eq!(value["Version"], "2012-10-17");
    }

    #[test]
    fn decode_trust_document_rejects_non_json() {
        assert!(decode_trust_document("not%20json").is_err());
    }

    #[test]
    fn trust_document_serializes() {
        let d = desired(&[]);
        let doc = d.trust_document().unwrap();
        assert!(doc.contains("sts:AssumeRole"));
        assert!(doc.contains(PRINCIPAL));
    }

    #[test]
    fn change_display_is_readable() {
        assert_eq!(RoleChange::CreateRole.to_string(), "create role");
        assert_eq!(
            RoleChange::AttachPolicy(POLICY_A.to_string()).to_string(),
            format!("attach {POLICY_A}")
        );
    }
}
