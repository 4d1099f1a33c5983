//! IAM policy documents for the collector's service account role.

use crate::cluster::OidcProvider;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Actions the collector needs to publish Container Insights metrics.
pub const COLLECTOR_ACTIONS: [&str; 9] = [
    "logs:PutLogEvents",
    "logs:CreateLogGroup",
    "logs:CreateLogStream",
    "logs:DescribeLogStreams",
    "logs:DescribeLogGroups",
    "cloudwatch:PutMetricData",
    "ec2:DescribeVolumes",
    "ec2:DescribeTags",
    "ssm:GetParameter",
];

const WEB_IDENTITY_ACTION: &str = "sts:AssumeRoleWithWebIdentity";
const STS_AUDIENCE: &str = "sts.amazonaws.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// operator -> condition key -> value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<BTreeMap<String, BTreeMap<String, String>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    pub federated: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    Single(String),
    List(Vec<String>),
}

impl Action {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Action::Single(a) => vec![a.as_str()],
            Action::List(list) => list.iter().map(String::as_str).collect(),
        }
    }
}

impl PolicyDocument {
    /// Identity policy granting `actions` on every resource.
    pub fn permissions<S: AsRef<str>>(actions: &[S]) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![Statement {
                effect: Effect::Allow,
                principal: None,
                action: Action::List(actions.iter().map(|a| a.as_ref().to_string()).collect()),
                resource: Some("*".to_string()),
                condition: None,
            }],
        }
    }

    /// Role trust policy letting exactly one service account assume the role
    /// through the cluster's OIDC provider.
    pub fn service_account_trust(
        provider: &OidcProvider,
        namespace: &str,
        service_account: &str,
    ) -> Self {
        let mut string_equals = BTreeMap::new();
        string_equals.insert(
            format!("{}:sub", provider.issuer()),
            format!("system:serviceaccount:{}:{}", namespace, service_account),
        );
        string_equals.insert(
            format!("{}:aud", provider.issuer()),
            STS_AUDIENCE.to_string(),
        );

        let mut condition = BTreeMap::new();
        condition.insert("StringEquals".to_string(), string_equals);

        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![Statement {
                effect: Effect::Allow,
                principal: Some(Principal {
                    federated: provider.arn().to_string(),
                }),
                action: Action::Single(WEB_IDENTITY_ACTION.to_string()),
                resource: None,
                condition: Some(condition),
            }],
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The IAM side of the collector's identity: the role the service account is
/// annotated with and the documents that role needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountRole {
    pub role_arn: String,
    pub permissions: PolicyDocument,
    pub trust: Option<PolicyDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> OidcProvider {
        OidcProvider::from_arn(
            "arn:aws:iam::131332286832:oidc-provider/oidc.eks.us-east-1.amazonaws.com/id/ABC",
        )
        .unwrap()
    }

    #[test]
    fn test_permission_policy_has_exactly_the_collector_actions() {
        let policy = PolicyDocument::permissions(&COLLECTOR_ACTIONS);

        assert_eq!(policy.statement.len(), 1);
        let statement = &policy.statement[0];
        assert_eq!(statement.effect, Effect::Allow);
        assert_eq!(statement.resource.as_deref(), Some("*"));
        assert_eq!(statement.action.names(), COLLECTOR_ACTIONS.to_vec());
    }

    #[test]
    fn test_permission_policy_json_shape() {
        let policy = PolicyDocument::permissions(&["ssm:GetParameter"]);
        let value = serde_json::to_value(&policy).unwrap();

        assert_eq!(
            value,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": ["ssm:GetParameter"],
                    "Resource": "*"
                }]
            })
        );
    }

    #[test]
    fn test_trust_policy_conditions() {
        let policy = PolicyDocument::service_account_trust(&provider(), "aws-otel-eks", "aws-otel-sa");
        let value = serde_json::to_value(&policy).unwrap();
        let statement = &value["Statement"][0];

        assert_eq!(statement["Action"], "sts:AssumeRoleWithWebIdentity");
        assert_eq!(
            statement["Principal"]["Federated"],
            "arn:aws:iam::131332286832:oidc-provider/oidc.eks.us-east-1.amazonaws.com/id/ABC"
        );
        assert_eq!(
            statement["Condition"]["StringEquals"]["oidc.eks.us-east-1.amazonaws.com/id/ABC:sub"],
            "system:serviceaccount:aws-otel-eks:aws-otel-sa"
        );
        assert_eq!(
            statement["Condition"]["StringEquals"]["oidc.eks.us-east-1.amazonaws.com/id/ABC:aud"],
            "sts.amazonaws.com"
        );
        assert!(statement.get("Resource").is_none());
    }

    #[test]
    fn test_policy_json_is_deterministic() {
        let a = PolicyDocument::service_account_trust(&provider(), "ns", "sa")
            .to_json_pretty()
            .unwrap();
        let b = PolicyDocument::service_account_trust(&provider(), "ns", "sa")
            .to_json_pretty()
            .unwrap();
        assert_eq!(a, b);
    }
}
