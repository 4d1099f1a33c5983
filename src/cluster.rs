//! Cluster references and the handle the descriptor is built against.
//!
//! A cluster is either planned (`ClusterRef::New`) or imported from an
//! existing EKS control plane (`ClusterRef::Import`). Either way it resolves
//! to a [`ClusterHandle`] carrying the cluster ARN and, when known, the IAM
//! OIDC provider that service account roles federate through.

use crate::{AdotError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const OIDC_PROVIDER_MARKER: &str = ":oidc-provider/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterRef {
    New {
        name: String,
        version: String,
        default_capacity: u32,
    },
    Import {
        name: String,
        oidc_provider_arn: String,
    },
}

impl ClusterRef {
    pub fn name(&self) -> &str {
        match self {
            ClusterRef::New { name, .. } | ClusterRef::Import { name, .. } => name,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ClusterRef::New { .. })
    }

    /// Resolve to a handle in the given partition coordinates.
    ///
    /// New clusters have no OIDC provider yet; `issuer_url` fills it in once
    /// the cluster exists. Imported clusters already name their provider and
    /// reject an issuer URL.
    pub fn resolve(
        &self,
        account: &str,
        region: &str,
        issuer_url: Option<&str>,
    ) -> Result<ClusterHandle> {
        let oidc_provider = match (self, issuer_url) {
            (ClusterRef::Import { name, .. }, Some(_)) => {
                return Err(AdotError::ConfigError(format!(
                    "cluster {} is imported with an OIDC provider ARN; drop the issuer URL",
                    name
                )));
            }
            (ClusterRef::Import { oidc_provider_arn, .. }, None) => {
                Some(OidcProvider::from_arn(oidc_provider_arn)?)
            }
            (ClusterRef::New { .. }, Some(url)) => Some(OidcProvider::from_issuer_url(account, url)?),
            (ClusterRef::New { .. }, None) => None,
        };

        Ok(ClusterHandle {
            name: self.name().to_string(),
            arn: format!("arn:aws:eks:{}:{}:cluster/{}", region, account, self.name()),
            oidc_provider,
        })
    }

    /// eksctl `ClusterConfig` for a planned cluster. Imported clusters
    /// already exist and have nothing to provision.
    pub fn provisioning_document(&self, region: &str) -> Option<ClusterConfig> {
        match self {
            ClusterRef::New {
                name,
                version,
                default_capacity,
            } => Some(ClusterConfig {
                api_version: "eksctl.io/v1alpha5".to_string(),
                kind: "ClusterConfig".to_string(),
                metadata: ClusterMetadata {
                    name: name.clone(),
                    region: region.to_string(),
                    version: version.clone(),
                },
                iam: ClusterIam { with_oidc: true },
                managed_node_groups: vec![NodeGroup {
                    name: format!("{}-default", name),
                    desired_capacity: *default_capacity,
                    min_size: *default_capacity,
                    max_size: *default_capacity,
                }],
            }),
            ClusterRef::Import { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle {
    pub name: String,
    pub arn: String,
    pub oidc_provider: Option<OidcProvider>,
}

impl ClusterHandle {
    /// Kubeconfig context `aws eks update-kubeconfig` writes for this cluster.
    pub fn kube_context(&self) -> &str {
        &self.arn
    }

    pub fn require_oidc_provider(&self) -> Result<&OidcProvider> {
        self.oidc_provider
            .as_ref()
            .ok_or_else(|| AdotError::OidcProviderUnknown(self.name.clone()))
    }
}

/// IAM OIDC identity provider registered for a cluster's issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcProvider {
    arn: String,
    issuer: String,
}

impl OidcProvider {
    pub fn from_arn(arn: &str) -> Result<Self> {
        let invalid = |reason: &str| AdotError::InvalidArn {
            arn: arn.to_string(),
            reason: reason.to_string(),
        };

        if !arn.starts_with("arn:") {
            return Err(invalid("missing arn: prefix"));
        }

        let (prefix, issuer) = arn
            .split_once(OIDC_PROVIDER_MARKER)
            .ok_or_else(|| invalid("not an oidc-provider resource"))?;

        // arn:<partition>:iam::<account>
        let parts: Vec<&str> = prefix.split(':').collect();
        if parts.len() != 5 || parts[2] != "iam" || parts[4].is_empty() {
            return Err(invalid("expected arn:<partition>:iam::<account>"));
        }

        if issuer.is_empty() || issuer.contains("://") {
            return Err(invalid("issuer must be a bare host path"));
        }

        Ok(Self {
            arn: arn.to_string(),
            issuer: issuer.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_issuer_url(account: &str, issuer_url: &str) -> Result<Self> {
        let issuer = issuer_url
            .strip_prefix("https://")
            .unwrap_or(issuer_url)
            .trim_end_matches('/');

        if issuer.is_empty() {
            return Err(AdotError::ConfigError("OIDC issuer URL is empty".to_string()));
        }
        if issuer.contains("://") {
            return Err(AdotError::ConfigError(format!(
                "OIDC issuer must be an https:// URL or a bare host path, got {}",
                issuer_url
            )));
        }

        Ok(Self {
            arn: format!("arn:aws:iam::{}{}{}", account, OIDC_PROVIDER_MARKER, issuer),
            issuer: issuer.to_string(),
        })
    }

    pub fn arn(&self) -> &str {
        &self.arn
    }

    /// Issuer host path, the prefix of the `sub` and `aud` condition keys.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

impl fmt::Display for OidcProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.arn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub api_version: String,
    pub kind: String,
    pub metadata: ClusterMetadata,
    pub iam: ClusterIam,
    pub managed_node_groups: Vec<NodeGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    pub name: String,
    pub region: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIam {
    #[serde(rename = "withOIDC")]
    pub with_oidc: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroup {
    pub name: String,
    pub desired_capacity: u32,
    pub min_size: u32,
    pub max_size: u32,
}
