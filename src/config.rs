//! Stack configuration.
//!
//! Values come from built-in defaults, then an optional YAML file, then
//! command-line overrides (see [`ConfigOverrides`]).

use crate::cluster::ClusterRef;
use crate::iam::COLLECTOR_ACTIONS;
use crate::manifests::DEFAULT_IMAGE;
use crate::{AdotError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_CLUSTER_NAME: &str = "adot-eks-cluster";
pub const DEFAULT_ACCOUNT: &str = "131332286832";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_FIELD_MANAGER: &str = "adot-eks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    New,
    Import,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSettings {
    pub mode: ClusterMode,
    pub version: String,
    pub default_capacity: u32,
    pub oidc_provider_arn: Option<String>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            mode: ClusterMode::New,
            version: "1.21".to_string(),
            default_capacity: 2,
            oidc_provider_arn: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    pub cluster_name: String,
    pub account: String,
    pub region: String,
    pub cluster: ClusterSettings,
    /// Defaults to `arn:aws:iam::<account>:role/<cluster_name>-adot-collector`.
    pub service_account_role_arn: Option<String>,
    pub image: String,
    pub permissions: Vec<String>,
    pub field_manager: String,
    pub wait_timeout_secs: u64,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            account: DEFAULT_ACCOUNT.to_string(),
            region: DEFAULT_REGION.to_string(),
            cluster: ClusterSettings::default(),
            service_account_role_arn: None,
            image: DEFAULT_IMAGE.to_string(),
            permissions: COLLECTOR_ACTIONS.iter().map(|a| a.to_string()).collect(),
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            wait_timeout_secs: 60,
        }
    }
}

/// Command-line values layered over the file; `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cluster_name: Option<String>,
    pub account: Option<String>,
    pub region: Option<String>,
    pub oidc_provider_arn: Option<String>,
    pub role_arn: Option<String>,
    pub image: Option<String>,
}

/// EKS cluster names: `^[0-9A-Za-z][A-Za-z0-9_-]{0,99}$`.
pub fn is_valid_cluster_name(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());

    first_ok
        && name.len() <= 100
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl StackConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Load `path` if given, otherwise start from defaults, then apply
    /// overrides.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(v) = overrides.cluster_name {
            self.cluster_name = v;
        }
        if let Some(v) = overrides.account {
            self.account = v;
        }
        if let Some(v) = overrides.region {
            self.region = v;
        }
        if let Some(v) = overrides.oidc_provider_arn {
            // Naming an existing provider means attaching to an existing cluster.
            self.cluster.mode = ClusterMode::Import;
            self.cluster.oidc_provider_arn = Some(v);
        }
        if let Some(v) = overrides.role_arn {
            self.service_account_role_arn = Some(v);
        }
        if let Some(v) = overrides.image {
            self.image = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let missing = |field: &str| AdotError::ConfigError(format!("{} must not be empty", field));

        if self.cluster_name.trim().is_empty() {
            return Err(missing("cluster_name"));
        }
        if !is_valid_cluster_name(&self.cluster_name) {
            return Err(AdotError::ConfigError(format!(
                "invalid cluster_name {:?}: use 1-100 letters, digits, '-' or '_', starting with a letter or digit",
                self.cluster_name
            )));
        }
        if self.account.trim().is_empty() {
            return Err(missing("account"));
        }
        if self.region.trim().is_empty() {
            return Err(missing("region"));
        }
        if self.image.trim().is_empty() {
            return Err(missing("image"));
        }
        if self.permissions.is_empty() {
            return Err(missing("permissions"));
        }
        if self.cluster.mode == ClusterMode::Import && self.cluster.oidc_provider_arn.is_none() {
            return Err(AdotError::ConfigError(
                "an imported cluster needs cluster.oidc_provider_arn".to_string(),
            ));
        }
        Ok(())
    }

    pub fn role_arn(&self) -> String {
        self.service_account_role_arn.clone().unwrap_or_else(|| {
            format!(
                "arn:aws:iam::{}:role/{}-adot-collector",
                self.account, self.cluster_name
            )
        })
    }

    pub fn cluster_ref(&self) -> ClusterRef {
        match (self.cluster.mode, &self.cluster.oidc_provider_arn) {
            (ClusterMode::Import, Some(arn)) => ClusterRef::Import {
                name: self.cluster_name.clone(),
                oidc_provider_arn: arn.clone(),
            },
            _ => ClusterRef::New {
                name: self.cluster_name.clone(),
                version: self.cluster.version.clone(),
                default_capacity: self.cluster.default_capacity,
            },
        }
    }
}
