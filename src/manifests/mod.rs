pub mod config_map;
pub mod daemonset;
pub mod namespace;
pub mod rbac;
pub mod service_account;

use crate::Result;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::Resource;
use std::collections::BTreeMap;
use std::fmt;

pub use config_map::collector_config_map;
pub use daemonset::{collector_daemonset, DaemonSetParams};
pub use namespace::collector_namespace;
pub use rbac::{collector_cluster_role, collector_cluster_role_binding};
pub use service_account::collector_service_account;

pub const NAMESPACE: &str = "aws-otel-eks";
pub const SERVICE_ACCOUNT: &str = "aws-otel-sa";
pub const CONFIG_MAP: &str = "otel-agent-conf";
pub const DAEMONSET: &str = "aws-otel-eks-ci";
pub const CONTAINER: &str = "aws-otel-collector";
pub const CLUSTER_ROLE: &str = "aoc-agent-role";
pub const CLUSTER_ROLE_BINDING: &str = "aoc-agent-role-binding";

pub const DEFAULT_IMAGE: &str = "public.ecr.aws/aws-observability/aws-otel-collector:latest";

/// Annotation EKS's pod identity webhook reads to inject role credentials.
pub const ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

pub(crate) fn object_meta(
    name: &str,
    namespace: Option<&str>,
    labels: &[(&str, &str)],
) -> ObjectMeta {
    let labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        labels: if labels.is_empty() { None } else { Some(labels) },
        ..Default::default()
    }
}

/// Stable identity of a manifest: `Kind/name` or `Kind/namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManifestId {
    pub kind: &'static str,
    pub namespace: Option<String>,
    pub name: String,
}

impl ManifestId {
    pub fn of<K: Resource>(name: &str, namespace: Option<&str>) -> Self {
        Self {
            kind: K::KIND,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// One Kubernetes object the descriptor submits.
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Namespace(Namespace),
    ServiceAccount(ServiceAccount),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    ConfigMap(ConfigMap),
    DaemonSet(DaemonSet),
}

impl Manifest {
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Manifest::Namespace(o) => &o.metadata,
            Manifest::ServiceAccount(o) => &o.metadata,
            Manifest::ClusterRole(o) => &o.metadata,
            Manifest::ClusterRoleBinding(o) => &o.metadata,
            Manifest::ConfigMap(o) => &o.metadata,
            Manifest::DaemonSet(o) => &o.metadata,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Namespace(_) => Namespace::KIND,
            Manifest::ServiceAccount(_) => ServiceAccount::KIND,
            Manifest::ClusterRole(_) => ClusterRole::KIND,
            Manifest::ClusterRoleBinding(_) => ClusterRoleBinding::KIND,
            Manifest::ConfigMap(_) => ConfigMap::KIND,
            Manifest::DaemonSet(_) => DaemonSet::KIND,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    pub fn id(&self) -> ManifestId {
        ManifestId {
            kind: self.kind(),
            namespace: self.namespace().map(str::to_string),
            name: self.name().to_string(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        let yaml = match self {
            Manifest::Namespace(o) => serde_yaml::to_string(o)?,
            Manifest::ServiceAccount(o) => serde_yaml::to_string(o)?,
            Manifest::ClusterRole(o) => serde_yaml::to_string(o)?,
            Manifest::ClusterRoleBinding(o) => serde_yaml::to_string(o)?,
            Manifest::ConfigMap(o) => serde_yaml::to_string(o)?,
            Manifest::DaemonSet(o) => serde_yaml::to_string(o)?,
        };
        Ok(yaml)
    }
}
