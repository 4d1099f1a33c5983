//! Cluster-wide read access for the Container Insights receiver.
//!
//! The receiver lists pods, nodes and workloads to label metrics, and elects
//! one collector as cluster leader through a ConfigMap and a Lease.

use super::{object_meta, CLUSTER_ROLE, CLUSTER_ROLE_BINDING, NAMESPACE, SERVICE_ACCOUNT};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};

const LEADER_CONFIG_MAP: &str = "otel-container-insight-clusterleader";

fn rule(api_group: &str, resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(resources.iter().map(|r| r.to_string()).collect()),
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
        ..Default::default()
    }
}

pub fn collector_cluster_role() -> ClusterRole {
    let mut leader = rule("", &["configmaps"], &["get", "update"]);
    leader.resource_names = Some(vec![LEADER_CONFIG_MAP.to_string()]);

    ClusterRole {
        metadata: object_meta(CLUSTER_ROLE, None, &[]),
        rules: Some(vec![
            rule("", &["pods", "nodes", "endpoints"], &["list", "watch"]),
            rule("apps", &["replicasets"], &["list", "watch"]),
            rule("batch", &["jobs"], &["list", "watch"]),
            rule("", &["nodes/proxy"], &["get"]),
            rule("", &["nodes/stats", "configmaps", "events"], &["create", "get"]),
            leader,
            rule("coordination.k8s.io", &["leases"], &["create", "get", "update"]),
        ]),
        ..Default::default()
    }
}

pub fn collector_cluster_role_binding() -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: object_meta(CLUSTER_ROLE_BINDING, None, &[]),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: CLUSTER_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: SERVICE_ACCOUNT.to_string(),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        }]),
    }
}
