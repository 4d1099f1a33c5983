//! The collector DaemonSet: one ADOT collector per node.

use super::{object_meta, CONFIG_MAP, CONTAINER, DAEMONSET, NAMESPACE, SERVICE_ACCOUNT};
use crate::collector;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EnvVar, EnvVarSource, HostPathVolumeSource, KeyToPath,
    ObjectFieldSelector, PodSpec, PodTemplateSpec, ResourceRequirements, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

const CONFIG_VOLUME: &str = "otel-agent-config-vol";
const CPU: &str = "200m";
const MEMORY: &str = "200Mi";

/// Host paths the receiver reads node and container statistics from:
/// (volume name, host path, container mount path).
pub const HOST_MOUNTS: [(&str, &str, &str); 6] = [
    ("rootfs", "/", "/rootfs"),
    ("dockersock", "/var/run/docker.sock", "/var/run/docker.sock"),
    ("varlibdocker", "/var/lib/docker", "/var/lib/docker"),
    (
        "containerdsock",
        "/run/containerd/containerd.sock",
        "/run/containerd/containerd.sock",
    ),
    ("sys", "/sys", "/sys"),
    ("devdisk", "/dev/disk", "/dev/disk"),
];

/// Downward API fields exposed to the collector: (variable, field path).
const FIELD_ENV: [(&str, &str); 4] = [
    ("K8S_NODE_NAME", "spec.nodeName"),
    ("HOST_IP", "status.hostIP"),
    ("HOST_NAME", "spec.nodeName"),
    ("K8S_NAMESPACE", "metadata.namespace"),
];

#[derive(Debug, Clone)]
pub struct DaemonSetParams<'a> {
    pub image: &'a str,
}

pub fn collector_daemonset(params: &DaemonSetParams<'_>) -> DaemonSet {
    let labels = BTreeMap::from([("name".to_string(), DAEMONSET.to_string())]);

    DaemonSet {
        metadata: object_meta(DAEMONSET, Some(NAMESPACE), &[]),
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![collector_container(params.image)],
                    volumes: Some(volumes()),
                    service_account_name: Some(SERVICE_ACCOUNT.to_string()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn collector_container(image: &str) -> Container {
    let env = FIELD_ENV
        .iter()
        .map(|(name, field_path)| EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: field_path.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    let mut volume_mounts: Vec<VolumeMount> = HOST_MOUNTS
        .iter()
        .map(|(name, _, mount_path)| VolumeMount {
            name: name.to_string(),
            mount_path: mount_path.to_string(),
            read_only: Some(true),
            ..Default::default()
        })
        .collect();
    volume_mounts.push(VolumeMount {
        name: CONFIG_VOLUME.to_string(),
        mount_path: collector::CONFIG_DIR.to_string(),
        ..Default::default()
    });

    let quantities = BTreeMap::from([
        ("cpu".to_string(), Quantity(CPU.to_string())),
        ("memory".to_string(), Quantity(MEMORY.to_string())),
    ]);

    Container {
        name: CONTAINER.to_string(),
        image: Some(image.to_string()),
        image_pull_policy: Some("Always".to_string()),
        command: Some(vec![
            "/awscollector".to_string(),
            format!("--config={}", collector::config_path()),
        ]),
        env: Some(env),
        volume_mounts: Some(volume_mounts),
        resources: Some(ResourceRequirements {
            limits: Some(quantities.clone()),
            requests: Some(quantities),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn volumes() -> Vec<Volume> {
    let mut volumes = vec![Volume {
        name: CONFIG_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: Some(CONFIG_MAP.to_string()),
            items: Some(vec![KeyToPath {
                key: collector::CONFIG_KEY.to_string(),
                path: collector::CONFIG_FILE.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }];

    volumes.extend(HOST_MOUNTS.iter().map(|(name, host_path, _)| Volume {
        name: name.to_string(),
        host_path: Some(HostPathVolumeSource {
            path: host_path.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }));

    volumes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_spec() -> PodSpec {
        collector_daemonset(&DaemonSetParams {
            image: super::super::DEFAULT_IMAGE,
        })
        .spec
        .unwrap()
        .template
        .spec
        .unwrap()
    }

    #[test]
    fn test_command() {
        let spec = pod_spec();
        assert_eq!(
            spec.containers[0].command.as_deref(),
            Some(
                &[
                    "/awscollector".to_string(),
                    "--config=/conf/otel-agent-config.yaml".to_string()
                ][..]
            )
        );
    }

    #[test]
    fn test_config_map_projection() {
        let spec = pod_spec();
        let config_volumes: Vec<&Volume> = spec
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .filter(|v| v.config_map.is_some())
            .collect();
        assert_eq!(config_volumes.len(), 1);

        let source = config_volumes[0].config_map.as_ref().unwrap();
        let items = source.items.as_ref().unwrap();
        assert_eq!(source.name.as_deref(), Some(CONFIG_MAP));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, "otel-agent-config");

        let mount = spec.containers[0]
            .volume_mounts
            .as_ref()
            .unwrap()
            .iter()
            .find(|m| m.name == config_volumes[0].name)
            .unwrap();
        assert_eq!(format!("{}/{}", mount.mount_path, items[0].path), "/conf/otel-agent-config.yaml");
    }

    #[test]
    fn test_host_paths_are_read_only() {
        let spec = pod_spec();
        let volumes = spec.volumes.as_ref().unwrap();
        let mounts = spec.containers[0].volume_mounts.as_ref().unwrap();

        let mut host_paths: Vec<&str> = volumes
            .iter()
            .filter_map(|v| v.host_path.as_ref())
            .map(|h| h.path.as_str())
            .collect();
        host_paths.sort_unstable();
        assert_eq!(
            host_paths,
            vec![
                "/",
                "/dev/disk",
                "/run/containerd/containerd.sock",
                "/sys",
                "/var/lib/docker",
                "/var/run/docker.sock",
            ]
        );

        for volume in volumes.iter().filter(|v| v.host_path.is_some()) {
            let mount = mounts.iter().find(|m| m.name == volume.name).unwrap();
            assert_eq!(mount.read_only, Some(true), "{} is writable", volume.name);
        }
    }

    #[test]
    fn test_resources_and_identity() {
        let spec = pod_spec();
        let container = &spec.containers[0];
        let resources = container.resources.as_ref().unwrap();

        assert_eq!(resources.limits, resources.requests);
        assert_eq!(resources.limits.as_ref().unwrap()["cpu"], Quantity("200m".to_string()));
        assert_eq!(spec.service_account_name.as_deref(), Some(SERVICE_ACCOUNT));

        let env: Vec<&str> = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(env, vec!["K8S_NODE_NAME", "HOST_IP", "HOST_NAME", "K8S_NAMESPACE"]);
    }
}
