//! OpenTelemetry Collector pipeline shipped to every node.
//!
//! The collector scrapes Container Insights metrics with the
//! `awscontainerinsightreceiver`, batches them and writes them as embedded
//! metric format logs to CloudWatch through `awsemf`.

use crate::{AdotError, Result};
use serde_yaml::Value;

/// ConfigMap key holding the pipeline, and the file name it is projected to.
pub const CONFIG_KEY: &str = "otel-agent-config";
pub const CONFIG_FILE: &str = "otel-agent-config.yaml";
pub const CONFIG_DIR: &str = "/conf";

// `{NodeName}` is resolved by the awsemf exporter at runtime.
const PIPELINE_TEMPLATE: &str = r#"extensions:
  health_check:

receivers:
  awscontainerinsightreceiver:

processors:
  batch/metrics:
    timeout: 60s

exporters:
  awsemf:
    namespace: ContainerInsights
    log_group_name: ''
    log_stream_name: '{NodeName}'
    resource_to_telemetry_conversion:
      enabled: true
    dimension_rollup_option: NoDimensionRollup
    parse_json_encoded_attr_values: [Sources, kubernetes]
    metric_declarations:
      # node metrics
      - dimensions: [[NodeName, InstanceId, ClusterName]]
        metric_name_selectors:
          - node_cpu_utilization
          - node_memory_utilization
          - node_network_total_bytes
          - node_cpu_reserved_capacity
          - node_memory_reserved_capacity
          - node_number_of_running_pods
          - node_number_of_running_containers
      - dimensions: [[ClusterName]]
        metric_name_selectors:
          - node_cpu_utilization
          - node_memory_utilization
          - node_network_total_bytes
          - node_cpu_reserved_capacity
          - node_memory_reserved_capacity
          - node_number_of_running_pods
          - node_number_of_running_containers
          - node_cpu_usage_total
          - node_cpu_limit
          - node_memory_working_set
          - node_memory_limit
      # pod metrics
      - dimensions: [[PodName, Namespace, ClusterName], [Service, Namespace, ClusterName], [Namespace, ClusterName], [ClusterName]]
        metric_name_selectors:
          - pod_cpu_utilization
          - pod_memory_utilization
          - pod_network_rx_bytes
          - pod_network_tx_bytes
          - pod_cpu_utilization_over_pod_limit
          - pod_memory_utilization_over_pod_limit
      - dimensions: [[PodName, Namespace, ClusterName], [ClusterName]]
        metric_name_selectors:
          - pod_cpu_reserved_capacity
          - pod_memory_reserved_capacity
      - dimensions: [[PodName, Namespace, ClusterName]]
        metric_name_selectors:
          - pod_number_of_container_restarts
      # cluster metrics
      - dimensions: [[ClusterName]]
        metric_name_selectors:
          - cluster_node_count
          - cluster_failed_node_count
      # service metrics
      - dimensions: [[Service, Namespace, ClusterName], [ClusterName]]
        metric_name_selectors:
          - service_number_of_running_pods
      # node fs metrics
      - dimensions: [[NodeName, InstanceId, ClusterName], [ClusterName]]
        metric_name_selectors:
          - node_filesystem_utilization
      # namespace metrics
      - dimensions: [[Namespace, ClusterName], [ClusterName]]
        metric_name_selectors:
          - namespace_number_of_running_pods

service:
  pipelines:
    metrics:
      receivers: [awscontainerinsightreceiver]
      processors: [batch/metrics]
      exporters: [awsemf]

  extensions: [health_check]
"#;

/// Full path the collector reads its configuration from.
pub fn config_path() -> String {
    format!("{}/{}", CONFIG_DIR, CONFIG_FILE)
}

pub fn log_group_name(cluster_name: &str) -> String {
    format!("/aws/containerinsights/{}/performance", cluster_name)
}

/// Render the pipeline for one cluster. The log group is set on the parsed
/// document so the cluster name is always emitted as a properly quoted scalar.
pub fn render(cluster_name: &str) -> Result<String> {
    let mut config: Value = serde_yaml::from_str(PIPELINE_TEMPLATE)?;

    let awsemf = config
        .get_mut("exporters")
        .and_then(|exporters| exporters.get_mut("awsemf"))
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| {
            AdotError::ConfigError("collector pipeline has no awsemf exporter".to_string())
        })?;
    awsemf.insert(
        Value::from("log_group_name"),
        Value::from(log_group_name(cluster_name)),
    );

    Ok(serde_yaml::to_string(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(cluster_name: &str) -> Value {
        serde_yaml::from_str(&render(cluster_name).unwrap()).unwrap()
    }

    #[test]
    fn test_top_level_sections() {
        let config = parsed("demo");
        for key in ["extensions", "receivers", "processors", "exporters", "service"] {
            assert!(config.get(key).is_some(), "missing {}", key);
        }
        assert!(config["service"].get("pipelines").is_some());
        assert_eq!(config["service"]["extensions"][0].as_str(), Some("health_check"));
    }

    #[test]
    fn test_log_group_uses_cluster_name() {
        let config = parsed("demo");
        assert_eq!(
            config["exporters"]["awsemf"]["log_group_name"].as_str(),
            Some(log_group_name("demo").as_str())
        );
        assert_eq!(
            config["exporters"]["awsemf"]["log_stream_name"].as_str(),
            Some("{NodeName}")
        );
    }

    #[test]
    fn test_metrics_pipeline_wiring() {
        let config = parsed("demo");
        let metrics = &config["service"]["pipelines"]["metrics"];

        assert_eq!(metrics["receivers"][0].as_str(), Some("awscontainerinsightreceiver"));
        assert_eq!(metrics["processors"][0].as_str(), Some("batch/metrics"));
        assert_eq!(metrics["exporters"][0].as_str(), Some("awsemf"));
    }

    #[test]
    fn test_log_group_survives_quote_characters() {
        for name in ["a''b", "bad'name", "x: y"] {
            let config = parsed(name);
            assert_eq!(
                config["exporters"]["awsemf"]["log_group_name"].as_str(),
                Some(log_group_name(name).as_str())
            );
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(render("demo").unwrap(), render("demo").unwrap());
    }

    #[test]
    fn test_config_path() {
        assert_eq!(config_path(), "/conf/otel-agent-config.yaml");
    }
}
