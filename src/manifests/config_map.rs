use super::{object_meta, CONFIG_MAP, NAMESPACE};
use crate::collector;
use crate::Result;
use k8s_openapi::api::core::v1::ConfigMap;
use std::collections::BTreeMap;

/// ConfigMap holding the whole collector pipeline under a single key.
pub fn collector_config_map(cluster_name: &str) -> Result<ConfigMap> {
    let pipeline = collector::render(cluster_name)?;

    Ok(ConfigMap {
        metadata: object_meta(
            CONFIG_MAP,
            Some(NAMESPACE),
            &[("app", "opentelemetry"), ("component", CONFIG_MAP)],
        ),
        data: Some(BTreeMap::from([(
            collector::CONFIG_KEY.to_string(),
            pipeline,
        )])),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_key() {
        let cm = collector_config_map("demo").unwrap();
        let data = cm.data.unwrap();

        assert_eq!(data.len(), 1);
        assert!(data[collector::CONFIG_KEY].contains("/aws/containerinsights/demo/performance"));
    }
}
