use crate::descriptor::Descriptor;
use crate::manifests::Manifest;
use crate::Result;
use async_trait::async_trait;
use tracing::info;

/// Declarative sink for manifests. Implementations must treat `apply` as
/// create-or-update and `delete` of an absent object as success.
#[async_trait]
pub trait Applier: Send + Sync {
    async fn apply(&self, manifest: &Manifest) -> Result<()>;

    async fn delete(&self, manifest: &Manifest) -> Result<()>;

    /// Block until dependents of `manifest` can be applied.
    async fn wait_ready(&self, _manifest: &Manifest) -> Result<()> {
        Ok(())
    }
}

/// Apply every manifest in dependency order, stopping at the first failure.
pub async fn deploy(descriptor: &Descriptor, applier: &dyn Applier) -> Result<usize> {
    let ordered = descriptor.ordered()?;

    for manifest in &ordered {
        info!("Applying {}", manifest.id());
        applier.apply(manifest).await?;
        applier.wait_ready(manifest).await?;
    }

    info!(
        "Deployed {} manifests to cluster {}",
        ordered.len(),
        descriptor.handle.name
    );

    Ok(ordered.len())
}

/// Delete every manifest, dependents first.
pub async fn teardown(descriptor: &Descriptor, applier: &dyn Applier) -> Result<usize> {
    let ordered = descriptor.ordered()?;

    for manifest in ordered.iter().rev() {
        info!("Deleting {}", manifest.id());
        applier.delete(manifest).await?;
    }

    info!(
        "Removed {} manifests from cluster {}",
        ordered.len(),
        descriptor.handle.name
    );

    Ok(ordered.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::AdotError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingApplier {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingApplier {
        fn record(&self, verb: &str, manifest: &Manifest) -> Result<()> {
            if self.fail_on == Some(manifest.kind()) {
                return Err(AdotError::KubernetesError(format!(
                    "{} rejected",
                    manifest.kind()
                )));
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", verb, manifest.kind()));
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Applier for RecordingApplier {
        async fn apply(&self, manifest: &Manifest) -> Result<()> {
            self.record("apply", manifest)
        }

        async fn delete(&self, manifest: &Manifest) -> Result<()> {
            self.record("delete", manifest)
        }

        async fn wait_ready(&self, manifest: &Manifest) -> Result<()> {
            self.record("wait", manifest)
        }
    }

    fn descriptor() -> Descriptor {
        Descriptor::for_config(&StackConfig::default(), None).unwrap()
    }

    #[tokio::test]
    async fn test_deploy_order() {
        let applier = RecordingApplier::default();
        let applied = deploy(&descriptor(), &applier).await.unwrap();

        let applies: Vec<String> = applier
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("apply"))
            .collect();
        assert_eq!(applied, 6);
        assert_eq!(
            applies,
            vec![
                "apply Namespace",
                "apply ServiceAccount",
                "apply ConfigMap",
                "apply ClusterRole",
                "apply ClusterRoleBinding",
                "apply DaemonSet",
            ]
        );
    }

    #[tokio::test]
    async fn test_deploy_waits_after_each_apply() {
        let applier = RecordingApplier::default();
        deploy(&descriptor(), &applier).await.unwrap();

        let calls = applier.calls();
        assert_eq!(calls[0], "apply Namespace");
        assert_eq!(calls[1], "wait Namespace");
    }

    #[tokio::test]
    async fn test_deploy_stops_at_first_failure() {
        let applier = RecordingApplier {
            fail_on: Some("ConfigMap"),
            ..Default::default()
        };
        let err = deploy(&descriptor(), &applier).await.unwrap_err();

        assert!(matches!(err, AdotError::KubernetesError(_)));
        assert!(!applier.calls().iter().any(|c| c.ends_with("DaemonSet")));
    }

    #[tokio::test]
    async fn test_teardown_reverses_order() {
        let applier = RecordingApplier::default();
        teardown(&descriptor(), &applier).await.unwrap();

        let calls = applier.calls();
        assert_eq!(calls.first().map(String::as_str), Some("delete DaemonSet"));
        assert_eq!(calls.last().map(String::as_str), Some("delete Namespace"));
    }
}
