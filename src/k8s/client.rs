use crate::k8s::Applier;
use crate::manifests::Manifest;
use crate::{AdotError, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::runtime::wait::await_condition;
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info};

pub struct K8sClient {
    client: Client,
    field_manager: String,
    wait_timeout: Duration,
}

impl K8sClient {
    /// Client for one named kubeconfig context, never the ambient current one.
    pub async fn for_context(
        context: &str,
        field_manager: &str,
        wait_timeout: Duration,
    ) -> Result<Self> {
        debug!("Initializing Kubernetes client for context {}", context);

        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };
        let config = Config::from_kubeconfig(&options).await.map_err(|e| {
            AdotError::KubernetesError(format!(
                "Failed to load kubeconfig context {}: {}",
                context, e
            ))
        })?;
        let client = Client::try_from(config).map_err(|e| {
            AdotError::KubernetesError(format!("Failed to create K8s client: {}", e))
        })?;

        Ok(Self {
            client,
            field_manager: field_manager.to_string(),
            wait_timeout,
        })
    }

    /// Reachability check: the API server's `gitVersion`.
    pub async fn server_version(&self) -> Result<String> {
        let info = self.client.apiserver_version().await.map_err(|e| {
            AdotError::KubernetesError(format!("Cluster is not reachable: {}", e))
        })?;

        info!("Connected to Kubernetes {}", info.git_version);

        Ok(info.git_version)
    }

    fn cluster_api<K>(&self) -> Api<K>
    where
        K: kube::Resource,
        K::DynamicType: Default,
    {
        Api::all(self.client.clone())
    }

    fn namespaced_api<K>(&self, manifest: &Manifest) -> Api<K>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), manifest.namespace().unwrap_or("default"))
    }

    async fn apply_object<K>(&self, api: Api<K>, manifest: &Manifest, object: &K) -> Result<()>
    where
        K: Clone + Debug + Serialize + DeserializeOwned,
    {
        let params = PatchParams::apply(&self.field_manager).force();

        api.patch(manifest.name(), &params, &Patch::Apply(object))
            .await
            .map_err(|e| {
                AdotError::KubernetesError(format!("Failed to apply {}: {}", manifest.id(), e))
            })?;

        Ok(())
    }

    async fn delete_object<K>(&self, api: Api<K>, manifest: &Manifest) -> Result<()>
    where
        K: Clone + Debug + DeserializeOwned,
    {
        match api.delete(manifest.name(), &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!("{} already gone", manifest.id());
                Ok(())
            }
            Err(e) => Err(AdotError::KubernetesError(format!(
                "Failed to delete {}: {}",
                manifest.id(),
                e
            ))),
        }
    }
}

#[async_trait]
impl Applier for K8sClient {
    async fn apply(&self, manifest: &Manifest) -> Result<()> {
        match manifest {
            Manifest::Namespace(o) => self.apply_object(self.cluster_api(), manifest, o).await,
            Manifest::ClusterRole(o) => self.apply_object(self.cluster_api(), manifest, o).await,
            Manifest::ClusterRoleBinding(o) => {
                self.apply_object(self.cluster_api(), manifest, o).await
            }
            Manifest::ServiceAccount(o) => {
                self.apply_object(self.namespaced_api(manifest), manifest, o)
                    .await
            }
            Manifest::ConfigMap(o) => {
                self.apply_object(self.namespaced_api(manifest), manifest, o)
                    .await
            }
            Manifest::DaemonSet(o) => {
                self.apply_object(self.namespaced_api(manifest), manifest, o)
                    .await
            }
        }
    }

    async fn delete(&self, manifest: &Manifest) -> Result<()> {
        match manifest {
            Manifest::Namespace(_) => {
                self.delete_object(self.cluster_api::<Namespace>(), manifest)
                    .await
            }
            Manifest::ClusterRole(_) => {
                self.delete_object(self.cluster_api::<ClusterRole>(), manifest)
                    .await
            }
            Manifest::ClusterRoleBinding(_) => {
                self.delete_object(self.cluster_api::<ClusterRoleBinding>(), manifest)
                    .await
            }
            Manifest::ServiceAccount(_) => {
                self.delete_object(self.namespaced_api::<ServiceAccount>(manifest), manifest)
                    .await
            }
            Manifest::ConfigMap(_) => {
                self.delete_object(self.namespaced_api::<ConfigMap>(manifest), manifest)
                    .await
            }
            Manifest::DaemonSet(_) => {
                self.delete_object(self.namespaced_api::<DaemonSet>(manifest), manifest)
                    .await
            }
        }
    }

    /// Namespaced objects are rejected while their namespace is still
    /// being created, so wait for it to turn `Active`.
    async fn wait_ready(&self, manifest: &Manifest) -> Result<()> {
        let Manifest::Namespace(_) = manifest else {
            return Ok(());
        };

        let is_active = |ns: Option<&Namespace>| {
            ns.and_then(|ns| ns.status.as_ref())
                .and_then(|status| status.phase.as_deref())
                == Some("Active")
        };

        debug!("Waiting for {} to become active", manifest.id());

        let wait = await_condition(self.cluster_api::<Namespace>(), manifest.name(), is_active);
        match tokio::time::timeout(self.wait_timeout, wait).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AdotError::KubernetesError(format!(
                "Failed waiting for {}: {}",
                manifest.id(),
                e
            ))),
            Err(_) => Err(AdotError::WaitTimeout {
                id: manifest.id().to_string(),
                secs: self.wait_timeout.as_secs(),
            }),
        }
    }
}
