//! Deployment descriptor: the manifests for one cluster plus the ordering
//! edges the apply step has to honour.

use crate::cluster::{ClusterConfig, ClusterHandle, ClusterRef};
use crate::config::StackConfig;
use crate::iam::{PolicyDocument, ServiceAccountRole};
use crate::manifests::{self, DaemonSetParams, Manifest, ManifestId};
use crate::{AdotError, Result};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub manifest: Manifest,
    pub depends_on: Vec<ManifestId>,
}

#[derive(Debug, Default)]
pub struct DescriptorBuilder {
    entries: Vec<Entry>,
}

impl DescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a manifest and the manifests it must be applied after. Returns the
    /// id to depend on.
    pub fn add(&mut self, manifest: Manifest, depends_on: &[&ManifestId]) -> ManifestId {
        let id = manifest.id();
        self.entries.push(Entry {
            manifest,
            depends_on: depends_on.iter().map(|d| (*d).clone()).collect(),
        });
        id
    }

    pub fn build(
        self,
        cluster: ClusterRef,
        handle: ClusterHandle,
        role: ServiceAccountRole,
    ) -> Result<Descriptor> {
        let descriptor = Descriptor {
            cluster,
            handle,
            role,
            entries: self.entries,
        };
        // Surface unknown edges and cycles at build time.
        descriptor.ordered()?;
        Ok(descriptor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub cluster: ClusterRef,
    pub handle: ClusterHandle,
    pub role: ServiceAccountRole,
    entries: Vec<Entry>,
}

impl Descriptor {
    /// Build the collector deployment for `config`.
    ///
    /// `issuer_url` supplies the OIDC issuer of a cluster created outside
    /// this tool; imported clusters carry their provider in the config.
    pub fn for_config(config: &StackConfig, issuer_url: Option<&str>) -> Result<Self> {
        config.validate()?;

        let cluster = config.cluster_ref();
        let handle = cluster.resolve(&config.account, &config.region, issuer_url)?;
        let role_arn = config.role_arn();

        let trust = handle.oidc_provider.as_ref().map(|provider| {
            PolicyDocument::service_account_trust(
                provider,
                manifests::NAMESPACE,
                manifests::SERVICE_ACCOUNT,
            )
        });
        let role = ServiceAccountRole {
            role_arn: role_arn.clone(),
            permissions: PolicyDocument::permissions(&config.permissions),
            trust,
        };

        let mut builder = DescriptorBuilder::new();

        let namespace = builder.add(Manifest::Namespace(manifests::collector_namespace()), &[]);
        let service_account = builder.add(
            Manifest::ServiceAccount(manifests::collector_service_account(&role_arn)),
            &[&namespace],
        );
        let config_map = builder.add(
            Manifest::ConfigMap(manifests::collector_config_map(&config.cluster_name)?),
            &[&namespace],
        );
        let cluster_role = builder.add(
            Manifest::ClusterRole(manifests::collector_cluster_role()),
            &[],
        );
        let binding = builder.add(
            Manifest::ClusterRoleBinding(manifests::collector_cluster_role_binding()),
            &[&cluster_role, &service_account],
        );
        builder.add(
            Manifest::DaemonSet(manifests::collector_daemonset(&DaemonSetParams {
                image: &config.image,
            })),
            &[&service_account, &config_map, &binding],
        );

        debug!(cluster = %handle.name, "Built collector descriptor");

        builder.build(cluster, handle, role)
    }

    /// Provisioning document for a cluster this descriptor plans to create.
    pub fn cluster_config(&self, region: &str) -> Option<ClusterConfig> {
        self.cluster.provisioning_document(region)
    }

    /// Manifests in apply order: every manifest after all of its
    /// dependencies, otherwise in insertion order.
    pub fn ordered(&self) -> Result<Vec<&Manifest>> {
        let mut index: HashMap<ManifestId, usize> = HashMap::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let id = entry.manifest.id();
            if index.insert(id.clone(), i).is_some() {
                return Err(AdotError::DuplicateManifest(id.to_string()));
            }
        }

        for entry in &self.entries {
            for dependency in &entry.depends_on {
                if !index.contains_key(dependency) {
                    return Err(AdotError::UnknownDependency {
                        id: entry.manifest.id().to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }

        let mut done: HashSet<usize> = HashSet::new();
        let mut order = Vec::with_capacity(self.entries.len());

        // Repeatedly take the first entry whose dependencies are all placed.
        while order.len() < self.entries.len() {
            let next = self.entries.iter().enumerate().find(|(i, entry)| {
                !done.contains(i)
                    && entry
                        .depends_on
                        .iter()
                        .all(|d| done.contains(&index[d]))
            });

            match next {
                Some((i, entry)) => {
                    done.insert(i);
                    order.push(&entry.manifest);
                }
                None => {
                    let stuck: Vec<String> = self
                        .entries
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !done.contains(i))
                        .map(|(_, e)| e.manifest.id().to_string())
                        .collect();
                    return Err(AdotError::DependencyCycle(stuck.join(", ")));
                }
            }
        }

        Ok(order)
    }

    /// Ordered manifests as one multi-document YAML stream.
    pub fn render_yaml(&self) -> Result<String> {
        let mut out = String::new();
        for (i, manifest) in self.ordered()?.into_iter().enumerate() {
            if i > 0 {
                out.push_str("---\n");
            }
            out.push_str(&manifest.to_yaml()?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::COLLECTOR_ACTIONS;
    use k8s_openapi::api::core::v1::{ConfigMap, Namespace};

    fn descriptor() -> Descriptor {
        Descriptor::for_config(&StackConfig::default(), None).unwrap()
    }

    fn position(order: &[&Manifest], kind: &str) -> usize {
        order.iter().position(|m| m.kind() == kind).unwrap()
    }

    #[test]
    fn test_namespace_precedes_namespaced_objects() {
        let d = descriptor();
        let order = d.ordered().unwrap();

        let ns = position(&order, "Namespace");
        assert!(ns < position(&order, "ServiceAccount"));
        assert!(ns < position(&order, "ConfigMap"));
        assert!(position(&order, "ServiceAccount") < position(&order, "DaemonSet"));
        assert!(position(&order, "ConfigMap") < position(&order, "DaemonSet"));
        assert_eq!(order.last().unwrap().kind(), "DaemonSet");
    }

    #[test]
    fn test_render_is_deterministic() {
        let a = descriptor().render_yaml().unwrap();
        let b = descriptor().render_yaml().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.matches("\n---\n").count(), 5);
    }

    #[test]
    fn test_role_permissions() {
        let d = descriptor();
        assert_eq!(
            d.role.permissions.statement[0].action.names(),
            COLLECTOR_ACTIONS.to_vec()
        );
        assert!(d.role.trust.is_none());
    }

    #[test]
    fn test_ordering_follows_edges_not_insertion() {
        let mut builder = DescriptorBuilder::new();
        let ns_id = ManifestId::of::<Namespace>(manifests::NAMESPACE, None);
        builder.add(
            Manifest::ConfigMap(manifests::collector_config_map("demo").unwrap()),
            &[&ns_id],
        );
        builder.add(Manifest::Namespace(manifests::collector_namespace()), &[]);

        let d = builder
            .build(
                StackConfig::default().cluster_ref(),
                descriptor().handle,
                descriptor().role,
            )
            .unwrap();
        let kinds: Vec<&str> = d.ordered().unwrap().iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, vec!["Namespace", "ConfigMap"]);
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let mut builder = DescriptorBuilder::new();
        let missing = ManifestId::of::<ConfigMap>("missing", Some("nowhere"));
        builder.add(Manifest::Namespace(manifests::collector_namespace()), &[&missing]);

        let err = builder
            .build(
                StackConfig::default().cluster_ref(),
                descriptor().handle,
                descriptor().role,
            )
            .unwrap_err();
        assert!(matches!(err, AdotError::UnknownDependency { .. }));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut builder = DescriptorBuilder::new();
        let ns_id = ManifestId::of::<Namespace>(manifests::NAMESPACE, None);
        let cm_id = builder.add(
            Manifest::ConfigMap(manifests::collector_config_map("demo").unwrap()),
            &[&ns_id],
        );
        builder.add(Manifest::Namespace(manifests::collector_namespace()), &[&cm_id]);

        let err = builder
            .build(
                StackConfig::default().cluster_ref(),
                descriptor().handle,
                descriptor().role,
            )
            .unwrap_err();
        assert!(matches!(err, AdotError::DependencyCycle(_)));
    }
}
