use super::{object_meta, NAMESPACE};
use k8s_openapi::api::core::v1::Namespace;

pub fn collector_namespace() -> Namespace {
    Namespace {
        metadata: object_meta(NAMESPACE, None, &[("name", NAMESPACE)]),
        ..Default::default()
    }
}
