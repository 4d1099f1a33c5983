//! Service account the collector pods run as.
//!
//! The role annotation is what binds the account to IAM: EKS's pod identity
//! webhook projects a web identity token and the SDK inside the collector
//! exchanges it for the role's credentials.

use super::{object_meta, NAMESPACE, ROLE_ARN_ANNOTATION, SERVICE_ACCOUNT};
use k8s_openapi::api::core::v1::ServiceAccount;
use std::collections::BTreeMap;

pub fn collector_service_account(role_arn: &str) -> ServiceAccount {
    let mut metadata = object_meta(
        SERVICE_ACCOUNT,
        Some(NAMESPACE),
        &[("app.kubernetes.io/name", SERVICE_ACCOUNT)],
    );
    metadata.annotations = Some(BTreeMap::from([(
        ROLE_ARN_ANNOTATION.to_string(),
        role_arn.to_string(),
    )]));

    ServiceAccount {
        metadata,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_annotation() {
        let sa = collector_service_account("arn:aws:iam::131332286832:role/collector");
        let annotations = sa.metadata.annotations.unwrap();

        assert_eq!(
            annotations.get(ROLE_ARN_ANNOTATION).map(String::as_str),
            Some("arn:aws:iam::131332286832:role/collector")
        );
        assert_eq!(sa.metadata.namespace.as_deref(), Some(NAMESPACE));
    }
}
