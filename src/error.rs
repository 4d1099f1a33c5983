use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdotError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid ARN {arn}: {reason}")]
    InvalidArn { arn: String, reason: String },

    #[error("OIDC provider not known for cluster {0}. Pass the cluster's issuer URL")]
    OidcProviderUnknown(String),

    #[error("Manifest {id} depends on unknown manifest {dependency}")]
    UnknownDependency { id: String, dependency: String },

    #[error("Dependency cycle between manifests: {0}")]
    DependencyCycle(String),

    #[error("Duplicate manifest: {0}")]
    DuplicateManifest(String),

    #[error("Kubernetes error: {0}")]
    KubernetesError(String),

    #[error("Timed out after {secs}s waiting for {id} to become ready")]
    WaitTimeout { id: String, secs: u64 },

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AdotError>;
