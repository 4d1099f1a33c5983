use crate::cli::Commands;
use crate::config::{ConfigOverrides, StackConfig};
use crate::descriptor::Descriptor;
use crate::k8s::{self, K8sClient};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub async fn handle_command(
    command: Commands,
    config_path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<()> {
    let config = StackConfig::load(config_path, overrides).context("Failed to load configuration")?;

    match command {
        Commands::Render {
            output,
            with_cluster,
        } => handle_render(&config, output, with_cluster),
        Commands::Policy { trust, oidc_issuer } => handle_policy(&config, trust, oidc_issuer),
        Commands::Apply { context } => handle_apply(&config, context.as_deref()).await,
        Commands::Delete { context } => handle_delete(&config, context.as_deref()).await,
    }
}

/// Manifests (and, for a new cluster, its eksctl document) as YAML.
pub fn render_stack(config: &StackConfig, with_cluster: bool) -> Result<String> {
    let descriptor = Descriptor::for_config(config, None)?;
    let mut out = String::new();

    if with_cluster {
        if let Some(cluster) = descriptor.cluster_config(&config.region) {
            out.push_str(&serde_yaml::to_string(&cluster)?);
            out.push_str("---\n");
        }
    }

    out.push_str(&descriptor.render_yaml()?);
    Ok(out)
}

fn handle_render(config: &StackConfig, output: Option<PathBuf>, with_cluster: bool) -> Result<()> {
    let yaml = render_stack(config, with_cluster)?;

    match output {
        Some(path) => {
            std::fs::write(&path, yaml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote manifests to {}", path.display());
        }
        None => print!("{}", yaml),
    }

    Ok(())
}

fn handle_policy(config: &StackConfig, trust: bool, oidc_issuer: Option<String>) -> Result<()> {
    let descriptor = Descriptor::for_config(config, oidc_issuer.as_deref())?;

    let document = if trust {
        descriptor.handle.require_oidc_provider()?;
        descriptor
            .role
            .trust
            .as_ref()
            .context("Trust policy not available")?
    } else {
        &descriptor.role.permissions
    };

    info!("Policy for role {}", descriptor.role.role_arn);
    println!("{}", document.to_json_pretty()?);

    Ok(())
}

/// Kubeconfig context to talk to. `aws eks update-kubeconfig` names the
/// context after the cluster ARN, so that is the default.
pub fn target_context(descriptor: &Descriptor, context: Option<&str>) -> String {
    context
        .map(str::to_string)
        .unwrap_or_else(|| descriptor.handle.kube_context().to_string())
}

async fn connect(
    config: &StackConfig,
    descriptor: &Descriptor,
    context: Option<&str>,
) -> Result<K8sClient> {
    let context = target_context(descriptor, context);
    info!("Using kubeconfig context {}", context);

    let client = K8sClient::for_context(
        &context,
        &config.field_manager,
        Duration::from_secs(config.wait_timeout_secs),
    )
    .await?;

    client
        .server_version()
        .await
        .with_context(|| format!("Cluster {} must exist before applying", config.cluster_name))?;

    Ok(client)
}

async fn handle_apply(config: &StackConfig, context: Option<&str>) -> Result<()> {
    let descriptor = Descriptor::for_config(config, None)?;
    let client = connect(config, &descriptor, context).await?;

    let applied = k8s::deploy(&descriptor, &client).await?;
    println!(
        "Applied {} manifests. Collector role: {}",
        applied, descriptor.role.role_arn
    );

    Ok(())
}

async fn handle_delete(config: &StackConfig, context: Option<&str>) -> Result<()> {
    let descriptor = Descriptor::for_config(config, None)?;
    let client = connect(config, &descriptor, context).await?;

    let removed = k8s::teardown(&descriptor, &client).await?;
    println!("Deleted {} manifests", removed);

    Ok(())
}
