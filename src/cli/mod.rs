pub mod commands;

use crate::config::ConfigOverrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "adot-eks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploy the ADOT collector to EKS for Container Insights", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        env = "ADOT_EKS_CONFIG",
        help = "Stack configuration file (YAML)"
    )]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    #[arg(long, global = true, env = "ADOT_EKS_CLUSTER_NAME", help = "EKS cluster name")]
    pub cluster_name: Option<String>,

    #[arg(long, global = true, env = "ADOT_EKS_ACCOUNT", help = "AWS account ID")]
    pub account: Option<String>,

    #[arg(long, global = true, env = "AWS_REGION", help = "AWS region")]
    pub region: Option<String>,

    #[arg(
        long,
        global = true,
        env = "ADOT_EKS_OIDC_PROVIDER_ARN",
        help = "OIDC provider ARN of an existing cluster to attach to"
    )]
    pub oidc_provider_arn: Option<String>,

    #[arg(
        long,
        global = true,
        env = "ADOT_EKS_ROLE_ARN",
        help = "IAM role ARN for the collector service account"
    )]
    pub role_arn: Option<String>,

    #[arg(long, global = true, env = "ADOT_EKS_IMAGE", help = "Collector container image")]
    pub image: Option<String>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            cluster_name: args.cluster_name,
            account: args.account,
            region: args.region,
            oidc_provider_arn: args.oidc_provider_arn,
            role_arn: args.role_arn,
            image: args.image,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Render the manifests as multi-document YAML")]
    Render {
        #[arg(short, long, help = "Output file path")]
        output: Option<PathBuf>,

        #[arg(long, help = "Prepend the eksctl ClusterConfig for a new cluster")]
        with_cluster: bool,
    },
    #[command(about = "Print the IAM policy for the collector role")]
    Policy {
        #[arg(long, help = "Print the trust policy instead of the permission policy")]
        trust: bool,

        #[arg(long, help = "OIDC issuer URL of a newly created cluster")]
        oidc_issuer: Option<String>,
    },
    #[command(about = "Apply the manifests to the configured cluster")]
    Apply {
        #[arg(
            long,
            env = "ADOT_EKS_CONTEXT",
            help = "Kubeconfig context to use (default: the cluster ARN)"
        )]
        context: Option<String>,
    },
    #[command(about = "Delete the manifests from the configured cluster")]
    Delete {
        #[arg(
            long,
            env = "ADOT_EKS_CONTEXT",
            help = "Kubeconfig context to use (default: the cluster ARN)"
        )]
        context: Option<String>,
    },
}
