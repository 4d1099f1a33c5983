pub mod cli;
pub mod cluster;
pub mod collector;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod iam;
pub mod k8s;
pub mod manifests;

pub use error::{AdotError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
