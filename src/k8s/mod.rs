pub mod applier;
pub mod client;

pub use applier::{deploy, teardown, Applier};
pub use client::K8sClient;
