//! Helm Provider
//!
//! Provider configuration (cluster credentials) and chart releases.

use super::{Provider, ResourceConfig};
use crate::synth::{Attrs, Expr, Handle, Reference, Result, TerraformStack};

/// Cluster connection settings of the Helm provider
#[derive(Debug, Clone, PartialEq)]
pub struct HelmKubernetes {
    pub host: Expr,
    /// PEM, not base64
    pub client_certificate: Expr,
    /// PEM, not base64
    pub client_key: Expr,
    /// PEM, not base64
    pub cluster_ca_certificate: Expr,
    pub username: Expr,
    pub password: Expr,
}

/// `provider "helm"`
#[derive(Debug, Clone)]
pub struct HelmProvider {
    pub kubernetes: HelmKubernetes,
}

impl Provider for HelmProvider {
    const NAME: &'static str = "helm";
    const SOURCE: &'static str = "hashicorp/helm";
    const VERSION: &'static str = "~> 2.4";

    fn to_expr(&self) -> Expr {
        let k8s = &self.kubernetes;
        Attrs::new()
            .set(
                "kubernetes",
                Attrs::new()
                    .set("host", k8s.host.clone())
                    .set("client_certificate", k8s.client_certificate.clone())
                    .set("client_key", k8s.client_key.clone())
                    .set("cluster_ca_certificate", k8s.cluster_ca_certificate.clone())
                    .set("username", k8s.username.clone())
                    .set("password", k8s.password.clone()),
            )
            .build()
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub name: String,
    pub namespace: Option<String>,
    /// Chart repository URL
    pub repository: Option<String>,
    pub chart: String,
    pub version: Option<String>,
    pub create_namespace: bool,
    /// Values documents, later entries override earlier ones
    pub values: Vec<Expr>,
}

impl ResourceConfig for ReleaseConfig {
    const TYPE: &'static str = "helm_release";

    fn to_expr(&self) -> Expr {
        Attrs::new()
            .set("name", self.name.clone())
            .set_opt("namespace", self.namespace.clone())
            .set_opt("repository", self.repository.clone())
            .set("chart", self.chart.clone())
            .set_opt("version", self.version.clone())
            .set("create_namespace", self.create_namespace)
            .set_opt(
                "values",
                (!self.values.is_empty()).then(|| Expr::List(self.values.clone())),
            )
            .build()
    }
}

/// A declared `helm_release`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    handle: Handle,
}

impl Release {
    pub fn declare(stack: &mut TerraformStack, id: &str, config: &ReleaseConfig) -> Result<Self> {
        stack.add_resource(id, config).map(|handle| Self { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}
