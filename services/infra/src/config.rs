//! Deployment Settings
//!
//! Names and region of the deployment. The CLI fills these from flags or
//! environment variables; the defaults reproduce the stock deployment.

pub const DEFAULT_CLUSTER_NAME: &str = "cluster";
pub const DEFAULT_REGION: &str = "eastus";
pub const DEFAULT_CHARTS_NAME: &str = "charts";
pub const DEFAULT_OUTDIR: &str = "cdktf.out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraSettings {
    /// Name of the cluster stack, the AKS cluster and its DNS prefix
    pub cluster_name: String,
    /// Azure region of the resource group and cluster
    pub region: String,
    /// Name of the charts stack
    pub charts_name: String,
}

impl Default for InfraSettings {
    fn default() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            region: DEFAULT_REGION.to_string(),
            charts_name: DEFAULT_CHARTS_NAME.to_string(),
        }
    }
}
