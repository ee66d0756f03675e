//! Cluster Stack
//!
//! A resource group plus an AKS cluster with fixed policy defaults:
//! system-assigned identity, RBAC, Azure CNI with Azure network policy,
//! standard load balancer, Azure Policy add-on and an autoscaling
//! default node pool.

use tracing::info;

use crate::providers::azurerm::{
    AddonProfile, AzurermProvider, ClusterIdentity, DefaultNodePool, IdentityType,
    KubernetesCluster, KubernetesClusterConfig, NetworkProfile, ResourceGroup,
    ResourceGroupConfig, RoleBasedAccessControl,
};
use crate::synth::{Result, TerraformStack};

/// VM size of the default node pool
pub const NODE_VM_SIZE: &str = "Standard_D4_v2";
pub const NODE_POOL_NAME: &str = "default";
pub const MAX_PODS_PER_NODE: u32 = 30;
pub const MIN_NODES: u32 = 1;
pub const MAX_NODES: u32 = 3;

/// Sensitive output carrying the raw kubeconfig
pub const KUBE_CONFIG_OUTPUT: &str = "kube_config";

#[derive(Debug, Clone)]
pub struct ClusterProps {
    /// Azure region, e.g. `eastus`
    pub region: String,
}

/// The cluster unit
#[derive(Debug, Clone)]
pub struct Cluster {
    stack: TerraformStack,
    resource_group: ResourceGroup,
    aks: KubernetesCluster,
}

impl Cluster {
    pub fn new(name: &str, props: ClusterProps) -> Result<Self> {
        let mut stack = TerraformStack::new(name);
        stack.add_provider(&AzurermProvider);

        let rg_name = format!("rg-{}", name);
        let resource_group = ResourceGroup::declare(
            &mut stack,
            &rg_name,
            &ResourceGroupConfig {
                name: rg_name.clone().into(),
                location: props.region.clone().into(),
            },
        )?;

        let aks = KubernetesCluster::declare(
            &mut stack,
            &format!("aks-{}", name),
            &KubernetesClusterConfig {
                name: name.into(),
                location: props.region.clone().into(),
                resource_group_name: resource_group.name().into(),
                dns_prefix: name.into(),
                identity: ClusterIdentity {
                    identity_type: IdentityType::SystemAssigned,
                },
                role_based_access_control: RoleBasedAccessControl { enabled: true },
                network_profile: NetworkProfile {
                    network_plugin: "azure".to_string(),
                    network_policy: Some("azure".to_string()),
                    load_balancer_sku: Some("standard".to_string()),
                },
                default_node_pool: DefaultNodePool {
                    name: NODE_POOL_NAME.to_string(),
                    vm_size: NODE_VM_SIZE.to_string(),
                    max_pods: Some(MAX_PODS_PER_NODE),
                    enable_auto_scaling: true,
                    min_count: Some(MIN_NODES),
                    max_count: Some(MAX_NODES),
                    node_count: None,
                },
                addon_profile: AddonProfile {
                    azure_policy: Some(true),
                },
                depends_on: vec![resource_group.handle().clone()],
            },
        )?;

        stack.add_output(KUBE_CONFIG_OUTPUT, aks.kube_admin_config_raw(), true)?;

        info!(stack = %name, region = %props.region, "Cluster stack declared");

        Ok(Self {
            stack,
            resource_group,
            aks,
        })
    }

    pub fn name(&self) -> &str {
        self.stack.name()
    }

    pub fn resource_group(&self) -> &ResourceGroup {
        &self.resource_group
    }

    pub fn aks(&self) -> &KubernetesCluster {
        &self.aks
    }
}

impl From<Cluster> for TerraformStack {
    fn from(cluster: Cluster) -> Self {
        cluster.stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::App;
    use serde_json::{json, Value};

    fn synthesized(name: &str, region: &str) -> Value {
        let cluster = Cluster::new(
            name,
            ClusterProps {
                region: region.to_string(),
            },
        )
        .unwrap();
        let mut app = App::new("cdktf.out");
        app.add_stack(cluster).unwrap();
        app.resolve_stack(name).unwrap().document
    }

    #[test]
    fn test_declares_one_resource_group_and_one_cluster() {
        let doc = synthesized("cluster", "eastus");
        let resources = doc["resource"].as_object().unwrap();

        assert_eq!(resources.len(), 2);
        assert_eq!(resources["azurerm_resource_group"].as_object().unwrap().len(), 1);
        assert_eq!(resources["azurerm_kubernetes_cluster"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_example_scenario() {
        let doc = synthesized("cluster", "eastus");

        let rg = &doc["resource"]["azurerm_resource_group"]["rg-cluster"];
        assert_eq!(rg["name"], "rg-cluster");
        assert_eq!(rg["location"], "eastus");

        let aks = &doc["resource"]["azurerm_kubernetes_cluster"]["aks-cluster"];
        assert_eq!(aks["name"], "cluster");
        assert_eq!(aks["dns_prefix"], "cluster");
        assert_eq!(aks["location"], "eastus");
        assert_eq!(aks["depends_on"], json!(["azurerm_resource_group.rg-cluster"]));
        assert_eq!(
            aks["resource_group_name"],
            "${azurerm_resource_group.rg-cluster.name}"
        );
    }

    #[test]
    fn test_policy_defaults() {
        let doc = synthesized("prod", "westeurope");
        let aks = &doc["resource"]["azurerm_kubernetes_cluster"]["aks-prod"];

        assert_eq!(aks["identity"], json!({ "type": "SystemAssigned" }));
        assert_eq!(aks["role_based_access_control"], json!({ "enabled": true }));
        assert_eq!(
            aks["network_profile"],
            json!({
                "network_plugin": "azure",
                "network_policy": "azure",
                "load_balancer_sku": "standard"
            })
        );
        assert_eq!(aks["addon_profile"], json!({ "azure_policy": { "enabled": true } }));
    }

    #[test]
    fn test_node_pool_autoscaling_bounds() {
        for (name, region) in [("cluster", "eastus"), ("dev", "northeurope")] {
            let doc = synthesized(name, region);
            let pool = &doc["resource"]["azurerm_kubernetes_cluster"][format!("aks-{}", name).as_str()]
                ["default_node_pool"];

            assert_eq!(pool["enable_auto_scaling"], true);
            assert_eq!(pool["min_count"], 1);
            assert_eq!(pool["max_count"], 3);
            assert_eq!(pool["max_pods"], 30);
            assert_eq!(pool["vm_size"], "Standard_D4_v2");
            assert_eq!(pool["name"], "default");
        }
    }

    #[test]
    fn test_kube_config_output_is_sensitive() {
        let doc = synthesized("cluster", "eastus");
        let output = &doc["output"][KUBE_CONFIG_OUTPUT];

        assert_eq!(
            output["value"],
            "${azurerm_kubernetes_cluster.aks-cluster.kube_admin_config_raw}"
        );
        assert_eq!(output["sensitive"], true);
    }

    #[test]
    fn test_region_is_not_validated_locally() {
        let doc = synthesized("cluster", "not-a-region");
        assert_eq!(
            doc["resource"]["azurerm_resource_group"]["rg-cluster"]["location"],
            "not-a-region"
        );
    }
}
