//! Azure Resource Manager Provider
//!
//! Resource group, AKS cluster and the client config data source.
//! Argument names follow the azurerm 2.x schema (`role_based_access_control`
//! and `addon_profile` blocks).

use super::{DataSourceConfig, Provider, ResourceConfig};
use crate::synth::{Attrs, Expr, Handle, Reference, Result, TerraformStack};

/// `provider "azurerm"`
#[derive(Debug, Clone, Default)]
pub struct AzurermProvider;

impl Provider for AzurermProvider {
    const NAME: &'static str = "azurerm";
    const SOURCE: &'static str = "hashicorp/azurerm";
    const VERSION: &'static str = "~> 2.86";

    fn to_expr(&self) -> Expr {
        // The provider refuses to start without a features block, even an empty one
        Attrs::new().set("features", Expr::empty_object()).build()
    }
}

// ============================================================
// Resource Group
// ============================================================

#[derive(Debug, Clone)]
pub struct ResourceGroupConfig {
    pub name: Expr,
    pub location: Expr,
}

impl ResourceConfig for ResourceGroupConfig {
    const TYPE: &'static str = "azurerm_resource_group";

    fn to_expr(&self) -> Expr {
        Attrs::new()
            .set("name", self.name.clone())
            .set("location", self.location.clone())
            .build()
    }
}

/// A declared `azurerm_resource_group`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroup {
    handle: Handle,
}

impl ResourceGroup {
    pub fn declare(stack: &mut TerraformStack, id: &str, config: &ResourceGroupConfig) -> Result<Self> {
        stack.add_resource(id, config).map(|handle| Self { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn name(&self) -> Reference {
        self.handle.attr("name")
    }
}

// ============================================================
// Kubernetes Cluster (AKS)
// ============================================================

/// Managed identity kind of the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityType {
    #[default]
    SystemAssigned,
    UserAssigned,
}

impl std::fmt::Display for IdentityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityType::SystemAssigned => write!(f, "SystemAssigned"),
            IdentityType::UserAssigned => write!(f, "UserAssigned"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusterIdentity {
    pub identity_type: IdentityType,
}

#[derive(Debug, Clone)]
pub struct RoleBasedAccessControl {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct NetworkProfile {
    /// `azure` (CNI) or `kubenet`
    pub network_plugin: String,
    pub network_policy: Option<String>,
    pub load_balancer_sku: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DefaultNodePool {
    pub name: String,
    pub vm_size: String,
    pub max_pods: Option<u32>,
    pub enable_auto_scaling: bool,
    pub min_count: Option<u32>,
    pub max_count: Option<u32>,
    pub node_count: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct AddonProfile {
    /// Azure Policy add-on
    pub azure_policy: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct KubernetesClusterConfig {
    pub name: Expr,
    pub location: Expr,
    pub resource_group_name: Expr,
    pub dns_prefix: Expr,
    pub identity: ClusterIdentity,
    pub role_based_access_control: RoleBasedAccessControl,
    pub network_profile: NetworkProfile,
    pub default_node_pool: DefaultNodePool,
    pub addon_profile: AddonProfile,
    pub depends_on: Vec<Handle>,
}

impl ResourceConfig for KubernetesClusterConfig {
    const TYPE: &'static str = "azurerm_kubernetes_cluster";

    fn to_expr(&self) -> Expr {
        let pool = &self.default_node_pool;
        let network = &self.network_profile;

        let addons = Attrs::new().set_opt(
            "azure_policy",
            self.addon_profile
                .azure_policy
                .map(|enabled| Attrs::new().set("enabled", enabled)),
        );

        Attrs::new()
            .set("name", self.name.clone())
            .set("location", self.location.clone())
            .set("resource_group_name", self.resource_group_name.clone())
            .set("dns_prefix", self.dns_prefix.clone())
            .set(
                "identity",
                Attrs::new().set("type", self.identity.identity_type.to_string()),
            )
            .set(
                "role_based_access_control",
                Attrs::new().set("enabled", self.role_based_access_control.enabled),
            )
            .set(
                "network_profile",
                Attrs::new()
                    .set("network_plugin", network.network_plugin.clone())
                    .set_opt("network_policy", network.network_policy.clone())
                    .set_opt("load_balancer_sku", network.load_balancer_sku.clone()),
            )
            .set(
                "default_node_pool",
                Attrs::new()
                    .set("name", pool.name.clone())
                    .set("vm_size", pool.vm_size.clone())
                    .set_opt("max_pods", pool.max_pods)
                    .set("enable_auto_scaling", pool.enable_auto_scaling)
                    .set_opt("min_count", pool.min_count)
                    .set_opt("max_count", pool.max_count)
                    .set_opt("node_count", pool.node_count),
            )
            .set_opt("addon_profile", (!addons.is_empty()).then_some(addons))
            .build()
    }

    fn depends_on(&self) -> &[Handle] {
        &self.depends_on
    }
}

/// A declared `azurerm_kubernetes_cluster`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubernetesCluster {
    handle: Handle,
}

impl KubernetesCluster {
    pub fn declare(
        stack: &mut TerraformStack,
        id: &str,
        config: &KubernetesClusterConfig,
    ) -> Result<Self> {
        stack.add_resource(id, config).map(|handle| Self { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Entry `index` of the exported `kube_config` list
    pub fn kube_config(&self, index: usize) -> KubeConfigRef {
        KubeConfigRef {
            handle: self.handle.clone(),
            prefix: format!("kube_config.{}", index),
        }
    }

    /// Raw admin kubeconfig document, with cluster-admin credentials
    pub fn kube_admin_config_raw(&self) -> Reference {
        self.handle.attr("kube_admin_config_raw")
    }

    /// Client ID of the kubelet's user-assigned identity
    pub fn kubelet_identity_client_id(&self) -> Reference {
        self.handle.attr("kubelet_identity.0.client_id")
    }
}

/// Deferred view of one `kube_config` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeConfigRef {
    handle: Handle,
    prefix: String,
}

impl KubeConfigRef {
    fn field(&self, name: &str) -> Reference {
        self.handle.attr(format!("{}.{}", self.prefix, name))
    }

    pub fn host(&self) -> Reference {
        self.field("host")
    }

    /// Base64-encoded PEM
    pub fn client_certificate(&self) -> Reference {
        self.field("client_certificate")
    }

    /// Base64-encoded PEM
    pub fn client_key(&self) -> Reference {
        self.field("client_key")
    }

    /// Base64-encoded PEM
    pub fn cluster_ca_certificate(&self) -> Reference {
        self.field("cluster_ca_certificate")
    }

    pub fn username(&self) -> Reference {
        self.field("username")
    }

    pub fn password(&self) -> Reference {
        self.field("password")
    }
}

// ============================================================
// Client Config
// ============================================================

/// `data "azurerm_client_config"`: identity Terraform runs as
#[derive(Debug, Clone, Default)]
pub struct ClientConfigData;

impl DataSourceConfig for ClientConfigData {
    const TYPE: &'static str = "azurerm_client_config";

    fn to_expr(&self) -> Expr {
        Expr::empty_object()
    }
}

/// A declared `azurerm_client_config` data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    handle: Handle,
}

impl ClientConfig {
    pub fn declare(stack: &mut TerraformStack, id: &str) -> Result<Self> {
        stack
            .add_data_source(id, &ClientConfigData)
            .map(|handle| Self { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn tenant_id(&self) -> Reference {
        self.handle.attr("tenant_id")
    }

    pub fn subscription_id(&self) -> Reference {
        self.handle.attr("subscription_id")
    }
}
