//! Charts Stack
//!
//! Configures Helm against a cluster stack's kubeconfig and installs
//! chart releases into it. Every value read from the cluster stack is a
//! cross-stack reference, so this stack can only be applied after the
//! cluster stack has been.

use tracing::info;

use super::cluster::Cluster;
use crate::providers::azurerm::{AzurermProvider, ClientConfig, KubeConfigRef, KubernetesCluster, ResourceGroup};
use crate::providers::helm::{HelmKubernetes, HelmProvider, Release, ReleaseConfig};
use crate::synth::{functions, Attrs, Expr, Result, TerraformStack};

pub const EXTERNAL_DNS_CHART: &str = "external-dns";
pub const EXTERNAL_DNS_CHART_VERSION: &str = "6.1.2";
pub const EXTERNAL_DNS_IMAGE_TAG: &str = "0.9.0";
pub const BITNAMI_REPOSITORY: &str = "https://charts.bitnami.com/bitnami";

#[derive(Debug, Clone, Copy)]
pub struct ChartsProps<'a> {
    pub cluster: &'a Cluster,
}

/// Map a cluster kubeconfig onto Helm provider credentials.
///
/// AKS exports certificate and key material base64-encoded; Helm wants PEM.
pub fn make_kube_config(config: &KubeConfigRef) -> HelmKubernetes {
    HelmKubernetes {
        host: config.host().into(),
        client_certificate: functions::base64decode(config.client_certificate()),
        client_key: functions::base64decode(config.client_key()),
        cluster_ca_certificate: functions::base64decode(config.cluster_ca_certificate()),
        username: config.username().into(),
        password: config.password().into(),
    }
}

/// The charts unit
#[derive(Debug, Clone)]
pub struct Charts {
    stack: TerraformStack,
    resource_group: ResourceGroup,
    aks: KubernetesCluster,
    releases: Vec<Release>,
}

impl Charts {
    pub fn new(name: &str, props: ChartsProps<'_>) -> Result<Self> {
        let mut stack = TerraformStack::new(name);
        stack.add_provider(&HelmProvider {
            kubernetes: make_kube_config(&props.cluster.aks().kube_config(0)),
        });
        stack.add_provider(&AzurermProvider);

        let mut charts = Self {
            stack,
            resource_group: props.cluster.resource_group().clone(),
            aks: props.cluster.aks().clone(),
            releases: Vec::new(),
        };
        charts.add_external_dns()?;

        info!(stack = %name, cluster = %props.cluster.name(), "Charts stack declared");
        Ok(charts)
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    /// Install `name` from `repository` into its own, auto-created namespace
    pub fn add_chart(
        &mut self,
        name: &str,
        version: &str,
        repository: &str,
        values: impl Into<Expr>,
    ) -> Result<Release> {
        let release = Release::declare(
            &mut self.stack,
            name,
            &ReleaseConfig {
                name: name.to_string(),
                namespace: Some(name.to_string()),
                repository: Some(repository.to_string()),
                chart: name.to_string(),
                version: Some(version.to_string()),
                create_namespace: true,
                values: vec![Expr::yaml(values)],
            },
        )?;

        info!(chart = %name, %version, %repository, "Chart release declared");
        self.releases.push(release.clone());
        Ok(release)
    }

    /// external-dns managing Azure DNS through the kubelet's managed identity
    pub fn add_external_dns(&mut self) -> Result<&mut Self> {
        let client = ClientConfig::declare(&mut self.stack, "client")?;

        let values = Attrs::new()
            .set("provider", "azure")
            .set(
                "image",
                // 0.10.0 doesn't work with useManagedIdentityExtension
                Attrs::new().set("tag", EXTERNAL_DNS_IMAGE_TAG),
            )
            .set(
                "azure",
                Attrs::new()
                    .set("resourceGroup", self.resource_group.name())
                    .set("tenantId", client.tenant_id())
                    .set("subscriptionId", client.subscription_id())
                    .set("useManagedIdentityExtension", true)
                    .set("userAssignedIdentityID", self.aks.kubelet_identity_client_id()),
            )
            .set("logLevel", "info")
            .set("txtOwnerId", "external-dns")
            .set("sources", vec!["ingress"]);

        self.add_chart(
            EXTERNAL_DNS_CHART,
            EXTERNAL_DNS_CHART_VERSION,
            BITNAMI_REPOSITORY,
            values,
        )?;
        Ok(self)
    }
}

impl From<Charts> for TerraformStack {
    fn from(charts: Charts) -> Self {
        charts.stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::cluster::ClusterProps;
    use crate::synth::{App, Reference, SynthError, SynthesizedStack};
    use serde_json::{json, Value};

    fn cluster() -> Cluster {
        Cluster::new(
            "cluster",
            ClusterProps {
                region: "eastus".to_string(),
            },
        )
        .unwrap()
    }

    fn resolve(cluster: Cluster, charts: Charts) -> Vec<SynthesizedStack> {
        let mut app = App::new("cdktf.out");
        app.add_stack(cluster).unwrap();
        app.add_stack(charts).unwrap();
        app.resolve().unwrap()
    }

    /// How the charts stack reads a cluster stack value
    fn imported(reference: &Reference) -> String {
        format!(
            "${{data.terraform_remote_state.cross-stack-reference-input-cluster.outputs.{}}}",
            reference.output_name()
        )
    }

    fn external_dns_values(doc: &Value) -> Value {
        let values = &doc["resource"]["helm_release"]["external-dns"]["values"];
        assert_eq!(values.as_array().unwrap().len(), 1);
        serde_yaml::from_str(values[0].as_str().unwrap()).unwrap()
    }

    #[test]
    fn test_make_kube_config_decodes_credentials_only() {
        let cluster = cluster();
        let config = cluster.aks().kube_config(0);
        let helm = make_kube_config(&config);

        assert_eq!(helm.host, Expr::Ref(config.host()));
        assert_eq!(helm.username, Expr::Ref(config.username()));
        assert_eq!(helm.password, Expr::Ref(config.password()));
        assert_eq!(helm.client_key, functions::base64decode(config.client_key()));
        assert_eq!(
            helm.client_certificate,
            functions::base64decode(config.client_certificate())
        );
        assert_eq!(
            helm.cluster_ca_certificate,
            functions::base64decode(config.cluster_ca_certificate())
        );
    }

    #[test]
    fn test_helm_provider_reads_cluster_kubeconfig() {
        let cluster = cluster();
        let config = cluster.aks().kube_config(0);
        let charts = Charts::new("charts", ChartsProps { cluster: &cluster }).unwrap();
        let resolved = resolve(cluster, charts);
        let doc = &resolved[1].document;

        let k8s = &doc["provider"]["helm"][0]["kubernetes"];
        assert_eq!(k8s["host"], json!(imported(&config.host())));
        assert_eq!(k8s["username"], json!(imported(&config.username())));
        assert_eq!(k8s["password"], json!(imported(&config.password())));

        let key = imported(&config.client_key());
        assert_eq!(
            k8s["client_key"],
            json!(format!("${{base64decode({})}}", &key[2..key.len() - 1]))
        );
        assert_eq!(doc["provider"]["azurerm"][0]["features"], json!({}));
    }

    #[test]
    fn test_cluster_exports_what_charts_reads() {
        let cluster = cluster();
        let host = cluster.aks().kube_config(0).host();
        let charts = Charts::new("charts", ChartsProps { cluster: &cluster }).unwrap();
        let resolved = resolve(cluster, charts);

        assert_eq!(resolved[0].name, "cluster");
        assert_eq!(resolved[1].name, "charts");
        assert_eq!(resolved[1].dependencies, vec!["cluster".to_string()]);

        let output = &resolved[0].document["output"][host.output_name().as_str()];
        assert_eq!(
            output["value"],
            "${azurerm_kubernetes_cluster.aks-cluster.kube_config.0.host}"
        );
        assert_eq!(output["sensitive"], true);

        let remote = &resolved[1].document["data"]["terraform_remote_state"]
            ["cross-stack-reference-input-cluster"];
        assert_eq!(remote["config"]["path"], "../cluster/terraform.cluster.tfstate");
    }

    #[test]
    fn test_external_dns_release() {
        let cluster = cluster();
        let charts = Charts::new("charts", ChartsProps { cluster: &cluster }).unwrap();
        assert_eq!(charts.releases().len(), 1);

        let resolved = resolve(cluster, charts);
        let release = &resolved[1].document["resource"]["helm_release"]["external-dns"];

        assert_eq!(release["name"], "external-dns");
        assert_eq!(release["namespace"], "external-dns");
        assert_eq!(release["chart"], "external-dns");
        assert_eq!(release["create_namespace"], true);
        assert_eq!(release["version"], "6.1.2");
        assert_eq!(release["repository"], "https://charts.bitnami.com/bitnami");
    }

    #[test]
    fn test_external_dns_values() {
        let cluster = cluster();
        let rg_name = cluster.resource_group().name();
        let kubelet = cluster.aks().kubelet_identity_client_id();
        let charts = Charts::new("charts", ChartsProps { cluster: &cluster }).unwrap();
        let resolved = resolve(cluster, charts);
        let values = external_dns_values(&resolved[1].document);

        assert_eq!(values["provider"], "azure");
        assert_eq!(values["image"]["tag"], "0.9.0");
        assert_eq!(values["logLevel"], "info");
        assert_eq!(values["txtOwnerId"], "external-dns");
        assert_eq!(values["sources"], json!(["ingress"]));

        let azure = &values["azure"];
        assert_eq!(azure["resourceGroup"], json!(imported(&rg_name)));
        assert_eq!(azure["userAssignedIdentityID"], json!(imported(&kubelet)));
        assert_eq!(azure["useManagedIdentityExtension"], true);
        assert_eq!(azure["tenantId"], "${data.azurerm_client_config.client.tenant_id}");
        assert_eq!(
            azure["subscriptionId"],
            "${data.azurerm_client_config.client.subscription_id}"
        );
    }

    #[test]
    fn test_add_chart_defaults_namespace_to_name() {
        let cluster = cluster();
        let mut charts = Charts::new("charts", ChartsProps { cluster: &cluster }).unwrap();
        let release = charts
            .add_chart(
                "ingress-nginx",
                "4.0.1",
                "https://kubernetes.github.io/ingress-nginx",
                Expr::empty_object(),
            )
            .unwrap();
        assert_eq!(release.handle().address(), "helm_release.ingress-nginx");

        let resolved = resolve(cluster, charts);
        let doc = &resolved[1].document["resource"]["helm_release"]["ingress-nginx"];
        assert_eq!(doc["namespace"], "ingress-nginx");
        assert_eq!(doc["create_namespace"], true);
        assert_eq!(doc["values"], json!(["{}\n"]));
    }

    #[test]
    fn test_external_dns_declared_once() {
        let cluster = cluster();
        let mut charts = Charts::new("charts", ChartsProps { cluster: &cluster }).unwrap();

        assert!(matches!(
            charts.add_external_dns().unwrap_err(),
            SynthError::DuplicateBlock { .. }
        ));
    }

    #[test]
    fn test_resynthesis_is_identical() {
        let build = || {
            let cluster = cluster();
            let charts = Charts::new("charts", ChartsProps { cluster: &cluster }).unwrap();
            resolve(cluster, charts)
        };
        assert_eq!(build(), build());
    }
}
