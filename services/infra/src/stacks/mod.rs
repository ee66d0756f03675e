//! Deployment Stacks
//!
//! - `cluster`: resource group + AKS cluster
//! - `charts`: Helm releases installed into that cluster
//!
//! `build_app` wires the two together the way the deployment runs them.

pub mod charts;
pub mod cluster;

pub use charts::{make_kube_config, Charts, ChartsProps};
pub use cluster::{Cluster, ClusterProps};

use std::path::Path;

use crate::config::InfraSettings;
use crate::synth::{App, Result};

/// Declare the cluster and charts stacks into a new app
pub fn build_app(settings: &InfraSettings, outdir: impl AsRef<Path>) -> Result<App> {
    let mut app = App::new(outdir.as_ref());

    let cluster = Cluster::new(
        &settings.cluster_name,
        ClusterProps {
            region: settings.region.clone(),
        },
    )?;
    let charts = Charts::new(&settings.charts_name, ChartsProps { cluster: &cluster })?;

    app.add_stack(cluster)?;
    app.add_stack(charts)?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_deployment_order() {
        let app = build_app(&InfraSettings::default(), "cdktf.out").unwrap();
        assert_eq!(app.deploy_order().unwrap(), vec!["cluster", "charts"]);
    }

    #[test]
    fn test_same_name_for_both_stacks_rejected() {
        let settings = InfraSettings {
            charts_name: "cluster".to_string(),
            ..InfraSettings::default()
        };
        assert!(build_app(&settings, "cdktf.out").is_err());
    }

    #[test]
    fn test_synth_default_deployment() {
        let dir = tempdir().unwrap();
        let app = build_app(&InfraSettings::default(), dir.path()).unwrap();

        let manifest = app.synth().unwrap();
        assert_eq!(manifest.stacks["charts"].dependencies, vec!["cluster".to_string()]);
        assert!(manifest.stacks["cluster"].dependencies.is_empty());

        for stack in ["cluster", "charts"] {
            let path = dir.path().join("stacks").join(stack).join("cdk.tf.json");
            let doc: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
            assert_eq!(doc["//"]["metadata"]["stackName"], stack);
        }
    }

    #[test]
    fn test_custom_names_flow_through() {
        let settings = InfraSettings {
            cluster_name: "prod".to_string(),
            region: "westeurope".to_string(),
            charts_name: "prod-charts".to_string(),
        };
        let app = build_app(&settings, "cdktf.out").unwrap();
        let charts = app.resolve_stack("prod-charts").unwrap();

        assert_eq!(charts.dependencies, vec!["prod".to_string()]);
        assert!(charts.document["data"]["terraform_remote_state"]
            .get("cross-stack-reference-input-prod")
            .is_some());
    }
}
