//! Lornu AI Infra
//!
//! Declares the AKS cluster and its Helm charts as Terraform stacks and
//! synthesizes them to Terraform JSON. Terraform does the rest.

pub mod config;
pub mod providers;
pub mod stacks;
pub mod synth;

pub use config::InfraSettings;
pub use stacks::{build_app, Charts, ChartsProps, Cluster, ClusterProps};
pub use synth::{App, SynthError};
