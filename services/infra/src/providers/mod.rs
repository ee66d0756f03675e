//! Provider Bindings
//!
//! Typed configuration for the Terraform providers the stacks use:
//! - `azurerm`: resource group, AKS cluster and client config data source
//! - `helm`: provider configuration and chart releases

pub mod azurerm;
pub mod helm;

use crate::synth::{Expr, Handle};

/// A Terraform provider block
pub trait Provider {
    /// Local name in `required_providers` and `provider` blocks
    const NAME: &'static str;
    /// Registry source address
    const SOURCE: &'static str;
    /// Version constraint
    const VERSION: &'static str;

    /// Provider configuration body
    fn to_expr(&self) -> Expr;
}

/// Configuration of a managed resource
pub trait ResourceConfig {
    /// Terraform resource type (e.g. `azurerm_resource_group`)
    const TYPE: &'static str;

    /// Resource arguments
    fn to_expr(&self) -> Expr;

    /// Blocks that must be created first (`depends_on`)
    fn depends_on(&self) -> &[Handle] {
        &[]
    }
}

/// Configuration of a data source
pub trait DataSourceConfig {
    /// Terraform data source type (e.g. `azurerm_client_config`)
    const TYPE: &'static str;

    fn to_expr(&self) -> Expr;
}
