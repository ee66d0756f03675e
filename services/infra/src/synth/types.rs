//! Synthesis Types
//!
//! Addresses, deferred references and the error type shared by the
//! synthesis layer.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for synthesis operations
pub type Result<T, E = SynthError> = std::result::Result<T, E>;

/// Errors raised while declaring or synthesizing stacks.
///
/// These only cover the integrity of the emitted configuration. Anything
/// Azure or Helm would reject surfaces later, from Terraform itself.
#[derive(Debug, Error)]
pub enum SynthError {
    /// Two stacks share a name
    #[error("Stack already declared: {0}")]
    DuplicateStack(String),

    /// Two blocks share an address inside one stack
    #[error("Block {address} already declared in stack {stack}")]
    DuplicateBlock { stack: String, address: String },

    /// A reference points at a stack the app does not know
    #[error("Stack {from} references unknown stack {to}")]
    UnknownStack { from: String, to: String },

    /// A reference points at a block its stack never declared
    #[error("Stack {from} references {address}, which stack {to} does not declare")]
    UnresolvedReference {
        from: String,
        to: String,
        address: String,
    },

    /// Stacks depend on each other in a loop
    #[error("Dependency cycle between stacks: {0}")]
    DependencyCycle(String),

    /// Lookup by name failed
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    /// Writing synthesized output failed
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding of chart values failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Address of a block declared in a stack
///
/// Resources are addressed as `<type>.<id>`, data sources as
/// `data.<type>.<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    stack: String,
    address: String,
}

impl Handle {
    pub(crate) fn new(stack: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            address: address.into(),
        }
    }

    /// Name of the stack owning the block
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Terraform address of the block
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Deferred read of one of the block's attributes
    pub fn attr(&self, path: impl Into<String>) -> Reference {
        Reference {
            stack: self.stack.clone(),
            address: self.address.clone(),
            path: path.into(),
        }
    }
}

/// A deferred attribute read, resolved by Terraform at apply time
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    /// Stack that owns the referenced block
    pub stack: String,
    /// Address of the referenced block
    pub address: String,
    /// Attribute path below the block (e.g. `kube_config.0.host`)
    pub path: String,
}

impl Reference {
    /// Terraform expression for a read from within the owning stack
    pub fn expression(&self) -> String {
        format!("{}.{}", self.address, self.path)
    }

    /// Name of the output the owning stack exports this value under
    /// when another stack consumes it.
    pub fn output_name(&self) -> String {
        format!("cross-stack-output-{}", self.expression())
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_attr_reference() {
        let handle = Handle::new("cluster", "azurerm_resource_group.rg-cluster");
        let reference = handle.attr("name");

        assert_eq!(reference.stack, "cluster");
        assert_eq!(reference.expression(), "azurerm_resource_group.rg-cluster.name");
    }

    #[test]
    fn test_output_name_is_valid_terraform_identifier() {
        let reference = Handle::new("cluster", "azurerm_kubernetes_cluster.aks-cluster")
            .attr("kube_config.0.host");

        let name = reference.output_name();
        assert_eq!(
            name,
            "cross-stack-output-azurerm_kubernetes_cluster_aks-cluster_kube_config_0_host"
        );
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_error_messages() {
        let err = SynthError::UnresolvedReference {
            from: "charts".to_string(),
            to: "cluster".to_string(),
            address: "azurerm_resource_group.missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Stack charts references azurerm_resource_group.missing, which stack cluster does not declare"
        );
    }
}
