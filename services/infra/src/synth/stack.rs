//! Terraform Stack
//!
//! One deployable unit: its providers, data sources, resources and
//! outputs, rendered to a single `cdk.tf.json` document with its own
//! local state file.

use serde_json::{json, Map, Value};
use tracing::debug;

use super::expr::Expr;
use super::types::{Handle, Reference, Result, SynthError};
use crate::providers::{DataSourceConfig, Provider, ResourceConfig};

/// Backend every stack stores its state in
pub const BACKEND: &str = "local";

/// A block declared in a stack
#[derive(Debug, Clone)]
struct Block {
    kind: &'static str,
    id: String,
    body: Expr,
    depends_on: Vec<String>,
}

#[derive(Debug, Clone)]
struct RequiredProvider {
    name: &'static str,
    source: &'static str,
    version: &'static str,
}

#[derive(Debug, Clone)]
struct Output {
    id: String,
    value: Expr,
    sensitive: bool,
}

/// Cross-stack wiring computed by the app for one stack
#[derive(Debug, Clone, Default)]
pub(crate) struct CrossStack {
    /// Values this stack exports for other stacks
    pub exports: Vec<Reference>,
    /// Stacks whose outputs this stack reads
    pub imports: Vec<String>,
}

/// Id of the remote state data source reading `stack`'s outputs
pub fn remote_state_id(stack: &str) -> String {
    format!("cross-stack-reference-input-{}", stack)
}

/// A Terraform stack under construction
#[derive(Debug, Clone)]
pub struct TerraformStack {
    name: String,
    required_providers: Vec<RequiredProvider>,
    providers: Vec<(&'static str, Expr)>,
    data: Vec<Block>,
    resources: Vec<Block>,
    outputs: Vec<Output>,
}

impl TerraformStack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_providers: Vec::new(),
            providers: Vec::new(),
            data: Vec::new(),
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// State file of the local backend, relative to the stack directory
    pub fn state_file(&self) -> String {
        format!("terraform.{}.tfstate", self.name)
    }

    /// Configure a provider
    pub fn add_provider<P: Provider>(&mut self, provider: &P) {
        if !self.required_providers.iter().any(|p| p.name == P::NAME) {
            self.required_providers.push(RequiredProvider {
                name: P::NAME,
                source: P::SOURCE,
                version: P::VERSION,
            });
        }
        self.providers.push((P::NAME, provider.to_expr()));
        debug!(stack = %self.name, provider = P::NAME, "Provider configured");
    }

    /// Declare a managed resource
    pub fn add_resource<R: ResourceConfig>(&mut self, id: &str, config: &R) -> Result<Handle> {
        let address = format!("{}.{}", R::TYPE, id);
        if self.declares(&address) {
            return Err(SynthError::DuplicateBlock {
                stack: self.name.clone(),
                address,
            });
        }

        let mut depends_on = Vec::new();
        for dependency in config.depends_on() {
            if dependency.stack() != self.name || !self.declares(dependency.address()) {
                return Err(SynthError::UnresolvedReference {
                    from: self.name.clone(),
                    to: dependency.stack().to_string(),
                    address: dependency.address().to_string(),
                });
            }
            depends_on.push(dependency.address().to_string());
        }

        self.resources.push(Block {
            kind: R::TYPE,
            id: id.to_string(),
            body: config.to_expr(),
            depends_on,
        });
        debug!(stack = %self.name, %address, "Resource declared");

        Ok(Handle::new(self.name.clone(), address))
    }

    /// Declare a data source
    pub fn add_data_source<D: DataSourceConfig>(&mut self, id: &str, config: &D) -> Result<Handle> {
        let address = format!("data.{}.{}", D::TYPE, id);
        if self.declares(&address) {
            return Err(SynthError::DuplicateBlock {
                stack: self.name.clone(),
                address,
            });
        }

        self.data.push(Block {
            kind: D::TYPE,
            id: id.to_string(),
            body: config.to_expr(),
            depends_on: Vec::new(),
        });
        debug!(stack = %self.name, %address, "Data source declared");

        Ok(Handle::new(self.name.clone(), address))
    }

    /// Declare an output
    pub fn add_output(&mut self, id: &str, value: impl Into<Expr>, sensitive: bool) -> Result<()> {
        if self.has_output(id) {
            return Err(SynthError::DuplicateBlock {
                stack: self.name.clone(),
                address: format!("output.{}", id),
            });
        }
        self.outputs.push(Output {
            id: id.to_string(),
            value: value.into(),
            sensitive,
        });
        Ok(())
    }

    /// Whether an explicit output with this id exists
    pub fn has_output(&self, id: &str) -> bool {
        self.outputs.iter().any(|o| o.id == id)
    }

    /// Whether a block with this address exists in the stack
    pub fn declares(&self, address: &str) -> bool {
        self.resources
            .iter()
            .any(|b| format!("{}.{}", b.kind, b.id) == address)
            || self
                .data
                .iter()
                .any(|b| format!("data.{}.{}", b.kind, b.id) == address)
    }

    /// Every reference made by the stack's blocks
    pub fn references(&self) -> Vec<&Reference> {
        self.providers
            .iter()
            .map(|(_, body)| body)
            .chain(self.data.iter().map(|b| &b.body))
            .chain(self.resources.iter().map(|b| &b.body))
            .chain(self.outputs.iter().map(|o| &o.value))
            .flat_map(Expr::references)
            .collect()
    }

    /// Render the stack document
    pub(crate) fn render<F>(&self, resolve: &F, wiring: &CrossStack) -> Result<Value>
    where
        F: Fn(&Reference) -> String,
    {
        let mut doc = Map::new();

        doc.insert(
            "//".to_string(),
            json!({
                "metadata": {
                    "version": env!("CARGO_PKG_VERSION"),
                    "stackName": self.name,
                    "backend": BACKEND,
                }
            }),
        );

        let mut required = Map::new();
        for provider in &self.required_providers {
            required.insert(
                provider.name.to_string(),
                json!({ "source": provider.source, "version": provider.version }),
            );
        }
        let mut terraform = Map::new();
        if !required.is_empty() {
            terraform.insert("required_providers".to_string(), Value::Object(required));
        }
        terraform.insert(
            "backend".to_string(),
            json!({ BACKEND: { "path": self.state_file() } }),
        );
        doc.insert("terraform".to_string(), Value::Object(terraform));

        if !self.providers.is_empty() {
            let mut providers = Map::new();
            for (name, body) in &self.providers {
                let entry = providers
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(configs) = entry {
                    configs.push(body.render(resolve)?);
                }
            }
            doc.insert("provider".to_string(), Value::Object(providers));
        }

        let mut data = Map::new();
        for producer in &wiring.imports {
            nest(
                &mut data,
                "terraform_remote_state",
                &remote_state_id(producer),
                json!({
                    "backend": BACKEND,
                    "config": {
                        "path": format!("../{}/terraform.{}.tfstate", producer, producer),
                    }
                }),
            );
        }
        for block in &self.data {
            nest(&mut data, block.kind, &block.id, block.body.render(resolve)?);
        }
        if !data.is_empty() {
            doc.insert("data".to_string(), Value::Object(data));
        }

        let mut resources = Map::new();
        for block in &self.resources {
            let mut body = block.body.render(resolve)?;
            if let Value::Object(fields) = &mut body {
                if !block.depends_on.is_empty() {
                    fields.insert("depends_on".to_string(), json!(block.depends_on));
                }
            }
            nest(&mut resources, block.kind, &block.id, body);
        }
        if !resources.is_empty() {
            doc.insert("resource".to_string(), Value::Object(resources));
        }

        let mut outputs = Map::new();
        for output in &self.outputs {
            outputs.insert(
                output.id.clone(),
                json!({ "value": output.value.render(resolve)?, "sensitive": output.sensitive }),
            );
        }
        for export in &wiring.exports {
            outputs.insert(
                export.output_name(),
                json!({ "value": format!("${{{}}}", export.expression()), "sensitive": true }),
            );
        }
        if !outputs.is_empty() {
            doc.insert("output".to_string(), Value::Object(outputs));
        }

        Ok(Value::Object(doc))
    }
}

/// Insert `body` at `section[kind][id]`
fn nest(section: &mut Map<String, Value>, kind: &str, id: &str, body: Value) {
    let group = section
        .entry(kind.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(group) = group {
        group.insert(id.to_string(), body);
    }
}
