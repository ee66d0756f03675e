//! Synthesis App
//!
//! Holds every stack of the deployment, wires references that cross
//! stack boundaries through outputs and remote state, and writes the
//! result to the output directory.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::stack::{remote_state_id, CrossStack, TerraformStack};
use super::types::{Reference, Result, SynthError};

/// File name of a synthesized stack inside its working directory
pub const STACK_FILE: &str = "cdk.tf.json";

/// File name of the manifest at the root of the output directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// A rendered stack
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedStack {
    pub name: String,
    /// The `cdk.tf.json` document
    pub document: Value,
    /// Stacks that must be applied before this one
    pub dependencies: Vec<String>,
}

/// Index of a synthesis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub outdir: String,
    pub stacks: BTreeMap<String, StackManifest>,
}

/// Manifest entry for one stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackManifest {
    pub name: String,
    pub construct_path: String,
    pub working_directory: String,
    pub synthesized_stack_path: String,
    pub dependencies: Vec<String>,
}

/// A set of stacks synthesized together
#[derive(Debug, Clone)]
pub struct App {
    outdir: PathBuf,
    stacks: Vec<TerraformStack>,
}

impl App {
    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
            stacks: Vec::new(),
        }
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// Register a stack
    pub fn add_stack(&mut self, stack: impl Into<TerraformStack>) -> Result<()> {
        let stack = stack.into();
        if self.index_of(stack.name()).is_some() {
            return Err(SynthError::DuplicateStack(stack.name().to_string()));
        }
        info!(stack = %stack.name(), "Stack added");
        self.stacks.push(stack);
        Ok(())
    }

    pub fn stack(&self, name: &str) -> Option<&TerraformStack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.stacks.iter().position(|s| s.name() == name)
    }

    /// Work out, per stack, what it exports and which stacks it reads from
    fn wiring(&self) -> Result<Vec<CrossStack>> {
        let mut wiring = vec![CrossStack::default(); self.stacks.len()];
        // Output names are sanitized, so distinct references can map to one name
        let mut exported: Vec<BTreeMap<String, Reference>> = vec![BTreeMap::new(); self.stacks.len()];

        for (consumer, stack) in self.stacks.iter().enumerate() {
            for reference in stack.references() {
                let producer =
                    self.index_of(&reference.stack)
                        .ok_or_else(|| SynthError::UnknownStack {
                            from: stack.name().to_string(),
                            to: reference.stack.clone(),
                        })?;

                if !self.stacks[producer].declares(&reference.address) {
                    return Err(SynthError::UnresolvedReference {
                        from: stack.name().to_string(),
                        to: reference.stack.clone(),
                        address: reference.address.clone(),
                    });
                }

                if producer == consumer {
                    continue;
                }

                let output = reference.output_name();
                match exported[producer].get(&output) {
                    Some(existing) if existing == reference => {}
                    Some(_) => return Err(output_taken(&reference.stack, &output)),
                    None if self.stacks[producer].has_output(&output) => {
                        return Err(output_taken(&reference.stack, &output));
                    }
                    None => {
                        debug!(
                            producer = %reference.stack,
                            consumer = %stack.name(),
                            %output,
                            "Cross-stack reference exported"
                        );
                        exported[producer].insert(output, reference.clone());
                        wiring[producer].exports.push(reference.clone());
                    }
                }
                if !wiring[consumer].imports.contains(&reference.stack) {
                    debug!(
                        producer = %reference.stack,
                        consumer = %stack.name(),
                        "Remote state imported"
                    );
                    wiring[consumer].imports.push(reference.stack.clone());
                }
            }
        }

        Ok(wiring)
    }

    /// Stack indices ordered so every producer precedes its consumers.
    /// Ties keep declaration order.
    fn order(&self, wiring: &[CrossStack]) -> Result<Vec<usize>> {
        let count = self.stacks.len();
        let mut placed = vec![false; count];
        let mut order = Vec::with_capacity(count);

        while order.len() < count {
            let next = (0..count).find(|&i| {
                !placed[i]
                    && wiring[i]
                        .imports
                        .iter()
                        .all(|dep| self.index_of(dep).is_some_and(|d| placed[d]))
            });

            match next {
                Some(i) => {
                    placed[i] = true;
                    order.push(i);
                }
                None => {
                    let stuck: Vec<&str> = (0..count)
                        .filter(|&i| !placed[i])
                        .map(|i| self.stacks[i].name())
                        .collect();
                    return Err(SynthError::DependencyCycle(stuck.join(", ")));
                }
            }
        }

        Ok(order)
    }

    /// Stack names in the order they have to be applied
    pub fn deploy_order(&self) -> Result<Vec<&str>> {
        let wiring = self.wiring()?;
        Ok(self
            .order(&wiring)?
            .into_iter()
            .map(|i| self.stacks[i].name())
            .collect())
    }

    /// Render every stack without touching the filesystem.
    ///
    /// Stacks come back in deployment order.
    pub fn resolve(&self) -> Result<Vec<SynthesizedStack>> {
        let wiring = self.wiring()?;
        let order = self.order(&wiring)?;

        let mut resolved = Vec::with_capacity(order.len());
        for i in order {
            let stack = &self.stacks[i];
            let resolve = |reference: &Reference| {
                if reference.stack == stack.name() {
                    reference.expression()
                } else {
                    format!(
                        "data.terraform_remote_state.{}.outputs.{}",
                        remote_state_id(&reference.stack),
                        reference.output_name()
                    )
                }
            };

            resolved.push(SynthesizedStack {
                name: stack.name().to_string(),
                document: stack.render(&resolve, &wiring[i])?,
                dependencies: wiring[i].imports.clone(),
            });
        }

        Ok(resolved)
    }

    /// Render a single stack
    pub fn resolve_stack(&self, name: &str) -> Result<SynthesizedStack> {
        let stack = self
            .stack(name)
            .ok_or_else(|| SynthError::StackNotFound(name.to_string()))?;
        self.resolve()?
            .into_iter()
            .find(|s| s.name == stack.name())
            .ok_or_else(|| SynthError::StackNotFound(name.to_string()))
    }

    /// Stack directories left over from earlier runs are not removed;
    /// Terraform would still find them there.
    fn warn_stale_stacks(&self) {
        let Ok(entries) = fs::read_dir(self.outdir.join("stacks")) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() && self.stack(&name).is_none() {
                warn!(stack = %name, path = %entry.path().display(), "Stale stack directory in output");
            }
        }
    }

    /// Write every stack and the manifest to the output directory
    pub fn synth(&self) -> Result<Manifest> {
        let resolved = self.resolve()?;
        self.warn_stale_stacks();
        let mut manifest = Manifest {
            version: env!("CARGO_PKG_VERSION").to_string(),
            outdir: self.outdir.display().to_string(),
            stacks: BTreeMap::new(),
        };

        for stack in resolved {
            let working_directory = format!("stacks/{}", stack.name);
            let dir = self.outdir.join(&working_directory);
            fs::create_dir_all(&dir).map_err(|source| SynthError::Io {
                path: dir.clone(),
                source,
            })?;

            let path = dir.join(STACK_FILE);
            write_json(&path, &stack.document)?;
            info!(stack = %stack.name, path = %path.display(), "Stack synthesized");

            manifest.stacks.insert(
                stack.name.clone(),
                StackManifest {
                    construct_path: stack.name.clone(),
                    synthesized_stack_path: format!("{}/{}", working_directory, STACK_FILE),
                    working_directory,
                    dependencies: stack.dependencies,
                    name: stack.name,
                },
            );
        }

        let path = self.outdir.join(MANIFEST_FILE);
        write_json(&path, &manifest)?;
        info!(path = %path.display(), stacks = manifest.stacks.len(), "Manifest written");

        Ok(manifest)
    }
}

fn output_taken(stack: &str, output: &str) -> SynthError {
    SynthError::DuplicateBlock {
        stack: stack.to_string(),
        address: format!("output.{}", output),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    fs::write(path, body).map_err(|source| SynthError::Io {
        path: path.to_path_buf(),
        source,
    })
}
