//! Terraform JSON Synthesis
//!
//! Declarative layer that turns stacks of typed blocks into Terraform
//! JSON configuration. Planning, applying and state are left to Terraform.
//!
//! ## Layout
//!
//! - `expr`: literal values, deferred references and function calls
//! - `stack`: one deployable unit rendered to `cdk.tf.json`
//! - `app`: the set of stacks, cross-stack wiring and output directory
//! - `types`: addresses, references and `SynthError`

pub mod app;
pub mod expr;
pub mod stack;
pub mod types;

pub use app::{App, Manifest, StackManifest, SynthesizedStack};
pub use expr::{functions, Attrs, Expr};
pub use stack::TerraformStack;
pub use types::{Handle, Reference, Result, SynthError};
