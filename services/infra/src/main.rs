//! Infra Synth
//!
//! Synthesizes the cluster and charts stacks to Terraform JSON. Apply the
//! output with Terraform, cluster stack first.
//!
//! # Usage
//! ```bash
//! # Write cdktf.out/stacks/*/cdk.tf.json and cdktf.out/manifest.json
//! infra-synth synth
//!
//! # Different cluster name and region
//! infra-synth --cluster-name prod --region westeurope synth
//!
//! # Stacks in apply order
//! infra-synth list
//!
//! # Print one stack
//! infra-synth show charts
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use aks_infra::config::{DEFAULT_CHARTS_NAME, DEFAULT_CLUSTER_NAME, DEFAULT_OUTDIR, DEFAULT_REGION};
use aks_infra::{build_app, InfraSettings};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser, Debug)]
#[command(name = "infra-synth")]
#[command(about = "Lornu AI Infra - AKS and Helm stacks as Terraform JSON", long_about = None)]
#[command(version)]
struct Cli {
    /// Name of the cluster stack and AKS cluster
    #[arg(long, env = "CLUSTER_NAME", default_value = DEFAULT_CLUSTER_NAME)]
    cluster_name: String,

    /// Azure region for the resource group and cluster
    #[arg(long, env = "AZURE_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Name of the charts stack
    #[arg(long, env = "CHARTS_STACK_NAME", default_value = DEFAULT_CHARTS_NAME)]
    charts_name: String,

    /// Output directory
    #[arg(short, long, env = "CDKTF_OUTDIR", default_value = DEFAULT_OUTDIR)]
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write every stack and the manifest (default)
    Synth,

    /// List stacks in the order they must be applied
    List,

    /// Print one synthesized stack to stdout
    Show {
        /// Stack name
        stack: String,
    },
}

// ============================================================
// Main Entry Point
// ============================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `show` output stays pipeable
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    if cli.json {
        FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let settings = InfraSettings {
        cluster_name: cli.cluster_name.clone(),
        region: cli.region.clone(),
        charts_name: cli.charts_name.clone(),
    };

    info!(
        cluster = %settings.cluster_name,
        region = %settings.region,
        charts = %settings.charts_name,
        "🚀 Declaring stacks"
    );

    let app = build_app(&settings, &cli.output).context("Failed to declare stacks")?;

    match cli.command.unwrap_or(Commands::Synth) {
        Commands::Synth => {
            let manifest = app.synth().with_context(|| {
                format!("Failed to synthesize into {}", app.outdir().display())
            })?;

            for stack in manifest.stacks.values() {
                println!(
                    "✅ {:<20} {}",
                    stack.name,
                    app.outdir().join(&stack.synthesized_stack_path).display()
                );
            }
            info!(stacks = manifest.stacks.len(), "✅ Synthesis complete");
        }

        Commands::List => {
            let stacks = app.resolve().context("Failed to resolve stacks")?;

            println!("\n{:<4} {:<20} {:<40}", "#", "STACK", "DEPENDS ON");
            println!("{}", "-".repeat(64));
            for (position, stack) in stacks.iter().enumerate() {
                println!(
                    "{:<4} {:<20} {:<40}",
                    position + 1,
                    stack.name,
                    stack.dependencies.join(", ")
                );
            }
        }

        Commands::Show { stack } => {
            let resolved = app
                .resolve_stack(&stack)
                .with_context(|| format!("Failed to render stack {}", stack))?;
            println!("{}", serde_json::to_string_pretty(&resolved.document)?);
        }
    }

    Ok(())
}
