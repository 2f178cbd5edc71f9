//! CLI argument parsing for the tenant onboarding utilities.
//!
//! Each subcommand is an independent run: provisioning reads its inputs from
//! the environment, cleanup and layer resolution take positional arguments.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "tenantops",
    version,
    about = "GitOps tenant onboarding utilities",
    after_help = "Commands:\n  provision                         Render a tenant from template-repo/ and open a pull request\n  cleanup <BRANCH>                  Remove the onboarding workflow from a tenant branch\n  resolve-layers <FILE>             Print the enabled layers of a locals document\n\nExamples:\n  TENANT_NAME=acme PROJECT_NAME=web ... tenantops provision\n  tenantops cleanup feature/tenant-acme --verbose\n  tenantops resolve-layers locals.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Provision(ProvisionArgs),
    Cleanup(CleanupArgs),
    ResolveLayers(ResolveLayersArgs),
}

/// Provision inputs beyond the environment.
#[derive(Parser, Debug)]
#[command(about = "Create a tenant branch from templates and open a pull request")]
pub struct ProvisionArgs {
    /// Repository root containing template-repo/ (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    pub repo_path: Option<PathBuf>,

    /// Emit debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Cleanup inputs for a single tenant branch.
#[derive(Parser, Debug)]
#[command(about = "Cleanup temporary onboarding workflow after successful tenant deployment")]
pub struct CleanupArgs {
    /// Name of the branch containing the onboarding workflow to cleanup
    #[arg(value_name = "BRANCH")]
    pub branch_name: String,

    /// Path to the repository (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    pub repo_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Layer resolution inputs; stacks come from the environment.
#[derive(Parser, Debug)]
#[command(about = "Intersect enabled locals against the category stacks")]
pub struct ResolveLayersArgs {
    /// JSON file with a `locals` section
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output encoding for the labeled lines
    #[arg(long, value_enum, default_value_t = OutputFormat::Python)]
    pub format: OutputFormat,

    /// Which locals entry supplies a layer's `path`
    #[arg(long, value_enum, default_value_t = PathSourceArg::First)]
    pub path_source: PathSourceArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `label= ['a', 'b']`, as printed by the existing pipeline scripts
    Python,
    /// `label=["a","b"]`
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PathSourceArg {
    /// Read `path` from the first locals entry (historical behavior)
    First,
    /// Read `path` from the entry that declares the layer
    Own,
}
