use clap::{Parser, Subcommand};

pub mod common;
pub mod run;
pub use common::*;
pub use run::*;

#[derive(Parser)]
#[command(
    name = "shardplan",
    version,
    about = "Static test-shard plans for parallel CI nodes: one format gate, every test exactly once"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the execution spec for this node
    Resolve(ResolveArgs),
    /// Run the format gate (if assigned) and this node's test shards
    Run(RunArgs),
    /// Check that a plan revision covers its universe exactly once
    Check(CheckArgs),
    /// Print every node's assignment for a plan revision
    Matrix(MatrixArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    #[command(flatten)]
    pub node: NodeArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Check every revision in the document, not just the selected one
    #[arg(long, conflicts_with = "revision")]
    pub all: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MatrixArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
