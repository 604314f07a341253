//! Shared argument types used across multiple commands.

use clap::ValueEnum;
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PlanArgs {
    /// Plan document (YAML)
    #[arg(long, default_value = shardplan_core::DEFAULT_PLAN_FILE, env = "SHARDPLAN_CONFIG")]
    pub config: PathBuf,

    /// Plan revision to use (default: the latest)
    #[arg(long)]
    pub revision: Option<u32>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct NodeArgs {
    /// Zero-based index of this node.
    /// Falls back to CircleCI, Buildkite or GitLab parallelism variables.
    #[arg(long, env = "SHARDPLAN_NODE_INDEX")]
    pub node_index: Option<u32>,

    /// Total number of parallel nodes
    #[arg(long, env = "SHARDPLAN_NODE_TOTAL")]
    pub node_total: Option<u32>,
}
