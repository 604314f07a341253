use super::args::*;

pub(crate) mod check;
pub(crate) mod command_error;
pub(crate) mod matrix;
pub(crate) mod output;
pub(crate) mod resolve;
pub(crate) mod run;

use command_error::CommandError;
use shardplan_core::{resolve as resolve_node, ExecutionSpec, NodeIdentity, PlanDocument};

use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Resolve(args) => resolve::run(args),
        Command::Run(args) => run::run(args).await,
        Command::Check(args) => check::run(args),
        Command::Matrix(args) => matrix::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}

/// Load the plan file named by `plan`.
pub(crate) fn load_plan(plan: &PlanArgs) -> Result<PlanDocument, CommandError> {
    Ok(PlanDocument::load(&plan.config)?)
}

/// Place this node in the selected revision. Coverage is verified first so a
/// plan that drops or duplicates tests never reaches execution.
pub(crate) fn resolve_this_node(
    doc: &PlanDocument,
    plan: &PlanArgs,
    node: &NodeArgs,
) -> Result<(NodeIdentity, ExecutionSpec), CommandError> {
    let selected = doc.select(plan.revision)?;
    selected.verify_coverage(&doc.tools().test)?;
    let identity = NodeIdentity::from_process_env(node.node_index, node.node_total)?;
    let spec = resolve_node(identity.index, identity.total, selected)?;
    Ok((identity, spec))
}
