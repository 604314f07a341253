use serde_json::json;
use shardplan_core::{resolve_all, NodeIdentity};

use super::command_error::CommandError;
use super::load_plan;
use super::output::{envelope, print_json};
use super::resolve::render_shard;
use crate::cli::args::{MatrixArgs, OutputFormat};
use crate::exit_codes::SUCCESS;

/// Print every node's assignment. Useful for reviewing a plan change before
/// the CI fan-out is resized to match it.
pub(crate) fn run(args: MatrixArgs) -> anyhow::Result<i32> {
    match print_matrix(&args) {
        Ok(code) => Ok(code),
        Err(e) => e.into_exit_code(args.format, "matrix"),
    }
}

fn print_matrix(args: &MatrixArgs) -> Result<i32, CommandError> {
    let doc = load_plan(&args.plan)?;
    let plan = doc.select(args.plan.revision)?;
    let specs = resolve_all(plan)?;

    match args.format {
        OutputFormat::Text => {
            println!(
                "revision {} ({}), {} partitions",
                plan.revision(),
                plan.mode(),
                plan.partitions()
            );
            for spec in &specs {
                let gate = if spec.run_format_gate {
                    " +format gate"
                } else {
                    ""
                };
                println!("node {}{gate}", spec.node_index);
                for shard in &spec.shards {
                    println!("  {}", render_shard(shard));
                }
            }
        }
        OutputFormat::Json => {
            let nodes: Vec<_> = specs
                .iter()
                .map(|spec| {
                    json!({
                        "node": NodeIdentity::explicit(spec.node_index, spec.node_total),
                        "spec": spec,
                    })
                })
                .collect();
            print_json(&envelope(
                "matrix",
                SUCCESS,
                json!({
                    "revision": plan.revision(),
                    "mode": plan.mode(),
                    "partitions": plan.partitions(),
                    "nodes": nodes,
                }),
            ))?;
        }
    }
    Ok(SUCCESS)
}
