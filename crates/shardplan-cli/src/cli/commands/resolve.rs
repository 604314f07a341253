use serde_json::json;
use shardplan_core::{ExecutionSpec, NodeIdentity, ResolvedShard};

use super::command_error::CommandError;
use super::output::{envelope, print_json};
use super::{load_plan, resolve_this_node};
use crate::cli::args::{OutputFormat, ResolveArgs};
use crate::exit_codes::SUCCESS;

pub(crate) fn run(args: ResolveArgs) -> anyhow::Result<i32> {
    match resolve_and_print(&args) {
        Ok(code) => Ok(code),
        Err(e) => e.into_exit_code(args.format, "resolve"),
    }
}

fn resolve_and_print(args: &ResolveArgs) -> Result<i32, CommandError> {
    let doc = load_plan(&args.plan)?;
    let (identity, spec) = resolve_this_node(&doc, &args.plan, &args.node)?;

    match args.format {
        OutputFormat::Text => print!("{}", render_spec(&identity, &spec)),
        OutputFormat::Json => print_json(&envelope(
            "resolve",
            SUCCESS,
            json!({ "node": identity, "spec": spec }),
        ))?,
    }
    Ok(SUCCESS)
}

pub(crate) fn render_spec(identity: &NodeIdentity, spec: &ExecutionSpec) -> String {
    let mut out = format!(
        "revision {} ({}), node {} of {} [{}]\n",
        spec.revision, spec.mode, spec.node_index, spec.node_total, identity.source
    );
    out.push_str(&format!(
        "format gate: {}\n",
        if spec.run_format_gate { "yes" } else { "no" }
    ));
    for shard in &spec.shards {
        out.push_str(&format!("{}\n", render_shard(shard)));
    }
    out
}

pub(crate) fn render_shard(shard: &ResolvedShard) -> String {
    let mut line = match &shard.name {
        Some(name) => format!("shard {} ({name}):", shard.ordinal),
        None => format!("shard {}:", shard.ordinal),
    };
    line.push_str(" include");
    for group in &shard.include {
        line.push(' ');
        line.push_str(group.as_str());
    }
    if !shard.exclude.is_empty() {
        line.push_str(" exclude");
        for group in &shard.exclude {
            line.push(' ');
            line.push_str(group.as_str());
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardplan_core::{resolve, AddressingMode, PlanEntry, Selection, ShardPlan};

    #[test]
    fn test_render_gate_node() {
        let plan = ShardPlan::new(
            1,
            AddressingMode::Direct,
            2,
            vec![
                PlanEntry::node(0, Selection::parse(["*"], ["raftstore"]).unwrap())
                    .with_format_gate()
                    .with_name("unit"),
                PlanEntry::node(1, Selection::parse(["raftstore"], Vec::<&str>::new()).unwrap()),
            ],
            vec![],
        )
        .unwrap();
        let spec = resolve(0, 2, &plan).unwrap();
        let text = render_spec(&NodeIdentity::explicit(0, 2), &spec);
        assert_eq!(
            text,
            "revision 1 (direct), node 0 of 2 [explicit]\n\
             format gate: yes\n\
             shard 0 (unit): include * exclude raftstore\n"
        );
    }
}
