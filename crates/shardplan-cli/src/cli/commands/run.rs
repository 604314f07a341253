use serde_json::json;
use shardplan_core::{
    execute, DryRunRunner, ExecOptions, ExecutionSpec, NodeReport, PlanDocument, ProcessRunner,
    ToolRunner,
};
use tracing::info;

use super::command_error::CommandError;
use super::output::{envelope, print_json};
use super::{load_plan, resolve_this_node};
use crate::cli::args::{OutputFormat, RunArgs};
use crate::exit_codes::SUCCESS;

pub(crate) async fn run(args: RunArgs) -> anyhow::Result<i32> {
    match run_node(&args).await {
        Ok(code) => Ok(code),
        Err(e) => e.into_exit_code(args.format, "run"),
    }
}

async fn run_node(args: &RunArgs) -> Result<i32, CommandError> {
    let doc = load_plan(&args.plan)?;
    let (identity, spec) = resolve_this_node(&doc, &args.plan, &args.node)?;
    let options = ExecOptions { bench: args.bench };

    info!(
        revision = spec.revision,
        node_index = identity.index,
        node_total = identity.total,
        source = identity.source,
        shards = spec.shards.len(),
        format_gate = spec.run_format_gate,
        dry_run = args.dry_run,
        "starting node"
    );

    let report = if args.dry_run {
        let runner = DryRunRunner::new();
        let report = run_with(&runner, &spec, &doc, options).await?;
        if args.format == OutputFormat::Text {
            for invocation in runner.invocations() {
                println!("{invocation}");
            }
        }
        report
    } else {
        let mut runner = ProcessRunner::new();
        if args.format == OutputFormat::Json {
            // Stdout carries the JSON report.
            runner = runner.with_stdout_to_stderr();
        }
        run_with(&runner, &spec, &doc, options).await?
    };

    match args.format {
        OutputFormat::Text => {
            let gate = if report.format_gate.is_some() {
                "format gate passed, "
            } else {
                ""
            };
            eprintln!(
                "node {} of {}: {gate}{} shard(s) passed{}",
                identity.index,
                identity.total,
                report.shards.len(),
                if args.dry_run { " (dry run)" } else { "" }
            );
        }
        OutputFormat::Json => print_json(&envelope(
            "run",
            SUCCESS,
            json!({
                "node": identity,
                "spec": spec,
                "dry_run": args.dry_run,
                "report": report,
            }),
        ))?,
    }
    Ok(SUCCESS)
}

async fn run_with(
    runner: &dyn ToolRunner,
    spec: &ExecutionSpec,
    doc: &PlanDocument,
    options: ExecOptions,
) -> Result<NodeReport, CommandError> {
    Ok(execute(spec, doc.tools(), runner, options).await?)
}
