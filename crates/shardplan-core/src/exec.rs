//! Node execution: format gate first, then one test invocation per shard.
//!
//! Everything runs strictly in sequence. The gate blocks; if it fails no
//! test tool is ever invoked on this node. The first failing shard stops the
//! node.

use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::NodeError;
use crate::resolve::ExecutionSpec;
use crate::tools::{Invocation, ToolConfig};

/// Exit status of a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolExit {
    /// `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ToolExit {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external tools. The seam tests and `--dry-run` plug into.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> anyhow::Result<ToolExit>;
}

/// Spawns real processes with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner {
    stdout_to_stderr: bool,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send collaborator stdout to our stderr, keeping stdout for a report.
    pub fn with_stdout_to_stderr(mut self) -> Self {
        self.stdout_to_stderr = true;
        self
    }

    fn stdout(&self) -> Stdio {
        if self.stdout_to_stderr {
            Stdio::from(std::io::stderr())
        } else {
            Stdio::inherit()
        }
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> anyhow::Result<ToolExit> {
        let status = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(self.stdout())
            .status()
            .await?;
        Ok(ToolExit {
            code: status.code(),
        })
    }
}

/// Records invocations instead of running them; every call succeeds.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    seen: Mutex<Vec<Invocation>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ToolRunner for DryRunRunner {
    async fn run(&self, invocation: &Invocation) -> anyhow::Result<ToolExit> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());
        Ok(ToolExit::success())
    }
}

/// Execution switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    /// Append the test tool's `bench_args`.
    pub bench: bool,
}

/// What a node ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub format_gate: Option<GateOutcome>,
    pub shards: Vec<ShardOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateOutcome {
    pub format: String,
    pub clean_check: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardOutcome {
    pub ordinal: usize,
    pub invocation: String,
}

/// Execute `spec` on this node.
pub async fn execute(
    spec: &ExecutionSpec,
    tools: &ToolConfig,
    runner: &dyn ToolRunner,
    options: ExecOptions,
) -> Result<NodeReport, NodeError> {
    let mut report = NodeReport::default();

    if spec.run_format_gate {
        report.format_gate = Some(run_format_gate(tools, runner).await?);
    }

    for shard in &spec.shards {
        let Some(invocation) = tools.test.invocation(shard, options.bench) else {
            warn!(
                node_index = spec.node_index,
                ordinal = shard.ordinal,
                "shard names no declared tests, skipping"
            );
            continue;
        };
        let rendered = invocation.to_string();
        info!(
            node_index = spec.node_index,
            ordinal = shard.ordinal,
            command = %rendered,
            "running test shard"
        );

        let exit = spawn(runner, &invocation).await?;
        if !exit.is_success() {
            warn!(
                node_index = spec.node_index,
                ordinal = shard.ordinal,
                code = ?exit.code,
                "test shard failed"
            );
            return Err(NodeError::TestFailure {
                ordinal: shard.ordinal,
                invocation: rendered,
                code: exit.code,
            });
        }
        report.shards.push(ShardOutcome {
            ordinal: shard.ordinal,
            invocation: rendered,
        });
    }

    Ok(report)
}

async fn run_format_gate(
    tools: &ToolConfig,
    runner: &dyn ToolRunner,
) -> Result<GateOutcome, NodeError> {
    let format = tools.format_invocation().map_err(|e| NodeError::Spawn {
        invocation: "<format>".into(),
        message: e.to_string(),
    })?;
    let clean_check = tools.clean_check_invocation().map_err(|e| NodeError::Spawn {
        invocation: "<clean_check>".into(),
        message: e.to_string(),
    })?;

    info!(command = %format, "running format gate");
    let exit = spawn(runner, &format).await?;
    if !exit.is_success() {
        return Err(NodeError::ToolFailed {
            tool: "format",
            invocation: format.to_string(),
            code: exit.code,
        });
    }

    let exit = spawn(runner, &clean_check).await?;
    if !exit.is_success() {
        warn!(command = %clean_check, "formatting changed tracked files");
        return Err(NodeError::FormatDrift {
            format_command: format.to_string(),
        });
    }

    Ok(GateOutcome {
        format: format.to_string(),
        clean_check: clean_check.to_string(),
    })
}

async fn spawn(runner: &dyn ToolRunner, invocation: &Invocation) -> Result<ToolExit, NodeError> {
    runner.run(invocation).await.map_err(|e| NodeError::Spawn {
        invocation: invocation.to_string(),
        message: format!("{e:#}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{AddressingMode, PlanEntry, ShardPlan};
    use crate::resolve::resolve;
    use crate::selector::{Selection, TestGroup};
    use crate::tools::FilterMatch;

    /// Replays scripted exit codes keyed by program name; records every call.
    struct ScriptedRunner {
        exits: Vec<(&'static str, ToolExit)>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl ScriptedRunner {
        fn new(exits: Vec<(&'static str, ToolExit)>) -> Self {
            Self {
                exits,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|i| i.to_string())
                .collect()
        }

        fn test_calls(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.args.first().map(String::as_str) == Some("test"))
                .count()
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        async fn run(&self, invocation: &Invocation) -> anyhow::Result<ToolExit> {
            self.calls.lock().unwrap().push(invocation.clone());
            let key = invocation
                .args
                .first()
                .map(String::as_str)
                .unwrap_or(invocation.program.as_str());
            if key == "missing" {
                anyhow::bail!("No such file or directory");
            }
            Ok(self
                .exits
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, e)| *e)
                .unwrap_or_else(ToolExit::success))
        }
    }

    fn sel(include: &[&str], exclude: &[&str]) -> Selection {
        Selection::parse(include, exclude).unwrap()
    }

    fn plan() -> ShardPlan {
        ShardPlan::new(
            1,
            AddressingMode::Modulo,
            2,
            vec![
                PlanEntry::job(sel(&["*"], &["raftstore", "storage"])).with_format_gate(),
                PlanEntry::job(sel(&["storage"], &[])),
                PlanEntry::job(sel(&["raftstore"], &["raftstore::test_split"])),
                PlanEntry::job(sel(&["raftstore::test_split"], &[])),
            ],
            vec![],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_gate_then_shards_in_order() {
        let spec = resolve(0, 2, &plan()).unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let report = execute(&spec, &ToolConfig::default(), &runner, ExecOptions::default())
            .await
            .unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "cargo fmt --all",
                "git diff-index --quiet HEAD --",
                "cargo test --workspace -- --skip raftstore --skip storage",
                "cargo test --workspace -- raftstore --skip raftstore::test_split",
            ]
        );
        assert!(report.format_gate.is_some());
        let ordinals: Vec<_> = report.shards.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_format_drift_blocks_all_tests() {
        let spec = resolve(0, 2, &plan()).unwrap();
        let runner = ScriptedRunner::new(vec![("diff-index", ToolExit::code(1))]);
        let err = execute(&spec, &ToolConfig::default(), &runner, ExecOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, NodeError::FormatDrift { .. }), "{err}");
        assert_eq!(runner.test_calls(), 0);
    }

    #[tokio::test]
    async fn test_formatter_failure_blocks_all_tests() {
        let spec = resolve(0, 2, &plan()).unwrap();
        let runner = ScriptedRunner::new(vec![("fmt", ToolExit::code(2))]);
        let err = execute(&spec, &ToolConfig::default(), &runner, ExecOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, NodeError::ToolFailed { tool: "format", .. }));
        assert_eq!(runner.calls(), vec!["cargo fmt --all"]);
    }

    #[tokio::test]
    async fn test_non_gate_node_skips_gate() {
        let spec = resolve(1, 2, &plan()).unwrap();
        let runner = ScriptedRunner::new(vec![]);
        let report = execute(&spec, &ToolConfig::default(), &runner, ExecOptions::default())
            .await
            .unwrap();
        assert!(report.format_gate.is_none());
        assert_eq!(
            runner.calls(),
            vec![
                "cargo test --workspace -- storage",
                "cargo test --workspace -- raftstore::test_split",
            ]
        );
    }

    #[tokio::test]
    async fn test_first_failing_shard_stops_node() {
        let spec = resolve(1, 2, &plan()).unwrap();
        let runner = ScriptedRunner::new(vec![("test", ToolExit::code(101))]);
        let err = execute(&spec, &ToolConfig::default(), &runner, ExecOptions::default())
            .await
            .unwrap_err();

        match err {
            NodeError::TestFailure { ordinal, code, .. } => {
                assert_eq!(ordinal, 1);
                assert_eq!(code, Some(101));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.test_calls(), 1);
    }

    #[tokio::test]
    async fn test_bench_mode_appends_bench_args() {
        let spec = resolve(1, 2, &plan()).unwrap();
        let runner = DryRunRunner::new();
        execute(
            &spec,
            &ToolConfig::default(),
            &runner,
            ExecOptions { bench: true },
        )
        .await
        .unwrap();
        let first = runner.invocations()[0].to_string();
        assert_eq!(first, "cargo test --workspace --features dev -- storage");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let spec = resolve(1, 2, &plan()).unwrap();
        let mut tools = ToolConfig::default();
        tools.test.args = vec!["missing".into()];
        let runner = ScriptedRunner::new(vec![]);
        let err = execute(&spec, &tools, &runner, ExecOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Spawn { .. }));
        assert!(err.to_string().contains("No such file or directory"));
    }

    #[tokio::test]
    async fn test_exact_filters_skip_shards_without_tests() {
        let universe = ["coprocessor", "raftstore::test_compact"]
            .iter()
            .map(|s| TestGroup::parse(s).unwrap())
            .collect();
        let plan = ShardPlan::new(
            1,
            AddressingMode::Modulo,
            2,
            vec![
                PlanEntry::job(sel(&["*"], &["raftstore"])).with_format_gate(),
                PlanEntry::job(sel(&["raftstore"], &[])),
                PlanEntry::job(sel(&["storage"], &[])),
            ],
            universe,
        )
        .unwrap();
        let spec = resolve(0, 2, &plan).unwrap();
        let mut tools = ToolConfig::default();
        tools.test.filter_match = FilterMatch::Exact;

        let runner = ScriptedRunner::new(vec![]);
        let report = execute(&spec, &tools, &runner, ExecOptions::default())
            .await
            .unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "cargo fmt --all",
                "git diff-index --quiet HEAD --",
                "cargo test --workspace -- coprocessor --exact",
            ]
        );
        assert_eq!(report.shards.len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_survives_poisoned_lock() {
        let runner = DryRunRunner::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = runner.seen.lock().unwrap();
            panic!("poison");
        }));
        assert!(runner.seen.is_poisoned());

        let invocation = Invocation {
            program: "cargo".into(),
            args: vec!["fmt".into()],
        };
        runner.run(&invocation).await.unwrap();
        assert_eq!(runner.invocations(), vec![invocation]);
    }

    #[tokio::test]
    async fn test_process_runner_redirected_stdout_still_reports_status() {
        let runner = ProcessRunner::new().with_stdout_to_stderr();
        let ok = Invocation {
            program: "sh".into(),
            args: vec!["-c".into(), "echo redirected".into()],
        };
        assert!(runner.run(&ok).await.unwrap().is_success());

        let failing = Invocation {
            program: "sh".into(),
            args: vec!["-c".into(), "echo redirected; exit 7".into()],
        };
        assert_eq!(runner.run(&failing).await.unwrap(), ToolExit::code(7));
    }
}
