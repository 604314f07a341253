//! Shard assignment resolution.
//!
//! [`resolve`] is a pure function of `(node_index, node_total, plan)`. It
//! never returns an empty spec for a node it cannot place; any disagreement
//! between the CI topology and the plan is a [`ConfigMismatch`].

use serde::Serialize;
use tracing::debug;

use crate::error::ConfigMismatch;
use crate::plan::{AddressingMode, Assignment, ShardPlan};
use crate::selector::TestGroup;

/// One test-tool invocation's worth of selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedShard {
    /// Node index (direct) or job ordinal (modulo).
    pub ordinal: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub include: Vec<TestGroup>,
    pub exclude: Vec<TestGroup>,
    /// Declared universe entries this shard runs; empty without a universe.
    pub tests: Vec<TestGroup>,
}

impl ResolvedShard {
    fn new(assignment: &Assignment, universe: &[TestGroup]) -> Self {
        Self {
            ordinal: assignment.ordinal,
            name: assignment.name.clone(),
            include: assignment.selection.include.clone(),
            exclude: assignment.selection.exclude.clone(),
            tests: assignment.selection.effective(universe).cloned().collect(),
        }
    }
}

/// What a single node must do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionSpec {
    pub revision: u32,
    pub mode: AddressingMode,
    pub node_index: u32,
    pub node_total: u32,
    /// Run the formatting gate before any shard.
    pub run_format_gate: bool,
    /// Shards in execution order.
    pub shards: Vec<ResolvedShard>,
}

impl ExecutionSpec {
    /// Include patterns of the single shard, if the node has exactly one.
    pub fn include(&self) -> Option<&[TestGroup]> {
        match self.shards.as_slice() {
            [only] => Some(&only.include),
            _ => None,
        }
    }

    /// Exclude patterns of the single shard, if the node has exactly one.
    pub fn exclude(&self) -> Option<&[TestGroup]> {
        match self.shards.as_slice() {
            [only] => Some(&only.exclude),
            _ => None,
        }
    }

    pub fn ordinals(&self) -> Vec<usize> {
        self.shards.iter().map(|s| s.ordinal).collect()
    }
}

/// Resolve what node `node_index` of `node_total` runs under `plan`.
///
/// # Examples
///
/// ```
/// use shardplan_core::{resolve, AddressingMode, PlanEntry, Selection, ShardPlan};
///
/// let plan = ShardPlan::new(
///     1,
///     AddressingMode::Direct,
///     2,
///     vec![
///         PlanEntry::node(0, Selection::parse(["*"], ["raftstore"]).unwrap()).with_format_gate(),
///         PlanEntry::node(1, Selection::parse(["raftstore"], Vec::<&str>::new()).unwrap()),
///     ],
///     vec![],
/// )
/// .unwrap();
///
/// let spec = resolve(0, 2, &plan).unwrap();
/// assert!(spec.run_format_gate);
///
/// // A node total the plan was not authored for is an error, not an empty spec.
/// assert!(resolve(0, 3, &plan).is_err());
/// ```
pub fn resolve(
    node_index: u32,
    node_total: u32,
    plan: &ShardPlan,
) -> Result<ExecutionSpec, ConfigMismatch> {
    if node_total == 0 {
        return Err(ConfigMismatch::ZeroTotal);
    }
    if node_total != plan.partitions() {
        return Err(ConfigMismatch::PartitionCount {
            node_total,
            partitions: plan.partitions(),
            revision: plan.revision(),
        });
    }
    if node_index >= node_total {
        return Err(ConfigMismatch::IndexOutOfRange {
            node_index,
            node_total,
        });
    }

    let assigned: Vec<&Assignment> = match plan.mode() {
        AddressingMode::Direct => plan
            .assignments()
            .iter()
            .filter(|a| a.ordinal == node_index as usize)
            .collect(),
        AddressingMode::Modulo => plan
            .assignments()
            .iter()
            .filter(|a| a.ordinal % node_total as usize == node_index as usize)
            .collect(),
    };

    // Plan construction guarantees every index in range has an entry.
    if assigned.is_empty() {
        return Err(ConfigMismatch::IndexOutOfRange {
            node_index,
            node_total,
        });
    }

    let spec = ExecutionSpec {
        revision: plan.revision(),
        mode: plan.mode(),
        node_index,
        node_total,
        run_format_gate: assigned.iter().any(|a| a.format_gate),
        shards: assigned
            .into_iter()
            .map(|a| ResolvedShard::new(a, plan.universe()))
            .collect(),
    };

    debug!(
        revision = spec.revision,
        node_index,
        node_total,
        shards = spec.shards.len(),
        format_gate = spec.run_format_gate,
        "resolved execution spec"
    );

    Ok(spec)
}

/// Resolve every node of the plan, in node order.
pub fn resolve_all(plan: &ShardPlan) -> Result<Vec<ExecutionSpec>, ConfigMismatch> {
    (0..plan.partitions())
        .map(|index| resolve(index, plan.partitions(), plan))
        .collect()
}
