//! Static test-shard plans for parallel CI nodes.
//!
//! A plan splits a test suite across a fixed number of CI nodes so each node
//! runs a disjoint slice, and exactly one node runs the formatting gate
//! before its tests:
//!
//! - Hierarchical selectors with include/exclude evaluation
//! - Direct-index and modulo (round-robin) addressing
//! - Construction-time validation of every revision
//! - Exactly-once coverage analysis against a declared universe, checked
//!   against the test runner's filter semantics
//! - Node identity from flags or CI provider variables
//! - Sequential node execution behind a [`ToolRunner`] seam
//!
//! # Quick Start
//!
//! ```
//! use shardplan_core::{resolve, PlanDocument};
//!
//! # fn example() -> anyhow::Result<()> {
//! let doc = PlanDocument::parse(r#"
//! configVersion: 1
//! revisions:
//!   - revision: 1
//!     mode: direct
//!     partitions: 2
//!     nodes:
//!       - index: 0
//!         format_gate: true
//!         include: ["*"]
//!         exclude: [raftstore]
//!       - index: 1
//!         include: [raftstore]
//! "#)?;
//!
//! let spec = resolve(1, 2, doc.latest())?;
//! assert!(!spec.run_format_gate);
//! assert_eq!(spec.include().unwrap()[0].as_str(), "raftstore");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `CIRCLE_NODE_INDEX` / `CIRCLE_NODE_TOTAL` | CircleCI parallelism (0-based) |
//! | `BUILDKITE_PARALLEL_JOB` / `BUILDKITE_PARALLEL_JOB_COUNT` | Buildkite parallelism (0-based) |
//! | `CI_NODE_INDEX` / `CI_NODE_TOTAL` | GitLab CI parallelism (1-based) |

pub mod coverage;
pub mod document;
pub mod error;
pub mod exec;
pub mod node;
pub mod plan;
pub mod resolve;
pub mod selector;
pub mod tools;

// Re-export main types
pub use coverage::{
    analyze, analyze_with, CoverageReport, DeadSelector, FilterMismatch, Overlap, PartialSplit,
    SelectorKind,
};
pub use document::{PlanDocument, CONFIG_VERSION, DEFAULT_PLAN_FILE};
pub use error::{ConfigMismatch, NodeError, PlanError, PlanResult};
pub use exec::{
    execute, DryRunRunner, ExecOptions, GateOutcome, NodeReport, ProcessRunner, ShardOutcome,
    ToolExit, ToolRunner,
};
pub use node::NodeIdentity;
pub use plan::{AddressingMode, Assignment, PlanEntry, ShardPlan};
pub use resolve::{resolve, resolve_all, ExecutionSpec, ResolvedShard};
pub use selector::{Selection, TestGroup};
pub use tools::{FilterMatch, Invocation, TestTool, ToolConfig};
