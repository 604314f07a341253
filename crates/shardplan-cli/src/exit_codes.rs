//! Process exit codes.
//! These codes are part of the public contract: CI reads them as the node's pass/fail signal.

use shardplan_core::NodeError;

pub const SUCCESS: i32 = 0;
pub const TEST_FAILED: i32 = 1; // Test tool exited non-zero, or `check` found violations
pub const CONFIG_ERROR: i32 = 2; // Plan invalid, coverage violated, node does not fit the plan
pub const FORMAT_DRIFT: i32 = 3; // Formatting changed tracked files on the gate node
pub const TOOL_ERROR: i32 = 4; // Collaborator could not be spawned, or the formatter failed

pub fn for_node_error(err: &NodeError) -> i32 {
    match err {
        NodeError::FormatDrift { .. } => FORMAT_DRIFT,
        NodeError::TestFailure { .. } => TEST_FAILED,
        NodeError::ToolFailed { .. } | NodeError::Spawn { .. } => TOOL_ERROR,
    }
}
