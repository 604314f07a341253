//! Error types for shard plans, resolution and node execution.

/// Errors raised while parsing or validating a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Selector string is not a well-formed test group.
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Plan document could not be read.
    #[error("failed to read plan {path}: {message}")]
    Io { path: String, message: String },

    /// Plan document is not valid YAML or does not match the schema.
    #[error("failed to parse plan: {message}")]
    Parse { message: String },

    /// Plan document declares a schema version this build does not understand.
    #[error("unsupported configVersion {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Plan document has no revisions at all.
    #[error("plan declares no revisions")]
    NoRevisions,

    /// Requested revision is not in the document.
    #[error("revision {revision} not found (available: {available:?})")]
    RevisionNotFound { revision: u32, available: Vec<u32> },

    /// A revision is structurally invalid.
    #[error("revision {revision}: {message}")]
    Invalid { revision: u32, message: String },

    /// Tool configuration is unusable.
    #[error("tools: {message}")]
    Tools { message: String },

    /// A revision drops or duplicates tests of its declared universe.
    #[error("revision {revision} violates coverage: {summary}")]
    Coverage { revision: u32, summary: String },
}

impl PlanError {
    pub(crate) fn invalid(revision: u32, message: impl Into<String>) -> Self {
        Self::Invalid {
            revision,
            message: message.into(),
        }
    }
}

/// The node's view of the CI topology disagrees with the plan.
///
/// Always fatal: a node that cannot be placed in the plan must not run an
/// empty shard and report success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigMismatch {
    #[error("node_total must be a positive integer")]
    ZeroTotal,

    #[error(
        "node_total {node_total} does not match the {partitions} partitions \
         plan revision {revision} was authored for"
    )]
    PartitionCount {
        node_total: u32,
        partitions: u32,
        revision: u32,
    },

    #[error("node_index {node_index} is out of range for node_total {node_total}")]
    IndexOutOfRange { node_index: u32, node_total: u32 },

    /// Node index/total could not be determined from flags or environment.
    #[error("node identity: {message}")]
    Identity { message: String },
}

/// Failures while executing a resolved spec on a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Formatting changed tracked files on the gate node.
    #[error(
        "formatting check failed: the working tree is not clean after `{format_command}`. \
         Run it locally and commit the result before pushing"
    )]
    FormatDrift { format_command: String },

    /// A test tool invocation exited non-zero.
    #[error("test shard {ordinal} failed: `{invocation}` exited with {}", exit_label(.code))]
    TestFailure {
        ordinal: usize,
        invocation: String,
        code: Option<i32>,
    },

    /// A non-test collaborator (formatter) exited non-zero.
    #[error("{tool} tool failed: `{invocation}` exited with {}", exit_label(.code))]
    ToolFailed {
        tool: &'static str,
        invocation: String,
        code: Option<i32>,
    },

    /// A collaborator could not be started at all.
    #[error("failed to run `{invocation}`: {message}")]
    Spawn { invocation: String, message: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// Result type for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;
