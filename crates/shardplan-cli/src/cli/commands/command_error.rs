use serde_json::json;
use shardplan_core::{ConfigMismatch, NodeError, PlanError};

use super::output::{envelope, print_json};
use crate::cli::args::OutputFormat;
use crate::exit_codes;

/// Failure of a command.
///
/// `Classified` failures carry their exit code and are reported in the
/// requested output format. `Fatal` ones bubble up to `main`.
#[derive(Debug)]
pub(crate) enum CommandError {
    Classified {
        code: i32,
        kind: &'static str,
        message: String,
    },
    Fatal(anyhow::Error),
}

impl CommandError {
    pub(crate) fn into_exit_code(
        self,
        format: OutputFormat,
        command: &'static str,
    ) -> anyhow::Result<i32> {
        match self {
            Self::Classified {
                code,
                kind,
                message,
            } => {
                match format {
                    OutputFormat::Text => eprintln!("error: {message}"),
                    OutputFormat::Json => print_json(&envelope(
                        command,
                        code,
                        json!({ "error": { "kind": kind, "message": message } }),
                    ))?,
                }
                Ok(code)
            }
            Self::Fatal(err) => Err(err),
        }
    }
}

impl From<PlanError> for CommandError {
    fn from(err: PlanError) -> Self {
        let kind = match &err {
            PlanError::Io { .. } => "plan_unreadable",
            PlanError::Coverage { .. } => "coverage_violation",
            PlanError::RevisionNotFound { .. } => "revision_not_found",
            _ => "plan_invalid",
        };
        Self::Classified {
            code: exit_codes::CONFIG_ERROR,
            kind,
            message: err.to_string(),
        }
    }
}

impl From<ConfigMismatch> for CommandError {
    fn from(err: ConfigMismatch) -> Self {
        let kind = match &err {
            ConfigMismatch::Identity { .. } => "node_identity",
            _ => "config_mismatch",
        };
        Self::Classified {
            code: exit_codes::CONFIG_ERROR,
            kind,
            message: err.to_string(),
        }
    }
}

impl From<NodeError> for CommandError {
    fn from(err: NodeError) -> Self {
        let kind = match &err {
            NodeError::FormatDrift { .. } => "format_drift",
            NodeError::TestFailure { .. } => "test_failure",
            NodeError::ToolFailed { .. } => "tool_failed",
            NodeError::Spawn { .. } => "spawn_failed",
        };
        Self::Classified {
            code: exit_codes::for_node_error(&err),
            kind,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        Self::Fatal(err)
    }
}
