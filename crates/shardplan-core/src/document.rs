//! Plan documents.
//!
//! The plan file checked into the repository (`shardplan.yaml`) keeps every
//! revision of the shard table side by side, plus the external tool
//! configuration. The highest revision is authoritative.
//!
//! # Format
//!
//! ```yaml
//! configVersion: 1
//! revisions:
//!   - revision: 1
//!     mode: direct
//!     partitions: 2
//!     universe: [coprocessor, raftstore::test_compact]
//!     nodes:
//!       - index: 0
//!         format_gate: true
//!         include: ["*"]
//!         exclude: [raftstore]
//!       - index: 1
//!         include: [raftstore]
//! tools:
//!   format: [cargo, fmt, --all]
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{PlanError, PlanResult};
use crate::plan::{AddressingMode, PlanEntry, ShardPlan};
use crate::selector::TestGroup;
use crate::tools::{FilterMatch, ToolConfig};

/// Default plan file name.
pub const DEFAULT_PLAN_FILE: &str = "shardplan.yaml";

/// Current plan schema version.
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(rename = "configVersion")]
    config_version: u32,

    #[serde(default)]
    revisions: Vec<RawRevision>,

    #[serde(default)]
    tools: ToolConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRevision {
    revision: u32,

    // Required: a plan that omits its mode is never guessed.
    mode: AddressingMode,

    partitions: u32,

    #[serde(default)]
    universe: Vec<TestGroup>,

    #[serde(default)]
    nodes: Option<Vec<PlanEntry>>,

    #[serde(default)]
    jobs: Option<Vec<PlanEntry>>,
}

impl RawRevision {
    fn into_plan(self) -> PlanResult<ShardPlan> {
        let revision = self.revision;
        let entries = match (self.mode, self.nodes, self.jobs) {
            (AddressingMode::Direct, Some(nodes), None) => nodes,
            (AddressingMode::Modulo, None, Some(jobs)) => jobs,
            (AddressingMode::Direct, _, Some(_)) => {
                return Err(PlanError::invalid(
                    revision,
                    "mode `direct` takes `nodes`, not `jobs`",
                ))
            }
            (AddressingMode::Modulo, Some(_), _) => {
                return Err(PlanError::invalid(
                    revision,
                    "mode `modulo` takes `jobs`, not `nodes`",
                ))
            }
            (AddressingMode::Direct, None, None) => {
                return Err(PlanError::invalid(revision, "mode `direct` requires `nodes`"))
            }
            (AddressingMode::Modulo, None, None) => {
                return Err(PlanError::invalid(revision, "mode `modulo` requires `jobs`"))
            }
        };
        ShardPlan::new(revision, self.mode, self.partitions, entries, self.universe)
    }
}

/// A parsed and validated plan file.
#[derive(Debug, Clone)]
pub struct PlanDocument {
    /// Ascending by revision number.
    revisions: Vec<ShardPlan>,
    tools: ToolConfig,
}

impl PlanDocument {
    /// Parse a plan document from YAML.
    pub fn parse(yaml: &str) -> PlanResult<Self> {
        let raw: RawDocument = serde_yaml::from_str(yaml).map_err(|e| PlanError::Parse {
            message: e.to_string(),
        })?;

        if raw.config_version != CONFIG_VERSION {
            return Err(PlanError::UnsupportedVersion {
                found: raw.config_version,
                expected: CONFIG_VERSION,
            });
        }
        if raw.revisions.is_empty() {
            return Err(PlanError::NoRevisions);
        }
        raw.tools.validate()?;

        let mut revisions = raw
            .revisions
            .into_iter()
            .map(RawRevision::into_plan)
            .collect::<PlanResult<Vec<_>>>()?;
        revisions.sort_by_key(ShardPlan::revision);

        if let Some(pair) = revisions
            .windows(2)
            .find(|pair| pair[0].revision() == pair[1].revision())
        {
            return Err(PlanError::invalid(
                pair[0].revision(),
                "revision number is declared more than once",
            ));
        }

        // Exact filters name every test, so there must be tests to name.
        if raw.tools.test.filter_match == FilterMatch::Exact {
            if let Some(plan) = revisions.iter().find(|p| p.universe().is_empty()) {
                return Err(PlanError::invalid(
                    plan.revision(),
                    "filter_match `exact` requires a declared universe",
                ));
            }
        }

        debug!(
            revisions = revisions.len(),
            latest = revisions.last().map(ShardPlan::revision),
            "parsed plan document"
        );

        Ok(Self {
            revisions,
            tools: raw.tools,
        })
    }

    /// Read and parse a plan file.
    pub fn load(path: &Path) -> PlanResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PlanError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let doc = Self::parse(&content)?;
        info!(
            path = %path.display(),
            latest = doc.latest().revision(),
            "loaded shard plan"
        );
        Ok(doc)
    }

    /// The authoritative (highest) revision.
    pub fn latest(&self) -> &ShardPlan {
        // `parse` rejects documents without revisions.
        &self.revisions[self.revisions.len() - 1]
    }

    /// A specific revision.
    pub fn revision(&self, revision: u32) -> PlanResult<&ShardPlan> {
        self.revisions
            .iter()
            .find(|p| p.revision() == revision)
            .ok_or_else(|| PlanError::RevisionNotFound {
                revision,
                available: self.revisions.iter().map(ShardPlan::revision).collect(),
            })
    }

    /// The requested revision, or the latest when none is requested.
    pub fn select(&self, revision: Option<u32>) -> PlanResult<&ShardPlan> {
        match revision {
            Some(revision) => self.revision(revision),
            None => Ok(self.latest()),
        }
    }

    /// All revisions, ascending.
    pub fn revisions(&self) -> &[ShardPlan] {
        &self.revisions
    }

    pub fn tools(&self) -> &ToolConfig {
        &self.tools
    }
}
